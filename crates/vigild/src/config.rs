//! Configuration loading.
//!
//! TOML file with full defaults; a missing file is not an error. The
//! backward-skip threshold and the application watch-list are deliberately
//! configuration, not constants: the threshold is a heuristic, and the
//! watch-list is a mapping table callers may substitute in tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reasoning-service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Base URL of the Ollama-compatible endpoint
    pub url: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// How long the model stays loaded after a request (e.g. "5m")
    pub keep_alive: String,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            model: "qwen3:4b".to_string(),
            timeout_secs: 120,
            keep_alive: "5m".to_string(),
        }
    }
}

/// Event-query-engine scan budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records fetched per adapter read
    pub batch_size: usize,
    /// Absolute cap on records scanned per query
    pub scan_ceiling: usize,
    /// How many records may predate the start time before the backward
    /// scan gives up. Heuristic: assumes the log is near-chronological,
    /// so a handful of out-of-order records near the boundary are
    /// tolerated but a sustained run means the window is behind us.
    pub backward_skip_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            scan_ceiling: 1_000_000,
            backward_skip_threshold: 500,
        }
    }
}

/// Where exported log dumps live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    pub directory: PathBuf,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/lib/vigil/logs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub reasoning: ReasoningConfig,
    pub engine: EngineConfig,
    pub logs: LogStoreConfig,
    /// Substring key (lowercase binary name fragment) to display name.
    pub watchlist: BTreeMap<String, String>,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            engine: EngineConfig::default(),
            logs: LogStoreConfig::default(),
            watchlist: default_watchlist(),
        }
    }
}

impl VigilConfig {
    /// Load from the given path, or the default location when none is
    /// given. A missing file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("vigil/config.toml")
    }
}

/// Well-known heavy applications, keyed by a fragment of the binary name.
pub fn default_watchlist() -> BTreeMap<String, String> {
    let entries = [
        // Browsers
        ("chrome", "Google Chrome"),
        ("msedge", "Microsoft Edge"),
        ("firefox", "Firefox"),
        ("brave", "Brave Browser"),
        // Dev tools
        ("code", "VS Code"),
        ("devenv", "Visual Studio (IDE)"),
        ("idea64", "IntelliJ IDEA"),
        ("pycharm64", "PyCharm"),
        ("java", "Java Runtime"),
        ("node", "Node.js"),
        ("python", "Python"),
        ("postgres", "PostgreSQL"),
        ("mysqld", "MySQL"),
        ("docker", "Docker Desktop"),
        ("wsl", "WSL (Linux)"),
        // Communication & media
        ("teams", "Microsoft Teams"),
        ("discord", "Discord"),
        ("slack", "Slack"),
        ("spotify", "Spotify"),
        // Productivity
        ("excel", "Microsoft Excel"),
        ("winword", "Microsoft Word"),
        ("powerpnt", "PowerPoint"),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = VigilConfig::default();
        assert_eq!(config.engine.backward_skip_threshold, 500);
        assert!(config.engine.scan_ceiling > config.engine.batch_size);
        assert!(config.watchlist.contains_key("chrome"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = VigilConfig::load(Some(Path::new("/nonexistent/vigil.toml"))).unwrap();
        assert_eq!(config.reasoning.timeout_secs, 120);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[engine]\nbackward_skip_threshold = 50\n\n[reasoning]\nmodel = \"qwen3:8b\"\n",
        )
        .unwrap();

        let config = VigilConfig::load(Some(&path)).unwrap();
        assert_eq!(config.engine.backward_skip_threshold, 50);
        assert_eq!(config.reasoning.model, "qwen3:8b");
        // untouched sections keep defaults
        assert_eq!(config.engine.batch_size, 64);
        assert!(config.watchlist.contains_key("firefox"));
    }
}

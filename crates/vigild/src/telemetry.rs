//! Live process and resource telemetry.
//!
//! The orchestrator only consumes this capability interface; OS sampling
//! stays behind it. Production uses `SystemTelemetry` (sysinfo plus an
//! `ss` probe for the port map); tests use `FakeTelemetry` with canned
//! snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::sync::Mutex;
use sysinfo::System;
use tracing::debug;
use vigil_shared::{Result, VigilError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryStats {
    pub percent: f32,
    pub used_bytes: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStat {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub rss_bytes: u64,
}

/// One local port owned by a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortBinding {
    pub local_port: u16,
    pub pid: Option<u32>,
    pub process_name: String,
    /// Socket state, e.g. "LISTEN" or "ESTAB"
    pub status: String,
}

#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn cpu_percent(&self) -> Result<f32>;
    async fn memory(&self) -> Result<MemoryStats>;
    async fn processes(&self) -> Result<Vec<ProcessStat>>;
    async fn connections(&self) -> Result<Vec<PortBinding>>;
    fn boot_time(&self) -> Result<DateTime<Local>>;
}

/// sysinfo-backed provider. CPU load needs two refreshes separated by the
/// minimum update interval, so the sampling methods are async.
pub struct SystemTelemetry {
    system: Mutex<System>,
}

impl SystemTelemetry {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }

    async fn settle_cpu(&self) {
        {
            let mut sys = self.system.lock().expect("telemetry lock poisoned");
            sys.refresh_cpu();
        }
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    }
}

impl Default for SystemTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryProvider for SystemTelemetry {
    async fn cpu_percent(&self) -> Result<f32> {
        self.settle_cpu().await;
        let mut sys = self.system.lock().expect("telemetry lock poisoned");
        sys.refresh_cpu();
        Ok(sys.global_cpu_info().cpu_usage())
    }

    async fn memory(&self) -> Result<MemoryStats> {
        let mut sys = self.system.lock().expect("telemetry lock poisoned");
        sys.refresh_memory();
        let used = sys.used_memory();
        let total = sys.total_memory();
        let percent = if total == 0 {
            0.0
        } else {
            used as f32 / total as f32 * 100.0
        };
        Ok(MemoryStats {
            percent,
            used_bytes: used,
            total_bytes: total,
        })
    }

    async fn processes(&self) -> Result<Vec<ProcessStat>> {
        self.settle_cpu().await;
        let mut sys = self.system.lock().expect("telemetry lock poisoned");
        sys.refresh_processes();
        let total_memory = sys.total_memory();
        let stats = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let rss = process.memory();
                ProcessStat {
                    pid: pid.as_u32(),
                    name: process.name().to_string(),
                    cpu_percent: process.cpu_usage(),
                    mem_percent: if total_memory == 0 {
                        0.0
                    } else {
                        rss as f32 / total_memory as f32 * 100.0
                    },
                    rss_bytes: rss,
                }
            })
            .collect();
        Ok(stats)
    }

    async fn connections(&self) -> Result<Vec<PortBinding>> {
        let output = Command::new("ss")
            .args(["-H", "-tunap"])
            .output()
            .map_err(|e| VigilError::Service(format!("running ss: {}", e)))?;
        if !output.status.success() {
            return Err(VigilError::Service(format!(
                "ss exited with {}",
                output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ss_output(&text))
    }

    fn boot_time(&self) -> Result<DateTime<Local>> {
        let secs = System::boot_time();
        Local
            .timestamp_opt(secs as i64, 0)
            .single()
            .ok_or_else(|| VigilError::Service(format!("invalid boot timestamp {}", secs)))
    }
}

/// Parse `ss -H -tunap` lines into port bindings.
///
/// Typical line:
/// `tcp LISTEN 0 128 0.0.0.0:5432 0.0.0.0:* users:(("postgres",pid=811,fd=5))`
fn parse_ss_output(text: &str) -> Vec<PortBinding> {
    let mut bindings = Vec::new();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }
        let status = fields[1].to_string();
        let local = fields[4];
        let Some(port) = local
            .rsplit(':')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };

        let (pid, process_name) = match line.find("users:((") {
            Some(idx) => {
                let tail = &line[idx..];
                let name = tail
                    .split('"')
                    .nth(1)
                    .unwrap_or("Unknown")
                    .to_string();
                let pid = tail
                    .split("pid=")
                    .nth(1)
                    .and_then(|s| {
                        s.chars()
                            .take_while(|c| c.is_ascii_digit())
                            .collect::<String>()
                            .parse::<u32>()
                            .ok()
                    });
                (pid, name)
            }
            None => (None, "Unknown".to_string()),
        };

        bindings.push(PortBinding {
            local_port: port,
            pid,
            process_name,
            status,
        });
    }
    debug!("parsed {} port bindings", bindings.len());
    bindings
}

/// Canned provider for tests.
pub struct FakeTelemetry {
    pub cpu: f32,
    pub memory: MemoryStats,
    pub process_list: Vec<ProcessStat>,
    pub bindings: Vec<PortBinding>,
    pub booted_at: DateTime<Local>,
}

impl FakeTelemetry {
    pub fn idle() -> Self {
        Self {
            cpu: 3.5,
            memory: MemoryStats {
                percent: 40.0,
                used_bytes: 6 * 1024 * 1024 * 1024,
                total_bytes: 16 * 1024 * 1024 * 1024,
            },
            process_list: Vec::new(),
            bindings: Vec::new(),
            booted_at: Local.timestamp_opt(1_750_000_000, 0).unwrap(),
        }
    }

    pub fn with_processes(mut self, process_list: Vec<ProcessStat>) -> Self {
        self.process_list = process_list;
        self
    }

    pub fn with_bindings(mut self, bindings: Vec<PortBinding>) -> Self {
        self.bindings = bindings;
        self
    }
}

#[async_trait]
impl TelemetryProvider for FakeTelemetry {
    async fn cpu_percent(&self) -> Result<f32> {
        Ok(self.cpu)
    }

    async fn memory(&self) -> Result<MemoryStats> {
        Ok(self.memory)
    }

    async fn processes(&self) -> Result<Vec<ProcessStat>> {
        Ok(self.process_list.clone())
    }

    async fn connections(&self) -> Result<Vec<PortBinding>> {
        Ok(self.bindings.clone())
    }

    fn boot_time(&self) -> Result<DateTime<Local>> {
        Ok(self.booted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ss_listen_line() {
        let line = r#"tcp   LISTEN  0  128  0.0.0.0:5432  0.0.0.0:*  users:(("postgres",pid=811,fd=5))"#;
        let bindings = parse_ss_output(line);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].local_port, 5432);
        assert_eq!(bindings[0].pid, Some(811));
        assert_eq!(bindings[0].process_name, "postgres");
        assert_eq!(bindings[0].status, "LISTEN");
    }

    #[test]
    fn test_parse_ss_line_without_owner() {
        let line = "udp   UNCONN  0  0  127.0.0.1:323  0.0.0.0:*";
        let bindings = parse_ss_output(line);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].pid, None);
        assert_eq!(bindings[0].process_name, "Unknown");
    }

    #[test]
    fn test_parse_ss_skips_garbage() {
        let bindings = parse_ss_output("not a socket line\n\n");
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_parse_ss_ipv6_port() {
        let line = r#"tcp   LISTEN  0  511  [::1]:6379  [::]:*  users:(("redis-server",pid=42,fd=6))"#;
        let bindings = parse_ss_output(line);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].local_port, 6379);
        assert_eq!(bindings[0].process_name, "redis-server");
    }
}

//! Reasoning-service client.
//!
//! A text-completion capability: prompt in, text out, optionally
//! constrained to JSON. Production talks to an Ollama-compatible endpoint
//! over HTTP; tests use `FakeReasoning` with scripted replies.

use crate::config::ReasoningConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use vigil_shared::{Result, VigilError};

/// Per-call generation options.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Constrain the reply to a single JSON object
    pub json_constrained: bool,
}

impl CompletionOptions {
    /// Classification calls: deterministic, JSON-only.
    pub fn json_plan() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(1000),
            json_constrained: true,
        }
    }

    /// Process-name extraction: deterministic, a handful of tokens.
    pub fn extraction() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(8),
            json_constrained: false,
        }
    }

    /// Narrative synthesis.
    pub fn narrative(max_tokens: u32) -> Self {
        Self {
            temperature: 0.7,
            max_tokens: Some(max_tokens),
            json_constrained: false,
        }
    }
}

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

/// Ollama HTTP client.
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    keep_alive: String,
}

impl OllamaClient {
    pub fn new(config: &ReasoningConfig) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            keep_alive: config.keep_alive.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the endpoint is reachable.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.http_client.get(&url).send().await.is_ok()
    }
}

#[async_trait]
impl ReasoningService for OllamaClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        opts: &CompletionOptions,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaChatRequest {
            model: self.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            stream: false,
            format: opts.json_constrained.then(|| "json".to_string()),
            keep_alive: Some(self.keep_alive.clone()),
            options: Some(OllamaOptions {
                temperature: opts.temperature,
                num_predict: opts.max_tokens,
            }),
        };

        info!(
            "[>] LLM call [{}] (system {} chars, user {} chars, json={})",
            self.model,
            system_prompt.len(),
            user_prompt.len(),
            opts.json_constrained
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VigilError::Service(format!("sending request to {}: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VigilError::Service(format!(
                "reasoning endpoint returned {}: {}",
                status, body
            )));
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| VigilError::Service(format!("decoding response: {}", e)))?;

        debug!("[<] LLM response ({} chars)", chat.message.content.len());
        Ok(chat.message.content)
    }
}

/// Scripted service for tests: replies are consumed in order, and every
/// call is counted so fast-path tests can assert no call happened.
pub struct FakeReasoning {
    replies: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeReasoning {
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().rev().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A service that must never be reached; calls fail and are counted.
    pub fn unreachable() -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningService for FakeReasoning {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _opts: &CompletionOptions,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VigilError::Service("fake service is offline".to_string()));
        }
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .pop()
            .ok_or_else(|| VigilError::Service("no scripted reply left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_reasoning_serves_replies_in_order() {
        let fake = FakeReasoning::with_replies(vec!["first", "second"]);
        let opts = CompletionOptions::extraction();
        assert_eq!(fake.complete("s", "u", &opts).await.unwrap(), "first");
        assert_eq!(fake.complete("s", "u", &opts).await.unwrap(), "second");
        assert!(fake.complete("s", "u", &opts).await.is_err());
        assert_eq!(fake.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_fake_counts_calls() {
        let fake = FakeReasoning::unreachable();
        assert!(fake
            .complete("s", "u", &CompletionOptions::json_plan())
            .await
            .is_err());
        assert_eq!(fake.call_count(), 1);
    }
}

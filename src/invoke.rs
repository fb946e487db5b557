//! Resilient model invocation: primary first, then the backup.
//!
//! The candidate chain is `[primary, backup?]`; each candidate gets
//! `model.attempts` tries with a fixed delay between tries. The first
//! success wins and is labelled with the model that produced it, so the
//! presentation layer can disclose when an answer came from the fallback.
//! Only when every attempt of every candidate has failed does an error
//! escape to the caller — and then as a single readable string, not a
//! panic.
//!
//! The HTTP transport lives behind [`CompletionBackend`] so the fallback
//! logic is testable with in-process stubs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::ModelConfig;
use crate::embedding::API_KEY_ENV;
use crate::prompt::ChatMessage;

/// One completed invocation: the answer text plus which model produced it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub model: String,
    /// True when the answer came from any candidate after the primary.
    pub via_backup: bool,
}

/// Transport seam for chat completions. The production implementation is
/// [`HttpBackend`]; tests substitute stubs.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> Result<String>;
}

/// Try every candidate model in order until one answers.
pub async fn invoke(
    backend: &dyn CompletionBackend,
    config: &ModelConfig,
    messages: &[ChatMessage],
) -> Result<Answer> {
    let mut candidates = vec![config.primary.as_str()];
    if let Some(backup) = &config.backup {
        candidates.push(backup.as_str());
    }

    let mut failures: Vec<String> = Vec::new();

    for (rank, model) in candidates.iter().enumerate() {
        for attempt in 1..=config.attempts {
            if !failures.is_empty() {
                tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
            }

            match backend.complete(model, messages, config).await {
                Ok(text) => {
                    return Ok(Answer {
                        text,
                        model: model.to_string(),
                        via_backup: rank > 0,
                    })
                }
                Err(e) => {
                    warn!(
                        model = %model,
                        attempt,
                        error = %e,
                        "completion attempt failed"
                    );
                    failures.push(format!("{} (attempt {}): {:#}", model, attempt, e));
                }
            }
        }
    }

    bail!(
        "All models failed. Tried: {}",
        failures.join("; ")
    )
}

/// Format a total invocation failure for display. This string is the only
/// way a pipeline error ever reaches the user.
pub fn user_facing_error(e: &anyhow::Error) -> String {
    format!("Analysis Failed: {:#}", e)
}

/// Chat-completions client for OpenAI-compatible endpoints (OpenRouter by
/// default). One request per call; retry policy lives in [`invoke`], not
/// here.
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        config: &ModelConfig,
    ) -> Result<String> {
        let api_key =
            std::env::var(API_KEY_ENV).map_err(|_| anyhow::anyhow!("{} not set", API_KEY_ENV))?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": config.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &config.referer)
            .header("X-Title", &config.title)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Completion API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion_response(&json)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing message content"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Stub backend that fails for the models in `failing`, answers
    /// otherwise, and records every call it receives.
    struct ScriptedBackend {
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            model: &str,
            _messages: &[ChatMessage],
            _config: &ModelConfig,
        ) -> Result<String> {
            self.calls.lock().unwrap().push(model.to_string());
            if self.failing.iter().any(|m| m == model) {
                bail!("simulated outage for {}", model);
            }
            Ok(format!("answer from {}", model))
        }
    }

    fn fast_config() -> ModelConfig {
        ModelConfig {
            primary: "primary-model".to_string(),
            backup: Some("backup-model".to_string()),
            retry_delay_ms: 0,
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn primary_success_never_touches_backup() {
        let backend = ScriptedBackend::new(&[]);
        let answer = invoke(&backend, &fast_config(), &[]).await.unwrap();
        assert_eq!(answer.model, "primary-model");
        assert!(!answer.via_backup);
        assert_eq!(backend.calls(), vec!["primary-model"]);
    }

    #[tokio::test]
    async fn primary_failure_falls_back_with_tag() {
        let backend = ScriptedBackend::new(&["primary-model"]);
        let answer = invoke(&backend, &fast_config(), &[]).await.unwrap();
        assert_eq!(answer.model, "backup-model");
        assert!(answer.via_backup);
        assert_eq!(backend.calls(), vec!["primary-model", "backup-model"]);
    }

    #[tokio::test]
    async fn total_failure_yields_readable_error() {
        let backend = ScriptedBackend::new(&["primary-model", "backup-model"]);
        let err = invoke(&backend, &fast_config(), &[]).await.unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("primary-model"));
        assert!(msg.contains("backup-model"));
        assert!(user_facing_error(&err).starts_with("Analysis Failed: "));
    }

    #[tokio::test]
    async fn each_candidate_gets_configured_attempts() {
        let backend = ScriptedBackend::new(&["primary-model", "backup-model"]);
        let config = ModelConfig {
            attempts: 3,
            ..fast_config()
        };
        let _ = invoke(&backend, &config, &[]).await;
        assert_eq!(
            backend.calls(),
            vec![
                "primary-model",
                "primary-model",
                "primary-model",
                "backup-model",
                "backup-model",
                "backup-model"
            ]
        );
    }

    #[tokio::test]
    async fn no_backup_means_single_candidate() {
        let backend = ScriptedBackend::new(&["primary-model"]);
        let config = ModelConfig {
            backup: None,
            ..fast_config()
        };
        assert!(invoke(&backend, &config, &[]).await.is_err());
        assert_eq!(backend.calls(), vec!["primary-model"]);
    }

    #[test]
    fn parse_extracts_first_choice() {
        let json = serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": "hello" } } ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "hello");
    }

    #[test]
    fn parse_rejects_empty_choices() {
        assert!(parse_completion_response(&serde_json::json!({ "choices": [] })).is_err());
        assert!(parse_completion_response(&serde_json::json!({})).is_err());
    }
}

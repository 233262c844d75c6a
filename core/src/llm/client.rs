use crate::{MaintwatchError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., http://localhost:8000/v1
    pub model: String,    // e.g., qwen2.5-0.5b-instruct
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("VLLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:8000/v1".to_string()),
            model: std::env::var("VLLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "qwen2.5-0.5b-instruct".to_string()),
            api_key: std::env::var("VLLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("VLLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Minimal response containing the assistant text
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<serde_json::Value>,
}

/// HTTP client for OpenAI-compatible Chat Completions endpoints
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| {
                MaintwatchError::AnalysisError(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }

    /// Run one chat completion.
    /// Contract:
    /// - Input: ordered chat messages
    /// - Output: assistant text from `choices[0].message.content` (empty when null)
    /// - Error: network failure, non-2xx status, or a body without `choices[0].message`
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let chat_url = format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        );
        debug!(
            target: "llm_client",
            "POST {} via Chat Completions", chat_url
        );

        let mut req = self
            .http
            .post(&chat_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let body = json!({
            "model": self.cfg.model,
            "messages": messages,
            "temperature": self.cfg.temperature,
        });

        let resp = req.json(&body).send().await.map_err(|e| {
            MaintwatchError::AnalysisError(format!("Chat Completions HTTP error: {e}"))
        })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(MaintwatchError::AnalysisError(format!(
                "Chat Completions error: status={} body={}",
                status, text
            )));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            MaintwatchError::AnalysisError(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            MaintwatchError::AnalysisError(
                "Missing choices[0].message in chat completions".into(),
            )
        })?;
        Ok(LlmResponse {
            text,
            model: val
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            usage: val.get("usage").cloned(),
        })
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    let message = v.get("choices")?.get(0)?.get("message")?;
    match message.get("content") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Null) | None => Some(String::new()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_content() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": "ok"}}]});
        assert_eq!(extract_text_from_chat_completions(&v).as_deref(), Some("ok"));
    }

    #[test]
    fn null_content_is_empty_text() {
        let v = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        assert_eq!(extract_text_from_chat_completions(&v).as_deref(), Some(""));
    }

    #[test]
    fn missing_choices_is_none() {
        assert!(extract_text_from_chat_completions(&json!({"error": "x"})).is_none());
        assert!(extract_text_from_chat_completions(&json!({"choices": []})).is_none());
    }
}

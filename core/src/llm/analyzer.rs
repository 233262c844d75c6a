use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::device::TelemetrySample;
use crate::Result;

use super::client::LlmClient;
use super::prompt::build_messages;

/// External "predict maintenance" operation
#[async_trait]
pub trait MaintenanceAnalyzer: Send + Sync {
    /// Produce a markdown analysis of the given window, oldest sample first
    async fn analyze(&self, samples: &[TelemetrySample]) -> Result<String>;
}

/// Analyzer backed by a chat-completion endpoint
#[derive(Clone)]
pub struct LlmAnalyzer {
    client: Arc<LlmClient>,
}

impl LlmAnalyzer {
    pub fn new(client: Option<LlmClient>) -> Result<Self> {
        let c = match client {
            Some(c) => c,
            None => LlmClient::from_env()?,
        };
        Ok(Self {
            client: Arc::new(c),
        })
    }
}

#[async_trait]
impl MaintenanceAnalyzer for LlmAnalyzer {
    async fn analyze(&self, samples: &[TelemetrySample]) -> Result<String> {
        let messages = build_messages(samples)?;
        let res = self.client.chat(&messages).await?;
        info!(
            target: "llm_client",
            samples = samples.len(),
            model = res.model.as_deref().unwrap_or(self.client.config().model.as_str()),
            chars = res.text.len(),
            "Maintenance analysis received"
        );
        Ok(res.text)
    }
}

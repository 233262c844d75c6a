use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::dashboard::DashboardConfig;
use crate::llm::LlmClientConfig;
use crate::session::SessionConfig;
use crate::transport::TransportConfig;
use crate::{MaintwatchError, Result};

/// Top-level configuration for a Maintwatch deployment
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub transport: TransportConfig,
    pub llm: LlmClientConfig,
    pub dashboard: DashboardConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Each section's defaults already consider env vars
        Self {
            transport: TransportConfig::default(),
            llm: LlmClientConfig::default(),
            dashboard: DashboardConfig::from_env(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (path via MAINTWATCH_CONFIG or ./maintwatch.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("MAINTWATCH_CONFIG").unwrap_or_else(|_| "maintwatch.toml".into());
        Self::load_from(&path)
    }

    /// Like [`AppConfig::load`] with an explicit path. A missing, unreadable or
    /// invalid file falls back to defaults.
    pub fn load_from(path: &str) -> Self {
        let p = Path::new(path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return Self::default();
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                Self::default()
            }
        }
    }

    /// Parse TOML and overlay it onto the defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let t = toml::from_str::<AppToml>(s).map_err(|e| MaintwatchError::ConfigError(e.to_string()))?;
        Ok(t.overlay(Self::default()))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AppToml {
    pub transport: Option<TransportToml>,
    pub llm: Option<LlmToml>,
    pub dashboard: Option<DashboardToml>,
    pub session: Option<SessionToml>,
}

impl AppToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(t) = self.transport {
            t.apply(&mut base.transport);
        }
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        if let Some(d) = self.dashboard {
            d.apply(&mut base.dashboard);
        }
        if let Some(s) = self.session {
            s.apply(&mut base.session);
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TransportToml {
    pub url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}
impl TransportToml {
    fn apply(self, t: &mut TransportConfig) {
        if let Some(v) = self.url {
            t.url = v;
        }
        if let Some(v) = self.reconnect_delay_ms {
            t.reconnect_delay_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(v) = self.base_url {
            l.base_url = v;
        }
        if let Some(v) = self.model {
            l.model = v;
        }
        if let Some(v) = self.api_key {
            l.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = self.request_timeout_ms {
            l.request_timeout_ms = v;
        }
        if let Some(v) = self.temperature {
            l.temperature = v.clamp(0.0, 2.0);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DashboardToml {
    pub host: Option<String>,
    pub port: Option<u16>,
}
impl DashboardToml {
    fn apply(self, d: &mut DashboardConfig) {
        if let Some(v) = self.host {
            d.host = v;
        }
        if let Some(v) = self.port {
            d.port = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SessionToml {
    pub buffer_capacity: Option<usize>,
    pub analysis_every: Option<usize>,
    pub ops_view_url: Option<String>,
}
impl SessionToml {
    fn apply(self, s: &mut SessionConfig) {
        if let Some(v) = self.buffer_capacity {
            s.buffer_capacity = v.max(1);
        }
        if let Some(v) = self.analysis_every {
            s.analysis_every = v.max(1);
        }
        if let Some(v) = self.ops_view_url {
            s.ops_view_url = v;
        }
    }
}

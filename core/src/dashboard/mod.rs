// Dashboard module - Session state over HTTP
//
// Provides a small HTTP server with SSE for streaming session events to a web UI
// and POST endpoints for the user controls.

mod api;
mod event_stream;

pub use api::DashboardServer;
pub use event_stream::{DashboardEvent, DashboardEventType, EventBroadcaster};

/// Dashboard configuration
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub port: u16,
    pub host: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("MAINTWATCH_DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3030),
            host: std::env::var("MAINTWATCH_DASHBOARD_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

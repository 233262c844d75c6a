// Maintwatch Core Library
// Predictive maintenance session runtime for streaming device telemetry

pub mod alerts;
pub mod buffer;
pub mod config;
pub mod dashboard;
pub mod device;
pub mod llm;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod trigger;

// Export core types
pub use alerts::{extract_alerts, AlertMetric, AlertParseError, CriticalAlert};
pub use buffer::{SampleBuffer, DEFAULT_CAPACITY};
pub use config::AppConfig;
pub use device::{
    CncReadings, DeviceKind, DeviceReadings, Metric, PrinterReadings, TelemetrySample,
};
pub use llm::{LlmAnalyzer, LlmClient, LlmClientConfig, MaintenanceAnalyzer};
pub use session::{
    AnalysisReason, AnalysisRequest, Session, SessionCommand, SessionConfig, SessionHandle,
    SessionRunner, SessionSnapshot, ANALYSIS_FAILED_MESSAGE,
};
pub use transport::{TelemetryTransport, TransportConfig, TransportStats};
pub use trigger::{AnalysisTrigger, DEFAULT_THRESHOLD};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaintwatchError {
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Analysis error: {0}")]
    AnalysisError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Dashboard error: {0}")]
    DashboardError(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, MaintwatchError>;

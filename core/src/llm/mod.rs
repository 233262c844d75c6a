//! LLM module: HTTP client, prompt builder, and maintenance analyzer
//!
//! This module provides:
//! - `LlmClientConfig`, `LlmClient`, `LlmResponse` for talking to OpenAI-compatible backends
//! - `build_messages` for turning a telemetry window into a chat request
//! - `MaintenanceAnalyzer`, the seam the session calls, and its `LlmAnalyzer` implementation

mod analyzer;
mod client;
mod prompt;

pub use analyzer::{LlmAnalyzer, MaintenanceAnalyzer};
pub use client::{ChatMessage, LlmClient, LlmClientConfig, LlmResponse};
pub use prompt::{build_messages, build_user_prompt, SYSTEM_PROMPT, THRESHOLDS};

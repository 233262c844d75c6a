// Event streaming for Dashboard
//
// Uses tokio broadcast channel to stream session events to multiple SSE clients

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::device::{DeviceKind, TelemetrySample};
use crate::session::Session;

/// Event sent to Dashboard clients
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardEvent {
    /// Timestamp (ISO 8601)
    pub timestamp: String,
    /// Event type
    pub event_type: DashboardEventType,
    /// Reporting device, for sample events
    pub device_id: Option<String>,
    pub device_type: Option<DeviceKind>,
    /// Samples in the window after the event
    pub buffer_len: usize,
    /// Samples counted toward the next automatic analysis
    pub pending_count: usize,
    /// Free-form detail
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardEventType {
    /// Sample appended to the window
    SampleIngested,
    /// Analysis call started
    AnalysisRequested,
    /// Analysis result recorded
    AnalysisCompleted,
    /// Analysis call failed; placeholder recorded
    AnalysisFailed,
    /// Window cleared
    BufferCleared,
    /// Ops view shown or hidden
    OpsViewToggled,
}

impl DashboardEvent {
    pub fn new(event_type: DashboardEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event_type,
            device_id: None,
            device_type: None,
            buffer_len: 0,
            pending_count: 0,
            detail: String::new(),
        }
    }

    pub fn with_device(mut self, sample: &TelemetrySample) -> Self {
        self.device_id = Some(sample.device_id.clone());
        self.device_type = Some(sample.kind());
        self.detail = sample.headline();
        self
    }

    pub fn with_counts(mut self, session: &Session) -> Self {
        self.buffer_len = session.buffer().len();
        self.pending_count = session.trigger().count();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Event broadcaster for Dashboard
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast(&self, event: DashboardEvent) {
        // Ignore error if no subscribers
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

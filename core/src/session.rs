//! Dashboard session: the single writer of buffer, trigger and analysis state.
//!
//! `Session` is plain state with synchronous transitions. `SessionRunner`
//! drives it from one tokio task fed by a single command queue; transport
//! messages, user controls and finished analysis calls all arrive there, so
//! no state is ever touched from two places at once.
//!
//! ```text
//!  transport ──Ingest──┐
//!  dashboard ──Run/Clear/Toggle──┼──▶ mpsc ──▶ Session ──▶ watch<SessionSnapshot>
//!  analysis task ──Finished──┘                      └──▶ EventBroadcaster (SSE)
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alerts::{extract_alerts, CriticalAlert};
use crate::buffer::{SampleBuffer, DEFAULT_CAPACITY};
use crate::dashboard::{DashboardEvent, DashboardEventType, EventBroadcaster};
use crate::device::{DeviceKind, TelemetrySample};
use crate::llm::MaintenanceAnalyzer;
use crate::trigger::{AnalysisTrigger, DEFAULT_THRESHOLD};
use crate::{MaintwatchError, Result};

/// Analysis result recorded when the external call fails
pub const ANALYSIS_FAILED_MESSAGE: &str = "Error occurred while analyzing the data.";

/// Session tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub buffer_capacity: usize,
    /// Ingested samples between automatic analyses
    pub analysis_every: usize,
    /// Embedded operational dashboard (Node-RED UI in the reference deployment)
    pub ops_view_url: String,
    pub command_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: std::env::var("MAINTWATCH_BUFFER_CAPACITY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_CAPACITY),
            analysis_every: std::env::var("MAINTWATCH_ANALYSIS_EVERY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_THRESHOLD),
            ops_view_url: std::env::var("MAINTWATCH_OPS_VIEW_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:1880/".to_string()),
            command_queue: 1024,
        }
    }
}

/// Why an analysis was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisReason {
    /// The trigger threshold was reached
    Automatic,
    /// The user asked for one
    Manual,
}

/// A request for the external analysis call, carrying the whole window
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub id: u64,
    pub reason: AnalysisReason,
    pub samples: Vec<TelemetrySample>,
}

/// Inputs to the session loop
#[derive(Debug)]
pub enum SessionCommand {
    Ingest(TelemetrySample),
    RunAnalysis,
    ClearBuffer,
    ToggleOpsView,
    AnalysisFinished {
        id: u64,
        outcome: Result<String>,
    },
    /// Reply with a snapshot once every earlier command has been applied
    Query(oneshot::Sender<SessionSnapshot>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpsView {
    pub visible: bool,
    pub url: String,
}

/// Read-only view of the session for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub samples: Vec<TelemetrySample>,
    pub buffer_capacity: usize,
    /// Samples counted toward the next automatic analysis
    pub pending_count: usize,
    pub analysis_every: usize,
    pub analysis: Option<String>,
    pub alerts: Vec<CriticalAlert>,
    pub analyses_in_flight: usize,
    pub latest_printer: Option<TelemetrySample>,
    pub latest_cnc: Option<TelemetrySample>,
    pub ops_view: OpsView,
}

/// Session state and its transitions
#[derive(Debug, Clone)]
pub struct Session {
    buffer: SampleBuffer,
    trigger: AnalysisTrigger,
    analysis: Option<String>,
    alerts: Vec<CriticalAlert>,
    ops_view: OpsView,
    next_request_id: u64,
    in_flight: usize,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            buffer: SampleBuffer::new(config.buffer_capacity),
            trigger: AnalysisTrigger::new(config.analysis_every),
            analysis: None,
            alerts: Vec::new(),
            ops_view: OpsView {
                visible: false,
                url: config.ops_view_url.clone(),
            },
            next_request_id: 0,
            in_flight: 0,
        }
    }

    /// Append a sample and count it. Returns the automatic analysis request
    /// when this sample completes a batch.
    pub fn ingest(&mut self, sample: TelemetrySample) -> Option<AnalysisRequest> {
        self.buffer.append(sample);
        if self.trigger.record() {
            Some(self.new_request(AnalysisReason::Automatic))
        } else {
            None
        }
    }

    /// On-demand analysis of the current window; leaves the trigger alone
    pub fn request_analysis(&mut self) -> AnalysisRequest {
        self.new_request(AnalysisReason::Manual)
    }

    fn new_request(&mut self, reason: AnalysisReason) -> AnalysisRequest {
        self.next_request_id += 1;
        AnalysisRequest {
            id: self.next_request_id,
            reason,
            samples: self.buffer.snapshot(),
        }
    }

    /// Count a request whose analysis task is running
    pub fn analysis_dispatched(&mut self) {
        self.in_flight += 1;
    }

    /// Record the outcome of an analysis call. Failures are replaced by
    /// [`ANALYSIS_FAILED_MESSAGE`]; an empty reply clears the result.
    /// Buffer and trigger are never touched.
    pub fn complete_analysis(&mut self, outcome: Result<String>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let text = match outcome {
            Ok(text) => text,
            Err(_) => ANALYSIS_FAILED_MESSAGE.to_string(),
        };
        if text.trim().is_empty() {
            self.alerts.clear();
            self.analysis = None;
            return;
        }
        self.alerts = extract_alerts(&text);
        self.analysis = Some(text);
    }

    /// Empty the window; the trigger count is kept
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Flip the ops view and return the new visibility
    pub fn toggle_ops_view(&mut self) -> bool {
        self.ops_view.visible = !self.ops_view.visible;
        self.ops_view.visible
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn trigger(&self) -> &AnalysisTrigger {
        &self.trigger
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn alerts(&self) -> &[CriticalAlert] {
        &self.alerts
    }

    pub fn ops_view(&self) -> &OpsView {
        &self.ops_view
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            samples: self.buffer.snapshot(),
            buffer_capacity: self.buffer.capacity(),
            pending_count: self.trigger.count(),
            analysis_every: self.trigger.threshold(),
            analysis: self.analysis.clone(),
            alerts: self.alerts.clone(),
            analyses_in_flight: self.in_flight,
            latest_printer: self.buffer.latest_for(DeviceKind::Printer).cloned(),
            latest_cnc: self.buffer.latest_for(DeviceKind::Cnc).cloned(),
            ops_view: self.ops_view.clone(),
        }
    }
}

/// Cloneable handle for feeding and observing a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| MaintwatchError::SessionClosed)
    }

    pub async fn ingest(&self, sample: TelemetrySample) -> Result<()> {
        self.send(SessionCommand::Ingest(sample)).await
    }

    pub async fn run_analysis(&self) -> Result<()> {
        self.send(SessionCommand::RunAnalysis).await
    }

    pub async fn clear_buffer(&self) -> Result<()> {
        self.send(SessionCommand::ClearBuffer).await
    }

    pub async fn toggle_ops_view(&self) -> Result<()> {
        self.send(SessionCommand::ToggleOpsView).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Snapshot taken after every command queued before this call
    pub async fn query(&self) -> Result<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Query(reply_tx)).await?;
        reply_rx.await.map_err(|_| MaintwatchError::SessionClosed)
    }

    /// Latest published snapshot, without waiting for queued commands
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Raw queue sender for producers such as the transport
    pub fn sender(&self) -> mpsc::Sender<SessionCommand> {
        self.tx.clone()
    }
}

/// Drives a [`Session`] from a single command queue
pub struct SessionRunner {
    config: SessionConfig,
    analyzer: Arc<dyn MaintenanceAnalyzer>,
    broadcaster: Option<EventBroadcaster>,
}

impl SessionRunner {
    pub fn new(config: SessionConfig, analyzer: Arc<dyn MaintenanceAnalyzer>) -> Self {
        Self {
            config,
            analyzer,
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Start the session loop. The task ends on `Shutdown` or once every
    /// handle is dropped, and yields the final state.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<Session>) {
        let session = Session::new(&self.config);
        let (tx, rx) = mpsc::channel(self.config.command_queue.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let handle = SessionHandle {
            tx: tx.clone(),
            snapshots: snapshot_rx,
        };
        let task = tokio::spawn(self.run(session, rx, tx.downgrade(), snapshot_tx));
        (handle, task)
    }

    async fn run(
        self,
        mut session: Session,
        mut rx: mpsc::Receiver<SessionCommand>,
        completions: mpsc::WeakSender<SessionCommand>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Session {
        info!(target: "session", capacity = session.buffer().capacity(),
            analysis_every = session.trigger().threshold(), "Session started");

        while let Some(command) = rx.recv().await {
            match command {
                SessionCommand::Ingest(sample) => {
                    debug!(target: "session", device_id = %sample.device_id,
                        device_type = %sample.kind(), timestamp = sample.timestamp,
                        "Sample ingested");
                    let event = self.event(&session, DashboardEventType::SampleIngested)
                        .with_device(&sample);
                    let request = session.ingest(sample);
                    self.publish(event.with_counts(&session));
                    if let Some(request) = request {
                        self.dispatch(&mut session, request, &completions);
                    }
                }
                SessionCommand::RunAnalysis => {
                    let request = session.request_analysis();
                    self.dispatch(&mut session, request, &completions);
                }
                SessionCommand::ClearBuffer => {
                    session.clear();
                    info!(target: "session", "Buffer cleared");
                    self.publish(self.event(&session, DashboardEventType::BufferCleared));
                }
                SessionCommand::ToggleOpsView => {
                    let visible = session.toggle_ops_view();
                    info!(target: "session", visible, "Ops view toggled");
                    self.publish(
                        self.event(&session, DashboardEventType::OpsViewToggled)
                            .with_detail(if visible { "visible" } else { "hidden" }),
                    );
                }
                SessionCommand::AnalysisFinished { id, outcome } => {
                    let event_type = if outcome.is_ok() {
                        DashboardEventType::AnalysisCompleted
                    } else {
                        DashboardEventType::AnalysisFailed
                    };
                    session.complete_analysis(outcome);
                    info!(target: "session", request_id = id,
                        alerts = session.alerts().len(), "Analysis result recorded");
                    self.publish(
                        self.event(&session, event_type)
                            .with_detail(format!("request {id}, {} alerts", session.alerts().len())),
                    );
                }
                SessionCommand::Query(reply) => {
                    let _ = reply.send(session.snapshot());
                    continue;
                }
                SessionCommand::Shutdown => {
                    info!(target: "session", "Session shutting down");
                    break;
                }
            }

            snapshot_tx.send_replace(session.snapshot());
        }

        session
    }

    /// Run the analysis in its own task; the outcome comes back through the queue
    fn dispatch(
        &self,
        session: &mut Session,
        request: AnalysisRequest,
        completions: &mpsc::WeakSender<SessionCommand>,
    ) {
        info!(target: "session", request_id = request.id, reason = ?request.reason,
            samples = request.samples.len(), "Requesting maintenance analysis");
        self.publish(
            self.event(session, DashboardEventType::AnalysisRequested)
                .with_detail(format!("request {} ({:?})", request.id, request.reason)),
        );

        let Some(tx) = completions.upgrade() else {
            warn!(target: "session", request_id = request.id,
                "Session queue closed; dropping analysis request");
            return;
        };
        let analyzer = self.analyzer.clone();
        let id = request.id;
        tokio::spawn(async move {
            // A panicking analyzer still reports back
            let call = tokio::spawn(async move { analyzer.analyze(&request.samples).await });
            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(e) => Err(MaintwatchError::AnalysisError(format!(
                    "Analysis task aborted: {e}"
                ))),
            };
            if let Err(e) = &outcome {
                error!(target: "session", request_id = id, error = %e,
                    "Error in maintenance analysis");
            }
            let _ = tx
                .send(SessionCommand::AnalysisFinished { id, outcome })
                .await;
        });
        session.analysis_dispatched();
    }

    fn event(&self, session: &Session, event_type: DashboardEventType) -> DashboardEvent {
        DashboardEvent::new(event_type).with_counts(session)
    }

    fn publish(&self, event: DashboardEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fixtures::{cnc, printer};

    fn config() -> SessionConfig {
        SessionConfig {
            buffer_capacity: 10,
            analysis_every: 10,
            ops_view_url: "http://localhost:1880/".to_string(),
            command_queue: 16,
        }
    }

    fn feed(session: &mut Session, n: i64) -> Vec<AnalysisRequest> {
        (1..=n)
            .filter_map(|ts| session.ingest(printer("P-1", ts, 50.0)))
            .collect()
    }

    #[test]
    fn nine_samples_request_nothing() {
        let mut session = Session::new(&config());
        assert!(feed(&mut session, 9).is_empty());
        assert_eq!(session.trigger().count(), 9);
    }

    #[test]
    fn ten_samples_request_full_window() {
        let mut session = Session::new(&config());
        let requests = feed(&mut session, 10);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].reason, AnalysisReason::Automatic);
        assert_eq!(requests[0].samples.len(), 10);
        assert_eq!(session.trigger().count(), 0);
    }

    #[test]
    fn twenty_five_samples_request_twice() {
        let mut session = Session::new(&config());
        let requests = feed(&mut session, 25);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].samples.last().unwrap().timestamp, 10);
        let second: Vec<i64> = requests[1].samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(second, (11..=20).collect::<Vec<_>>());
        assert_eq!(session.trigger().count(), 5);
        assert_eq!(session.buffer().len(), 10);
    }

    #[test]
    fn manual_request_leaves_counter_alone() {
        let mut session = Session::new(&config());
        feed(&mut session, 4);
        let manual = session.request_analysis();
        assert_eq!(manual.reason, AnalysisReason::Manual);
        assert_eq!(manual.samples.len(), 4);
        assert_eq!(session.trigger().count(), 4);

        let automatic = feed(&mut session, 6);
        assert_eq!(automatic.len(), 1);
        assert_ne!(automatic[0].id, manual.id);
    }

    #[test]
    fn failure_records_placeholder_only() {
        let mut session = Session::new(&config());
        feed(&mut session, 13);
        let _ = session.request_analysis();
        session.complete_analysis(Err(MaintwatchError::AnalysisError("boom".into())));

        assert_eq!(session.analysis(), Some(ANALYSIS_FAILED_MESSAGE));
        assert!(session.alerts().is_empty());
        assert_eq!(session.buffer().len(), 10);
        assert_eq!(session.trigger().count(), 3);
    }

    #[test]
    fn in_flight_counts_dispatched_requests_only() {
        let mut session = Session::new(&config());
        let _ = session.request_analysis();
        assert_eq!(session.snapshot().analyses_in_flight, 0);

        session.analysis_dispatched();
        session.analysis_dispatched();
        assert_eq!(session.snapshot().analyses_in_flight, 2);
        session.complete_analysis(Ok("done".into()));
        assert_eq!(session.snapshot().analyses_in_flight, 1);
        session.complete_analysis(Err(MaintwatchError::AnalysisError("boom".into())));
        session.complete_analysis(Ok("late".into()));
        assert_eq!(session.snapshot().analyses_in_flight, 0);
    }

    #[test]
    fn empty_reply_clears_result() {
        let mut session = Session::new(&config());
        session.complete_analysis(Ok(
            "1. Critical Alerts:\n- C-1 - Tool Wear: 88%\n2. Key Recommendations:\n".into(),
        ));
        assert!(session.analysis().is_some());

        session.complete_analysis(Ok("  \n".into()));
        assert_eq!(session.analysis(), None);
        assert!(session.alerts().is_empty());
    }

    #[test]
    fn success_replaces_result_and_alerts() {
        let mut session = Session::new(&config());
        session.complete_analysis(Ok(
            "1. Critical Alerts:\n- C-1 - Tool Wear: 88%\n2. Key Recommendations:\n".into(),
        ));
        assert_eq!(session.alerts().len(), 1);

        session.complete_analysis(Ok("All good".into()));
        assert_eq!(session.analysis(), Some("All good"));
        assert!(session.alerts().is_empty());
    }

    #[test]
    fn clear_keeps_counter() {
        let mut session = Session::new(&config());
        feed(&mut session, 7);
        session.clear();
        assert_eq!(session.buffer().len(), 0);
        assert_eq!(session.trigger().count(), 7);
    }

    #[test]
    fn snapshot_tracks_latest_per_kind_and_ops_view() {
        let mut session = Session::new(&config());
        session.ingest(printer("P-1", 1, 40.0));
        session.ingest(cnc("C-1", 2, 20.0));
        session.ingest(printer("P-2", 3, 41.0));
        assert!(session.toggle_ops_view());

        let snapshot = session.snapshot();
        assert_eq!(snapshot.latest_printer.unwrap().device_id, "P-2");
        assert_eq!(snapshot.latest_cnc.unwrap().device_id, "C-1");
        assert!(snapshot.ops_view.visible);
        assert_eq!(snapshot.pending_count, 3);
        assert!(!session.toggle_ops_view());
    }
}

// Dashboard HTTP API server
//
// Provides REST endpoints, user controls and SSE streaming for the Dashboard UI

use crate::buffer::{series_of, SeriesPoint};
use crate::dashboard::event_stream::EventBroadcaster;
use crate::dashboard::DashboardConfig;
use crate::device::{DeviceKind, Metric};
use crate::session::SessionHandle;
use crate::MaintwatchError;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Html, IntoResponse, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Dashboard server state
#[derive(Clone)]
struct DashboardState {
    session: SessionHandle,
    broadcaster: EventBroadcaster,
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: DashboardConfig,
    session: SessionHandle,
    broadcaster: EventBroadcaster,
}

impl DashboardServer {
    pub fn new(
        config: DashboardConfig,
        session: SessionHandle,
        broadcaster: EventBroadcaster,
    ) -> Self {
        Self {
            config,
            session,
            broadcaster,
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = DashboardState {
            session: self.session.clone(),
            broadcaster: self.broadcaster.clone(),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/api/state", get(state_handler))
            .route("/api/alerts", get(alerts_handler))
            .route("/api/samples/recent", get(recent_handler))
            .route("/api/series", get(series_handler))
            .route("/api/events/stream", get(event_stream_handler))
            .route("/api/analysis/run", post(run_analysis_handler))
            .route("/api/buffer/clear", post(clear_buffer_handler))
            .route("/api/ops-view/toggle", post(toggle_ops_view_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(state)
    }

    /// Bind the configured address and serve until the process ends
    pub async fn serve(self) -> crate::Result<()> {
        let addr = self.config.addr();
        info!(
            target: "dashboard",
            addr = %addr,
            "Starting Dashboard server"
        );
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            MaintwatchError::DashboardError(format!("Failed to bind {addr}: {e}"))
        })?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> crate::Result<()> {
        let app = self.router();
        info!(
            target: "dashboard",
            url = %format!("http://{}", listener.local_addr()?),
            "Dashboard server ready"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| MaintwatchError::DashboardError(format!("Server error: {e}")))
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Maintwatch</title></head>
<body><h1>Smart Predictive Maintenance Dashboard</h1>
<p><button onclick="fetch('/api/analysis/run',{method:'POST'})">Run Maintenance Prediction</button>
<button onclick="fetch('/api/buffer/clear',{method:'POST'})">Clear Data</button>
<button onclick="fetch('/api/ops-view/toggle',{method:'POST'})">Toggle Ops View</button></p>
<pre id="state"></pre>
<script>
const refresh = () => fetch('/api/state').then(r => r.json()).then(s => {
  document.getElementById('state').textContent = JSON.stringify(s, null, 2);
});
new EventSource('/api/events/stream').onmessage = refresh;
refresh();
</script></body></html>"#;

/// Serve the main HTML page
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Current session snapshot
async fn state_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.session.snapshot())
}

/// Alerts scraped from the latest analysis
async fn alerts_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.session.snapshot().alerts)
}

/// Query parameters for samples/recent endpoint
#[derive(Deserialize)]
struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    limit: usize,
}

fn default_recent_limit() -> usize {
    5
}

/// Latest samples for the data table
/// Query params: ?limit=5 (default: 5, max: buffer capacity)
async fn recent_handler(
    State(state): State<DashboardState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let mut samples = state.session.snapshot().samples;
    let skip = samples.len().saturating_sub(query.limit);
    Json(samples.split_off(skip))
}

#[derive(Deserialize)]
struct SeriesQuery {
    device_type: DeviceKind,
}

#[derive(Serialize)]
struct MetricSeries {
    metric: Metric,
    label: &'static str,
    unit: &'static str,
    points: Vec<SeriesPoint>,
}

/// Chart series for one device kind
/// Query params: ?device_type=3d_printer | cnc_machine
async fn series_handler(
    State(state): State<DashboardState>,
    Query(query): Query<SeriesQuery>,
) -> impl IntoResponse {
    let snapshot = state.session.snapshot();
    let series: Vec<MetricSeries> = query
        .device_type
        .chart_metrics()
        .into_iter()
        .map(|metric| MetricSeries {
            metric,
            label: metric.label(),
            unit: metric.unit(),
            points: series_of(&snapshot.samples, query.device_type, metric),
        })
        .collect();
    Json(series)
}

/// SSE endpoint for real-time session events
async fn event_stream_handler(
    State(state): State<DashboardState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    info!(
        target: "dashboard",
        subscribers = state.broadcaster.subscriber_count(),
        "New SSE client connected"
    );
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "Failed to serialize event");
                None
            }
        },
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Broadcast error");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn run_analysis_handler(State(state): State<DashboardState>) -> StatusCode {
    accepted("run_analysis", state.session.run_analysis().await)
}

async fn clear_buffer_handler(State(state): State<DashboardState>) -> StatusCode {
    accepted("clear_buffer", state.session.clear_buffer().await)
}

async fn toggle_ops_view_handler(State(state): State<DashboardState>) -> StatusCode {
    accepted("toggle_ops_view", state.session.toggle_ops_view().await)
}

fn accepted(action: &str, result: crate::Result<()>) -> StatusCode {
    match result {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            warn!(target: "dashboard", action, error = %e, "Control rejected");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{cnc_sample, printer_sample, session_config, RecordingAnalyzer};
use maintwatch_core::dashboard::{DashboardConfig, DashboardServer, EventBroadcaster};
use maintwatch_core::{MaintwatchError, Result, SessionHandle, SessionRunner, TelemetrySample};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const REPORT: &str = "1. Critical Alerts:\n\
- Printer-1 - Temperature: 85.3°C\n\
2. Key Recommendations:\n\
- Check the cooling fan";

struct Harness {
    base: String,
    handle: SessionHandle,
    calls: mpsc::UnboundedReceiver<Vec<TelemetrySample>>,
    broadcaster: EventBroadcaster,
    http: reqwest::Client,
}

async fn start_dashboard() -> Harness {
    let (analyzer, calls) = RecordingAnalyzer::new(REPORT);
    let broadcaster = EventBroadcaster::default();
    let (handle, _task) = SessionRunner::new(session_config(), Arc::new(analyzer))
        .with_broadcaster(broadcaster.clone())
        .spawn();

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let server = DashboardServer::new(
        DashboardConfig::default(),
        handle.clone(),
        broadcaster.clone(),
    );
    tokio::spawn(server.serve_on(listener));

    Harness {
        base,
        handle,
        calls,
        broadcaster,
        http: reqwest::Client::new(),
    }
}

impl Harness {
    async fn get_json(&self, path: &str) -> Value {
        let resp = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), StatusCode::OK, "GET {path}");
        resp.json().await.expect("json body")
    }

    async fn post(&self, path: &str) -> StatusCode {
        self.http
            .post(format!("{}{}", self.base, path))
            .send()
            .await
            .expect("request")
            .status()
    }
}

#[tokio::test]
async fn index_serves_html() {
    let h = start_dashboard().await;
    let resp = h.http.get(&h.base).send().await.expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.expect("body");
    assert!(body.contains("Run Maintenance Prediction"));
}

#[tokio::test]
async fn state_reflects_ingested_samples() -> Result<()> {
    let h = start_dashboard().await;
    let state = h.get_json("/api/state").await;
    assert_eq!(state["buffer_capacity"], 10);
    assert_eq!(state["samples"].as_array().map(Vec::len), Some(0));
    assert!(state["analysis"].is_null());

    h.handle.ingest(printer_sample("P-1", 1)).await?;
    h.handle.ingest(cnc_sample("C-1", 2)).await?;
    h.handle.query().await?;

    let state = h.get_json("/api/state").await;
    assert_eq!(state["samples"].as_array().map(Vec::len), Some(2));
    assert_eq!(state["pending_count"], 2);
    assert_eq!(state["latest_printer"]["device_id"], "P-1");
    assert_eq!(state["latest_cnc"]["device_type"], "cnc_machine");
    assert_eq!(state["ops_view"]["visible"], false);
    Ok(())
}

#[tokio::test]
async fn run_analysis_control_publishes_result_and_alerts() -> Result<()> {
    let mut h = start_dashboard().await;
    h.handle.ingest(printer_sample("P-1", 1)).await?;

    assert_eq!(h.post("/api/analysis/run").await, StatusCode::ACCEPTED);
    let window = timeout(Duration::from_secs(1), h.calls.recv())
        .await
        .expect("timeout")
        .expect("analyzer dropped");
    assert_eq!(window.len(), 1);

    let mut snapshots = h.handle.subscribe();
    timeout(
        Duration::from_secs(1),
        snapshots.wait_for(|s| s.analysis.is_some()),
    )
    .await
    .expect("timeout")
    .expect("session closed");

    let alerts = h.get_json("/api/alerts").await;
    assert_eq!(alerts.as_array().map(Vec::len), Some(1));
    assert_eq!(alerts[0]["device"], "Printer-1");
    assert_eq!(alerts[0]["metric"], "temperature");
    assert_eq!(alerts[0]["value"], 85.3);
    assert_eq!(alerts[0]["threshold"], 70.0);
    Ok(())
}

#[tokio::test]
async fn clear_and_toggle_controls() -> Result<()> {
    let h = start_dashboard().await;
    for ts in 1..=3 {
        h.handle.ingest(printer_sample("P-1", ts)).await?;
    }

    assert_eq!(h.post("/api/buffer/clear").await, StatusCode::ACCEPTED);
    assert_eq!(h.post("/api/ops-view/toggle").await, StatusCode::ACCEPTED);

    let snapshot = h.handle.query().await?;
    assert!(snapshot.samples.is_empty());
    assert_eq!(snapshot.pending_count, 3);
    assert!(snapshot.ops_view.visible);
    Ok(())
}

#[tokio::test]
async fn recent_samples_returns_newest_last() -> Result<()> {
    let h = start_dashboard().await;
    for ts in 1..=8 {
        h.handle.ingest(printer_sample("P-1", ts)).await?;
    }
    h.handle.query().await?;

    let recent = h.get_json("/api/samples/recent?limit=3").await;
    let timestamps: Vec<i64> = recent
        .as_array()
        .map(|a| a.iter().filter_map(|s| s["timestamp"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(timestamps, vec![6, 7, 8]);

    let default_limit = h.get_json("/api/samples/recent").await;
    assert_eq!(default_limit.as_array().map(Vec::len), Some(5));
    Ok(())
}

#[tokio::test]
async fn series_is_split_by_device_kind() -> Result<()> {
    let h = start_dashboard().await;
    h.handle.ingest(printer_sample("P-1", 1)).await?;
    h.handle.ingest(cnc_sample("C-1", 2)).await?;
    h.handle.ingest(cnc_sample("C-2", 3)).await?;
    h.handle.query().await?;

    let series = h.get_json("/api/series?device_type=cnc_machine").await;
    let series = series.as_array().cloned().unwrap_or_default();
    assert_eq!(series.len(), 5);
    assert_eq!(series[0]["metric"], "temperature");
    assert_eq!(series[4]["metric"], "tool_wear");
    assert_eq!(series[4]["unit"], "%");
    assert_eq!(series[4]["points"].as_array().map(Vec::len), Some(2));
    assert_eq!(series[4]["points"][1]["timestamp"], 3);

    let printer = h.get_json("/api/series?device_type=3d_printer").await;
    assert_eq!(printer[3]["metric"], "nozzle_temperature");
    assert_eq!(printer[3]["points"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn unknown_device_type_is_bad_request() {
    let h = start_dashboard().await;
    let resp = h
        .http
        .get(format!("{}/api/series?device_type=lathe", h.base))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn controls_fail_once_session_is_gone() -> Result<()> {
    let h = start_dashboard().await;
    h.handle.shutdown().await?;
    // Wait for the loop to drop its receiver
    timeout(Duration::from_secs(1), async {
        while h.handle.query().await.is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session still running");

    assert_eq!(
        h.post("/api/analysis/run").await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    Ok(())
}

#[tokio::test]
async fn event_stream_delivers_session_events() -> Result<()> {
    let h = start_dashboard().await;
    let mut resp = h
        .http
        .get(format!("{}/api/events/stream", h.base))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.broadcaster.subscriber_count(), 1);

    h.handle.ingest(cnc_sample("C-5", 1)).await?;
    let chunk = timeout(Duration::from_secs(2), resp.chunk())
        .await
        .expect("timeout")
        .expect("stream error")
        .expect("stream ended");
    let text = String::from_utf8_lossy(&chunk);
    assert!(text.starts_with("data: "), "unexpected frame: {text}");
    assert!(text.contains("\"event_type\":\"sample_ingested\""));
    assert!(text.contains("\"device_id\":\"C-5\""));
    Ok(())
}

#[tokio::test]
async fn serve_reports_bind_failure() {
    let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = taken.local_addr().expect("addr").port();

    let (analyzer, _calls) = RecordingAnalyzer::new(REPORT);
    let (handle, _task) = SessionRunner::new(session_config(), Arc::new(analyzer)).spawn();
    let config = DashboardConfig {
        port,
        host: "127.0.0.1".to_string(),
    };
    let result = DashboardServer::new(config, handle, EventBroadcaster::default())
        .serve()
        .await;
    assert!(matches!(result, Err(MaintwatchError::DashboardError(_))));
}

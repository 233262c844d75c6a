use std::sync::Arc;
use tokio::sync::watch;

use maintwatch_core::dashboard::{DashboardServer, EventBroadcaster};
use maintwatch_core::telemetry::init_logging;
use maintwatch_core::{AppConfig, LlmAnalyzer, LlmClient, SessionRunner, TelemetryTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_logging();

    let config = AppConfig::load();
    tracing::info!(
        ws_url = %config.transport.url,
        llm = %config.llm.base_url,
        model = %config.llm.model,
        "Starting Maintwatch"
    );

    let analyzer = Arc::new(LlmAnalyzer::new(Some(LlmClient::new(config.llm.clone())?))?);
    let broadcaster = EventBroadcaster::default();

    let (session, session_task) = SessionRunner::new(config.session.clone(), analyzer)
        .with_broadcaster(broadcaster.clone())
        .spawn();

    let dashboard = DashboardServer::new(config.dashboard.clone(), session.clone(), broadcaster);
    tracing::info!(
        "Dashboard enabled at http://{}",
        config.dashboard.addr()
    );
    let dashboard_handle = tokio::spawn(async move {
        if let Err(e) = dashboard.serve().await {
            tracing::error!("Dashboard error: {}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let transport = TelemetryTransport::new(config.transport.clone(), session.sender());
    let transport_handle = tokio::spawn(async move {
        match transport.run(shutdown_rx).await {
            Ok(stats) => tracing::info!(
                connections = stats.connections,
                forwarded = stats.forwarded,
                rejected = stats.rejected,
                "Transport stopped"
            ),
            Err(e) => tracing::error!("Transport error: {}", e),
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down Maintwatch...");

    // Release the feed first so no sample races the session shutdown
    let _ = shutdown_tx.send(true);
    let _ = transport_handle.await;

    if session.shutdown().await.is_ok() {
        let _ = session_task.await;
    }
    dashboard_handle.abort();

    tracing::info!("Maintwatch shut down successfully");
    Ok(())
}

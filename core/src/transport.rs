//! WebSocket client for the telemetry feed.
//!
//! Every inbound text frame is one JSON [`TelemetrySample`]. Decoded samples
//! are queued to the session; frames that do not decode are logged and
//! skipped. The connection is closed with a Close frame when the shutdown
//! signal fires.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::device::TelemetrySample;
use crate::session::SessionCommand;
use crate::{MaintwatchError, Result};

/// Transport configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub url: String,
    /// Delay before reconnecting after the feed drops; 0 disables reconnects
    pub reconnect_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("MAINTWATCH_WS_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "ws://localhost:1880/ws".to_string()),
            reconnect_delay_ms: std::env::var("MAINTWATCH_RECONNECT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0),
        }
    }
}

/// Counters reported when the transport stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub connections: u64,
    pub forwarded: u64,
    pub rejected: u64,
}

enum Exit {
    Shutdown,
    PeerClosed,
    SessionGone,
}

/// Feeds decoded samples from the WebSocket into a session queue
pub struct TelemetryTransport {
    config: TransportConfig,
    sink: mpsc::Sender<SessionCommand>,
}

impl TelemetryTransport {
    pub fn new(config: TransportConfig, sink: mpsc::Sender<SessionCommand>) -> Self {
        Self { config, sink }
    }

    /// Pump messages until shutdown, until the session goes away, or until the
    /// feed drops with reconnects disabled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<TransportStats> {
        let mut stats = TransportStats::default();

        loop {
            if *shutdown.borrow() {
                return Ok(stats);
            }

            match self.connect_and_pump(&mut shutdown, &mut stats).await {
                Ok(Exit::Shutdown) | Ok(Exit::SessionGone) => return Ok(stats),
                Ok(Exit::PeerClosed) => {
                    info!(target: "transport", url = %self.config.url, "Telemetry feed closed by peer");
                    if self.config.reconnect_delay_ms == 0 {
                        return Ok(stats);
                    }
                }
                Err(e) => {
                    warn!(target: "transport", url = %self.config.url, error = %e, "Telemetry feed error");
                    if self.config.reconnect_delay_ms == 0 {
                        return Err(e);
                    }
                }
            }

            let delay = Duration::from_millis(self.config.reconnect_delay_ms);
            debug!(target: "transport", ?delay, "Reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return Ok(stats),
            }
        }
    }

    async fn connect_and_pump(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        stats: &mut TransportStats,
    ) -> Result<Exit> {
        let (mut ws, _) = tokio::select! {
            res = connect_async(self.config.url.as_str()) => res.map_err(|e| {
                MaintwatchError::TransportError(format!("Failed to connect to {}: {e}", self.config.url))
            })?,
            _ = shutdown.changed() => return Ok(Exit::Shutdown),
        };
        stats.connections += 1;
        info!(target: "transport", url = %self.config.url, "Connected to telemetry feed");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if let Err(e) = ws.close(None).await {
                        debug!(target: "transport", error = %e, "Close handshake failed");
                    }
                    info!(target: "transport", "Telemetry feed released");
                    return Ok(Exit::Shutdown);
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !self.forward(text.as_str(), stats).await {
                            return Ok(Exit::SessionGone);
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => {
                            if !self.forward(text, stats).await {
                                return Ok(Exit::SessionGone);
                            }
                        }
                        Err(e) => {
                            stats.rejected += 1;
                            warn!(target: "transport", error = %e, "Dropping non UTF-8 frame");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok(Exit::PeerClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(MaintwatchError::TransportError(format!("WebSocket error: {e}")));
                    }
                },
            }
        }
    }

    /// Decode and queue one message. Returns `false` once the session is gone.
    async fn forward(&self, text: &str, stats: &mut TransportStats) -> bool {
        let sample = match serde_json::from_str::<TelemetrySample>(text) {
            Ok(sample) => sample,
            Err(e) => {
                stats.rejected += 1;
                warn!(target: "transport", error = %e, "Dropping undecodable telemetry message");
                return true;
            }
        };
        debug!(target: "transport", device_id = %sample.device_id, "Received device data");

        if self.sink.send(SessionCommand::Ingest(sample)).await.is_err() {
            warn!(target: "transport", "Session closed; stopping transport");
            return false;
        }
        stats.forwarded += 1;
        true
    }
}

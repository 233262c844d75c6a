#![allow(dead_code)]

use async_trait::async_trait;
use maintwatch_core::{
    CncReadings, DeviceReadings, MaintenanceAnalyzer, MaintwatchError, PrinterReadings, Result,
    SessionConfig, TelemetrySample,
};
use tokio::sync::mpsc;

pub fn printer_sample(device_id: &str, timestamp: i64) -> TelemetrySample {
    TelemetrySample {
        device_id: device_id.to_string(),
        temperature: 48.0,
        vibration: 2.0,
        power_consumption: 400.0,
        timestamp,
        readings: DeviceReadings::Printer(PrinterReadings {
            nozzle_temperature: 210.0,
            bed_temperature: 60.0,
            filament_flow_rate: 1.0,
            print_speed: 60.0,
            layer_height: 0.2,
            extruder_position: 3.0,
        }),
    }
}

pub fn cnc_sample(device_id: &str, timestamp: i64) -> TelemetrySample {
    TelemetrySample {
        device_id: device_id.to_string(),
        temperature: 52.0,
        vibration: 5.0,
        power_consumption: 800.0,
        timestamp,
        readings: DeviceReadings::Cnc(CncReadings {
            spindle_speed: 9000.0,
            feed_rate: 250.0,
            cutting_depth: 2.0,
            tool_wear: 35.0,
            axis_position_x: 1.0,
            axis_position_y: 2.0,
            axis_position_z: 3.0,
        }),
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        buffer_capacity: 10,
        analysis_every: 10,
        ops_view_url: "http://localhost:1880/".to_string(),
        command_queue: 64,
    }
}

/// Analyzer that reports every window it is handed
pub struct RecordingAnalyzer {
    calls: mpsc::UnboundedSender<Vec<TelemetrySample>>,
    reply: String,
    fail: bool,
}

impl RecordingAnalyzer {
    pub fn new(reply: &str) -> (Self, mpsc::UnboundedReceiver<Vec<TelemetrySample>>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (
            Self {
                calls,
                reply: reply.to_string(),
                fail: false,
            },
            rx,
        )
    }

    pub fn failing() -> (Self, mpsc::UnboundedReceiver<Vec<TelemetrySample>>) {
        let (mut analyzer, rx) = Self::new("");
        analyzer.fail = true;
        (analyzer, rx)
    }
}

#[async_trait]
impl MaintenanceAnalyzer for RecordingAnalyzer {
    async fn analyze(&self, samples: &[TelemetrySample]) -> Result<String> {
        let _ = self.calls.send(samples.to_vec());
        if self.fail {
            return Err(MaintwatchError::AnalysisError(
                "simulated network error".into(),
            ));
        }
        Ok(self.reply.clone())
    }
}

//! Device telemetry data model.
//!
//! Samples arrive as flat JSON objects. The common envelope fields sit next to
//! the device-specific readings, and `device_type` selects the variant:
//!
//! ```json
//! {"device_id":"P-001","device_type":"3d_printer","temperature":42.1,
//!  "vibration":1.2,"power_consumption":350.0,"timestamp":1718000000,
//!  "nozzle_temperature":210.0,"bed_temperature":60.0, ...}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device class reporting the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "3d_printer")]
    Printer,
    #[serde(rename = "cnc_machine")]
    Cnc,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 2] = [DeviceKind::Printer, DeviceKind::Cnc];

    /// Wire value of `device_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Printer => "3d_printer",
            DeviceKind::Cnc => "cnc_machine",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Printer => "3D Printer",
            DeviceKind::Cnc => "CNC Machine",
        }
    }

    /// Metrics charted for this device kind: the common channels followed by
    /// the two device-specific ones worth watching.
    pub fn chart_metrics(&self) -> [Metric; 5] {
        match self {
            DeviceKind::Printer => [
                Metric::Temperature,
                Metric::Vibration,
                Metric::PowerConsumption,
                Metric::NozzleTemperature,
                Metric::BedTemperature,
            ],
            DeviceKind::Cnc => [
                Metric::Temperature,
                Metric::Vibration,
                Metric::PowerConsumption,
                Metric::SpindleSpeed,
                Metric::ToolWear,
            ],
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 3D printer specific readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterReadings {
    pub nozzle_temperature: f64,
    pub bed_temperature: f64,
    pub filament_flow_rate: f64,
    pub print_speed: f64,
    pub layer_height: f64,
    pub extruder_position: f64,
}

/// CNC machine specific readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CncReadings {
    pub spindle_speed: f64,
    pub feed_rate: f64,
    pub cutting_depth: f64,
    pub tool_wear: f64,
    pub axis_position_x: f64,
    pub axis_position_y: f64,
    pub axis_position_z: f64,
}

/// Device-specific part of a sample, discriminated by `device_type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device_type")]
pub enum DeviceReadings {
    #[serde(rename = "3d_printer")]
    Printer(PrinterReadings),
    #[serde(rename = "cnc_machine")]
    Cnc(CncReadings),
}

/// One timestamped reading from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    pub temperature: f64,
    pub vibration: f64,
    pub power_consumption: f64,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    #[serde(flatten)]
    pub readings: DeviceReadings,
}

impl TelemetrySample {
    pub fn kind(&self) -> DeviceKind {
        match self.readings {
            DeviceReadings::Printer(_) => DeviceKind::Printer,
            DeviceReadings::Cnc(_) => DeviceKind::Cnc,
        }
    }

    /// Value of `metric`, or `None` when the metric belongs to the other device kind
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let common = match metric {
            Metric::Temperature => Some(self.temperature),
            Metric::Vibration => Some(self.vibration),
            Metric::PowerConsumption => Some(self.power_consumption),
            _ => None,
        };
        if common.is_some() {
            return common;
        }

        match &self.readings {
            DeviceReadings::Printer(p) => match metric {
                Metric::NozzleTemperature => Some(p.nozzle_temperature),
                Metric::BedTemperature => Some(p.bed_temperature),
                Metric::FilamentFlowRate => Some(p.filament_flow_rate),
                Metric::PrintSpeed => Some(p.print_speed),
                Metric::LayerHeight => Some(p.layer_height),
                Metric::ExtruderPosition => Some(p.extruder_position),
                _ => None,
            },
            DeviceReadings::Cnc(c) => match metric {
                Metric::SpindleSpeed => Some(c.spindle_speed),
                Metric::FeedRate => Some(c.feed_rate),
                Metric::CuttingDepth => Some(c.cutting_depth),
                Metric::ToolWear => Some(c.tool_wear),
                Metric::AxisPositionX => Some(c.axis_position_x),
                Metric::AxisPositionY => Some(c.axis_position_y),
                Metric::AxisPositionZ => Some(c.axis_position_z),
                _ => None,
            },
        }
    }

    /// Short device-specific summary, e.g. `Nozzle: 215.00°C`
    pub fn headline(&self) -> String {
        match &self.readings {
            DeviceReadings::Printer(p) => format!("Nozzle: {:.2}°C", p.nozzle_temperature),
            DeviceReadings::Cnc(c) => format!("Spindle: {:.2} RPM", c.spindle_speed),
        }
    }
}

/// Numeric telemetry channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Vibration,
    PowerConsumption,
    NozzleTemperature,
    BedTemperature,
    FilamentFlowRate,
    PrintSpeed,
    LayerHeight,
    ExtruderPosition,
    SpindleSpeed,
    FeedRate,
    CuttingDepth,
    ToolWear,
    AxisPositionX,
    AxisPositionY,
    AxisPositionZ,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature",
            Metric::Vibration => "Vibration",
            Metric::PowerConsumption => "Power Consumption",
            Metric::NozzleTemperature => "Nozzle Temperature",
            Metric::BedTemperature => "Bed Temperature",
            Metric::FilamentFlowRate => "Filament Flow Rate",
            Metric::PrintSpeed => "Print Speed",
            Metric::LayerHeight => "Layer Height",
            Metric::ExtruderPosition => "Extruder Position",
            Metric::SpindleSpeed => "Spindle Speed",
            Metric::FeedRate => "Feed Rate",
            Metric::CuttingDepth => "Cutting Depth",
            Metric::ToolWear => "Tool Wear",
            Metric::AxisPositionX => "Axis Position X",
            Metric::AxisPositionY => "Axis Position Y",
            Metric::AxisPositionZ => "Axis Position Z",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Temperature | Metric::NozzleTemperature | Metric::BedTemperature => "°C",
            Metric::PowerConsumption => "W",
            Metric::SpindleSpeed => "RPM",
            Metric::FeedRate => "mm/min",
            Metric::ToolWear => "%",
            _ => "",
        }
    }

    /// Whether samples of `kind` carry this metric
    pub fn applies_to(&self, kind: DeviceKind) -> bool {
        match self {
            Metric::Temperature | Metric::Vibration | Metric::PowerConsumption => true,
            Metric::NozzleTemperature
            | Metric::BedTemperature
            | Metric::FilamentFlowRate
            | Metric::PrintSpeed
            | Metric::LayerHeight
            | Metric::ExtruderPosition => kind == DeviceKind::Printer,
            Metric::SpindleSpeed
            | Metric::FeedRate
            | Metric::CuttingDepth
            | Metric::ToolWear
            | Metric::AxisPositionX
            | Metric::AxisPositionY
            | Metric::AxisPositionZ => kind == DeviceKind::Cnc,
        }
    }
}

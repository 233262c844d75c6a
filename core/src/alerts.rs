//! Critical alert extraction from free-form analysis text.
//!
//! The analysis prompt asks the model for a numbered report whose first
//! section lists threshold violations as `Device (ID) - Metric: Value` lines.
//! Nothing enforces that structure upstream, so every step here degrades to
//! "not an alert" rather than failing.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Header opening the critical alerts section
pub const CRITICAL_ALERTS_MARKER: &str = "1. Critical Alerts:";
/// Header of the section following critical alerts
pub const RECOMMENDATIONS_MARKER: &str = "2. Key Recommendations:";

/// Line delimiter between the device label and the metric. Device labels may
/// contain it too, so the last occurrence before the `:` is the split point.
const DEVICE_DELIMITER: &str = " - ";

/// First integer or decimal number in a value segment, ASCII digits only
static NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"[0-9]+(\.[0-9]+)?"));

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Covered by `number_pattern_compiles`
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertParseError {
    #[error("analysis text has no `{0}` section")]
    MissingSection(&'static str),
}

/// Metrics that get highlighted when reported as critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    Temperature,
    Vibration,
    PowerConsumption,
    ToolWear,
}

impl AlertMetric {
    /// Lookup order; a line matches the first keyword it contains
    pub const TABLE: [AlertMetric; 4] = [
        AlertMetric::Temperature,
        AlertMetric::Vibration,
        AlertMetric::PowerConsumption,
        AlertMetric::ToolWear,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            AlertMetric::Temperature => "temperature",
            AlertMetric::Vibration => "vibration",
            AlertMetric::PowerConsumption => "power consumption",
            AlertMetric::ToolWear => "tool wear",
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            AlertMetric::Temperature => 70.0,
            AlertMetric::Vibration => 8.0,
            AlertMetric::PowerConsumption => 900.0,
            AlertMetric::ToolWear => 80.0,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            AlertMetric::Temperature => "°C",
            AlertMetric::Vibration => "",
            AlertMetric::PowerConsumption => "W",
            AlertMetric::ToolWear => "%",
        }
    }

    /// First table entry whose keyword occurs in `line` (case-insensitive)
    pub fn find_in(line: &str) -> Option<AlertMetric> {
        let lower = line.to_lowercase();
        Self::TABLE
            .into_iter()
            .find(|metric| lower.contains(metric.keyword()))
    }
}

/// One highlighted threshold violation reported by the analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalAlert {
    pub device: String,
    pub metric: AlertMetric,
    /// Metric label as written in the analysis text
    pub metric_label: String,
    pub value: f64,
    pub threshold: f64,
    pub unit: &'static str,
}

impl CriticalAlert {
    /// e.g. `Printer-1: Critical Temperature`
    pub fn title(&self) -> String {
        let keyword = self.metric.keyword();
        let mut chars = keyword.chars();
        let keyword = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{}: Critical {}", self.device, keyword)
    }

    /// e.g. `Current value: 85.30°C (Threshold: 70°C)`
    pub fn description(&self) -> String {
        format!(
            "Current value: {:.2}{} (Threshold: {}{})",
            self.value, self.unit, self.threshold, self.unit
        )
    }
}

/// Text between the critical alerts header and the recommendations header.
///
/// When the recommendations header is absent the section runs to the end of
/// the text. A missing critical alerts header is an error.
pub fn critical_section(text: &str) -> Result<&str, AlertParseError> {
    let (_, after) = text
        .split_once(CRITICAL_ALERTS_MARKER)
        .ok_or(AlertParseError::MissingSection(CRITICAL_ALERTS_MARKER))?;
    let section = match after.split_once(RECOMMENDATIONS_MARKER) {
        Some((section, _)) => section,
        None => after,
    };
    Ok(section.trim())
}

/// Parse one line of the critical alerts section.
///
/// Returns `None` for lines without a known metric keyword, without the
/// `device - metric: value` structure, or without a numeric value.
pub fn parse_alert_line(line: &str) -> Option<CriticalAlert> {
    let metric = AlertMetric::find_in(line)?;

    let line = strip_bullet(line.trim());
    let (head, value_text) = line.split_once(':')?;
    let (device, metric_label) = head.rsplit_once(DEVICE_DELIMITER)?;

    let number = NUMBER_REGEX.find(value_text)?;
    let value = number.as_str().parse::<f64>().ok()?;

    Some(CriticalAlert {
        device: device.trim().to_string(),
        metric,
        metric_label: metric_label.trim().to_string(),
        value,
        threshold: metric.threshold(),
        unit: metric.unit(),
    })
}

/// All critical alerts found in an analysis. Never fails: text that does not
/// follow the expected layout simply yields no alerts.
pub fn extract_alerts(text: &str) -> Vec<CriticalAlert> {
    match critical_section(text) {
        Ok(section) => section.lines().filter_map(parse_alert_line).collect(),
        Err(e) => {
            debug!(target: "alerts", error = %e, "No critical alerts section");
            Vec::new()
        }
    }
}

fn strip_bullet(line: &str) -> &str {
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }
    line
}

//! Prompt construction for maintenance analysis.

use crate::alerts::{CRITICAL_ALERTS_MARKER, RECOMMENDATIONS_MARKER};
use crate::device::TelemetrySample;
use crate::Result;

use super::client::ChatMessage;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant specialized in predictive maintenance.";

/// Threshold list quoted to the model
pub const THRESHOLDS: &[(&str, &str)] = &[
    ("Temperature", ">70°C"),
    ("Vibration", ">8"),
    ("Power Consumption", ">900W"),
    ("Nozzle Temperature (3D Printer)", ">250°C"),
    ("Bed Temperature (3D Printer)", ">110°C"),
    ("Spindle Speed (CNC Machine)", ">20000 RPM"),
    ("Tool Wear (CNC Machine)", ">80%"),
];

/// User prompt embedding the pretty-printed window and the expected report layout.
/// The section headers must stay in sync with alert extraction.
pub fn build_user_prompt(samples: &[TelemetrySample]) -> Result<String> {
    let data = serde_json::to_string_pretty(samples)?;

    let thresholds = THRESHOLDS
        .iter()
        .map(|(name, limit)| format!("- {name}: {limit}"))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "Analyze the following data points for maintenance issues:
{data}

Provide a concise analysis in this format:

{CRITICAL_ALERTS_MARKER}
   - List only values exceeding thresholds. Format: Device (ID) - Metric: Value

{RECOMMENDATIONS_MARKER}
   - List 2-3 most important actions for each device

3. Health Summary:
   - One-line status for each device: \"Good\", \"Needs Attention\", or \"Critical\"

Use these thresholds:
{thresholds}

Keep the analysis brief and actionable."
    ))
}

/// System + user messages for one analysis request
pub fn build_messages(samples: &[TelemetrySample]) -> Result<Vec<ChatMessage>> {
    Ok(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_user_prompt(samples)?),
    ])
}

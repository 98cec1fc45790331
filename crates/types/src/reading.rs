//! A single classified, formatted sensor reading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::metric::MetricKind;

/// Presentation severity of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBand {
    Normal,
    Warning,
    Critical,
    /// No thresholds configured for the kind, or the value was not a number
    #[default]
    Unknown,
}

impl SeverityBand {
    pub fn label(&self) -> &'static str {
        match self {
            SeverityBand::Normal => "normal",
            SeverityBand::Warning => "warning",
            SeverityBand::Critical => "critical",
            SeverityBand::Unknown => "unknown",
        }
    }

    /// Background tint for the band
    pub fn color(&self) -> Color {
        let opaque = match self {
            SeverityBand::Normal => Color::new(0.204, 0.780, 0.349, 1.0),
            SeverityBand::Warning => Color::new(1.0, 0.800, 0.0, 1.0),
            SeverityBand::Critical => Color::new(1.0, 0.231, 0.188, 1.0),
            SeverityBand::Unknown => Color::new(0.0, 0.478, 1.0, 1.0),
        };
        opaque.with_alpha(0.7)
    }
}

/// Latest value of one metric
///
/// Readings are immutable: every successful poll produces a new one that
/// replaces the previous reading for the same kind wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub kind: MetricKind,
    /// Value as reported by the accessory (Celsius for temperature)
    pub raw_value: f64,
    /// Display string including the unit
    pub formatted: String,
    pub band: SeverityBand,
    /// Accessory the value was read from
    pub accessory_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        kind: MetricKind,
        raw_value: f64,
        formatted: impl Into<String>,
        band: SeverityBand,
        accessory_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            raw_value,
            formatted: formatted.into(),
            band,
            accessory_id: accessory_id.into(),
            timestamp: Utc::now(),
        }
    }
}

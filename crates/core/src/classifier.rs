//! Threshold-based severity classification

use openair_types::{MetricKind, SeverityBand, Threshold, ThresholdConfig};
use serde_json::Value;

use crate::units::numeric_value;

/// Maps a metric value to a presentation band
///
/// `value < lower` is normal, `lower <= value < upper` is a warning and
/// `value >= upper` is critical. Kinds without a configured threshold, and
/// values that are not finite numbers, are always unknown.
#[derive(Debug, Clone, Default)]
pub struct ThresholdClassifier {
    config: ThresholdConfig,
}

impl ThresholdClassifier {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn threshold(&self, kind: MetricKind) -> Option<Threshold> {
        self.config.get(kind)
    }

    pub fn classify(&self, kind: MetricKind, value: f64) -> SeverityBand {
        let Some(threshold) = self.config.get(kind) else {
            return SeverityBand::Unknown;
        };
        if !value.is_finite() {
            return SeverityBand::Unknown;
        }

        if value < threshold.lower {
            SeverityBand::Normal
        } else if value < threshold.upper {
            SeverityBand::Warning
        } else {
            SeverityBand::Critical
        }
    }

    /// Classify a value that may be missing
    pub fn classify_opt(&self, kind: MetricKind, value: Option<f64>) -> SeverityBand {
        value.map_or(SeverityBand::Unknown, |v| self.classify(kind, v))
    }

    /// Classify a raw characteristic value as reported by the source
    pub fn classify_value(&self, kind: MetricKind, value: &Value) -> SeverityBand {
        self.classify_opt(kind, numeric_value(value))
    }
}

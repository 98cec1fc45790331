//! Per-metric severity thresholds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metric::MetricKind;

/// Band boundaries for one metric
///
/// Values below `lower` are normal, values in `[lower, upper)` are a
/// warning, and values at or above `upper` are critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub lower: f64,
    pub upper: f64,
}

impl Threshold {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }
}

/// Threshold table keyed by metric kind
///
/// Kinds missing from the table have no bands at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdConfig {
    pub bands: BTreeMap<MetricKind, Threshold>,
}

impl ThresholdConfig {
    /// A table with no thresholds; everything classifies as unknown
    pub fn empty() -> Self {
        Self {
            bands: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: MetricKind) -> Option<Threshold> {
        self.bands.get(&kind).copied()
    }

    pub fn set(&mut self, kind: MetricKind, threshold: Threshold) {
        self.bands.insert(kind, threshold);
    }

    pub fn remove(&mut self, kind: MetricKind) -> Option<Threshold> {
        self.bands.remove(&kind)
    }

    /// Check every entry has finite bounds with `lower <= upper`
    pub fn validate(&self) -> Result<(), String> {
        for (kind, threshold) in &self.bands {
            if !threshold.is_valid() {
                return Err(format!(
                    "Invalid threshold for {}: lower {} / upper {}",
                    kind.id(),
                    threshold.lower,
                    threshold.upper
                ));
            }
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let mut bands = BTreeMap::new();
        bands.insert(MetricKind::Co2, Threshold::new(800.0, 1500.0));
        bands.insert(MetricKind::Pm2_5, Threshold::new(25.0, 50.0));
        bands.insert(MetricKind::Voc, Threshold::new(50.0, 100.0));
        bands.insert(MetricKind::No2, Threshold::new(25.0, 50.0));
        Self { bands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_air_quality_only() {
        let config = ThresholdConfig::default();
        assert_eq!(config.get(MetricKind::Co2), Some(Threshold::new(800.0, 1500.0)));
        assert_eq!(config.get(MetricKind::Pm2_5), Some(Threshold::new(25.0, 50.0)));
        assert_eq!(config.get(MetricKind::Voc), Some(Threshold::new(50.0, 100.0)));
        assert_eq!(config.get(MetricKind::No2), Some(Threshold::new(25.0, 50.0)));
        assert!(config.get(MetricKind::Temperature).is_none());
        assert!(config.get(MetricKind::Humidity).is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = ThresholdConfig::empty();
        config.set(MetricKind::Co2, Threshold::new(1500.0, 800.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let json = serde_json::to_string(&ThresholdConfig::default()).unwrap();
        assert!(json.starts_with("{\"co2\":{\"lower\":800.0,\"upper\":1500.0}"));

        let parsed: ThresholdConfig =
            serde_json::from_str(r#"{"humidity": {"lower": 30, "upper": 60}}"#).unwrap();
        assert_eq!(parsed.get(MetricKind::Humidity), Some(Threshold::new(30.0, 60.0)));
        assert!(parsed.get(MetricKind::Co2).is_none());
    }
}

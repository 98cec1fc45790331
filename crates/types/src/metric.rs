//! Metric kinds reported by an air-quality accessory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of metrics the monitor knows how to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Co2,
    #[serde(rename = "pm2_5")]
    Pm2_5,
    Voc,
    No2,
    Temperature,
    Humidity,
}

impl MetricKind {
    /// Every kind, in display order
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Co2,
        MetricKind::Pm2_5,
        MetricKind::Voc,
        MetricKind::No2,
        MetricKind::Temperature,
        MetricKind::Humidity,
    ];

    /// Stable identifier used in config files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            MetricKind::Co2 => "co2",
            MetricKind::Pm2_5 => "pm2_5",
            MetricKind::Voc => "voc",
            MetricKind::No2 => "no2",
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
        }
    }

    /// Short caption shown next to the value
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Co2 => "CO2",
            MetricKind::Pm2_5 => "PM2.5",
            MetricKind::Voc => "TVOC",
            MetricKind::No2 => "NOx",
            MetricKind::Temperature => "Temp",
            MetricKind::Humidity => "Humidity",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['.', '-'], "_");
        match normalized.as_str() {
            "co2" => Ok(MetricKind::Co2),
            "pm2_5" | "pm25" => Ok(MetricKind::Pm2_5),
            "voc" | "tvoc" => Ok(MetricKind::Voc),
            "no2" | "nox" => Ok(MetricKind::No2),
            "temperature" | "temp" => Ok(MetricKind::Temperature),
            "humidity" => Ok(MetricKind::Humidity),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_ids_and_labels() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.id().parse::<MetricKind>().unwrap(), kind);
            assert_eq!(kind.label().parse::<MetricKind>().unwrap(), kind);
        }
        assert!("ozone".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_serde_names_match_ids() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
    }
}

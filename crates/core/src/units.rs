//! Unit conversion and display formatting
//!
//! Everything here is a pure function. Temperatures arrive in Celsius and are
//! shown as whole degrees Fahrenheit unless the display is set to Celsius.
//! Rounding is to the nearest integer with halves rounded away from zero
//! (`f64::round`), so 36.5 °F shows as 37 and -0.5 as -1.

use openair_types::{MetricKind, TemperatureUnit};
use serde_json::Value;

/// Convert Celsius to whole degrees Fahrenheit
pub fn to_fahrenheit(celsius: f64) -> f64 {
    (celsius * 1.8 + 32.0).round()
}

/// Unit suffix for a metric
pub fn unit_suffix(kind: MetricKind, temperature_unit: TemperatureUnit) -> &'static str {
    match kind {
        MetricKind::Co2 => "ppm",
        MetricKind::Pm2_5 | MetricKind::Voc | MetricKind::No2 => "µg/m³",
        MetricKind::Temperature => temperature_unit.symbol(),
        MetricKind::Humidity => "%",
    }
}

/// Extract a finite number from a characteristic value
///
/// Numbers and numeric strings are accepted; everything else (null, bools,
/// objects, NaN) is treated as unparsable.
pub fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Format a raw reading for display, temperatures in Fahrenheit
pub fn format(kind: MetricKind, raw_value: f64) -> String {
    format_with_unit(kind, raw_value, TemperatureUnit::Fahrenheit)
}

/// Format a raw reading for display with an explicit temperature unit
pub fn format_with_unit(
    kind: MetricKind,
    raw_value: f64,
    temperature_unit: TemperatureUnit,
) -> String {
    let shown = match (kind, temperature_unit) {
        (MetricKind::Temperature, TemperatureUnit::Fahrenheit) => {
            format_number(to_fahrenheit(raw_value))
        }
        (MetricKind::Temperature, TemperatureUnit::Celsius) => {
            format!("{:.1}", raw_value + 0.0)
        }
        _ => format_number(raw_value),
    };
    format!("{} {}", shown, unit_suffix(kind, temperature_unit))
}

/// Whole numbers without decimals, anything else with one decimal
fn format_number(value: f64) -> String {
    // Adding 0.0 folds -0.0 into 0.0 so it never prints as "-0"
    let value = value + 0.0;
    if (value - value.round()).abs() < 1e-9 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

//! openair-types: Shared data types for the OpenAir sensor monitor.
//!
//! This crate contains pure data types (metric kinds, readings, home and
//! accessory descriptions, threshold and unit configs) shared by every
//! OpenAir crate. Nothing in here polls, schedules or persists anything.

pub mod color;
pub mod home;
pub mod metric;
pub mod reading;
pub mod selection;
pub mod thresholds;
pub mod units;

// Re-export commonly used types at the crate root for convenience
pub use color::Color;
pub use home::{Accessory, CharacteristicType, Home, Service, ServiceType};
pub use metric::MetricKind;
pub use reading::{Reading, SeverityBand};
pub use selection::{SourceSelection, SELECTED_ACCESSORY_KEY, SELECTED_HOME_KEY};
pub use thresholds::{Threshold, ThresholdConfig};
pub use units::TemperatureUnit;

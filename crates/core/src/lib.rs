//! openair-core: Core traits and pure logic for the OpenAir sensor monitor.
//!
//! This crate contains the collaborator seams (SensorSource, SettingsStore),
//! the subscription list used for change notifications, the threshold
//! classifier and the unit converter. It owns no runtime state of its own.

pub mod constants;
mod classifier;
mod error;
mod sensor_source;
mod settings_store;
mod subscribers;
pub mod units;

pub use classifier::ThresholdClassifier;
pub use constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_READ_TIMEOUT, MISSING_VALUE_PLACEHOLDER, NO_ACCESSORY_SELECTED,
};
pub use error::SourceError;
pub use sensor_source::{HomesChangedCallback, SensorSource, SharedSensorSource};
pub use settings_store::{MemoryStore, SettingsStore};
pub use subscribers::{Subscribers, SubscriptionToken};

// Re-export types used in trait signatures for convenience
pub use openair_types::{
    Accessory, CharacteristicType, Home, MetricKind, Reading, SeverityBand, SourceSelection,
    TemperatureUnit, Threshold, ThresholdConfig,
};

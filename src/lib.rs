//! openair: an air-quality dashboard for home-automation sensors
//!
//! This library provides:
//! - The metric store, accessory selection and poll loop
//! - A simulated sensor source
//! - Configuration and selection persistence
//! - A plain-text panel renderer

pub mod config;
pub mod core;
pub mod sources;
pub mod ui;

// Re-export commonly used types
pub use config::{AppConfig, JsonFileStore};
pub use core::{AccessorySelection, MetricStore, PollLoop, PollOptions, PollStatus};

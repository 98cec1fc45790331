//! Built-in sensor sources
//!
//! Real deployments plug a home-automation bridge in through
//! [`openair_core::SensorSource`]; the simulator ships with the crate so the
//! dashboard runs anywhere.

mod simulated;

pub use simulated::{demo_homes, SimulatedHome, SimulatedSource, SimulatedSourceConfig, WaveMode};

//! Shared constants for the monitor

use std::time::Duration;

/// Poll interval used when none is configured (5 seconds)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long a single characteristic read may take before it is abandoned.
/// A read that times out is simply skipped until the next tick.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Status text shown while no accessory is selected
pub const NO_ACCESSORY_SELECTED: &str = "No Accessory Selected";

/// Placeholder shown for a metric that has never been read
pub const MISSING_VALUE_PLACEHOLDER: &str = "--";

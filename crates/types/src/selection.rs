//! The home/accessory pair the monitor is currently reading from.

use serde::{Deserialize, Serialize};

/// Persistence key for the selected home identifier
pub const SELECTED_HOME_KEY: &str = "SelectedHomeIdentifier";

/// Persistence key for the selected accessory identifier
pub const SELECTED_ACCESSORY_KEY: &str = "SelectedAccessoryIdentifier";

/// A complete selection: both identifiers are known
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSelection {
    pub home_id: String,
    pub accessory_id: String,
}

impl SourceSelection {
    pub fn new(home_id: impl Into<String>, accessory_id: impl Into<String>) -> Self {
        Self {
            home_id: home_id.into(),
            accessory_id: accessory_id.into(),
        }
    }
}

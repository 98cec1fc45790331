//! Errors reported by sensor sources

use openair_types::CharacteristicType;
use thiserror::Error;

/// Failure of a sensor collaborator call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Unknown accessory: {0}")]
    UnknownAccessory(String),

    #[error("Accessory {accessory_id} does not expose {characteristic:?}")]
    CharacteristicUnavailable {
        accessory_id: String,
        characteristic: CharacteristicType,
    },

    #[error("Read timed out after {0} ms")]
    Timeout(u64),

    #[error("Communication error: {0}")]
    Communication(String),
}

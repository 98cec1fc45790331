//! Configuration management

mod settings;
mod store;

pub use settings::{AppConfig, DisplayConfig, PollConfig};
pub use store::JsonFileStore;

/// File name of the persisted selection, next to `config.json`
pub const SELECTION_FILE: &str = "selection.json";

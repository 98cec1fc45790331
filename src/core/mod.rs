//! Application state: readings, the chosen accessory and the poll loop

mod accessory_selection;
mod metric_store;
mod poll_loop;

pub use accessory_selection::{
    AccessorySelection, SelectionError, SelectionEvent, NO_ACCESSORY_LABEL, NO_HOME_LABEL,
};
pub use metric_store::{MetricStore, StoreEvent};
pub use poll_loop::{PollError, PollLoop, PollOptions, PollStatus};

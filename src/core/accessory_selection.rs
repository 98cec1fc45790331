//! Selected home/accessory with write-through persistence
//!
//! The selection is the only owner of the current home and accessory ids.
//! Everything else learns about changes through `subscribe`.

use log::{debug, info, warn};
use openair_core::{
    SettingsStore, SharedSensorSource, SourceSelection, Subscribers, SubscriptionToken,
};
use openair_types::{Home, SELECTED_ACCESSORY_KEY, SELECTED_HOME_KEY};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use thiserror::Error;

/// Label shown before a home is picked
pub const NO_HOME_LABEL: &str = "Select a Home";

/// Label shown before an accessory is picked
pub const NO_ACCESSORY_LABEL: &str = "Select an Accessory";

/// Reasons a select call is rejected
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Unknown home: {0}")]
    UnknownHome(String),

    #[error("Accessory {accessory_id} not found in home {home_id}")]
    UnknownAccessory {
        home_id: String,
        accessory_id: String,
    },

    #[error("No home selected")]
    NoHomeSelected,

    #[error("Failed to persist selection: {0}")]
    Persist(anyhow::Error),
}

/// Change published by the selection
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    HomeSelected(String),
    AccessorySelected(SourceSelection),
    /// A persisted selection was validated and applied
    Restored(SourceSelection),
}

#[derive(Debug, Default)]
struct SelectionState {
    home_id: Option<String>,
    accessory_id: Option<String>,
}

/// Tracks which accessory the monitor reads from
pub struct AccessorySelection {
    source: SharedSensorSource,
    settings: Arc<dyn SettingsStore>,
    state: RwLock<SelectionState>,
    subscribers: Subscribers<SelectionEvent>,
    homes_token: Mutex<Option<SubscriptionToken>>,
}

impl AccessorySelection {
    pub fn new(source: SharedSensorSource, settings: Arc<dyn SettingsStore>) -> Arc<Self> {
        Arc::new(Self {
            source,
            settings,
            state: RwLock::new(SelectionState::default()),
            subscribers: Subscribers::new(),
            homes_token: Mutex::new(None),
        })
    }

    /// Re-run `restore` whenever the source reports a non-empty home list
    pub fn attach(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.source.subscribe_homes_changed(Arc::new(move |homes: &[Home]| {
            let Some(selection) = weak.upgrade() else {
                return;
            };
            if homes.is_empty() {
                debug!("Home list changed but is empty, keeping selection");
                return;
            }
            if selection.restore().is_none() {
                debug!("No persisted selection to restore after home list change");
            }
        }));

        let previous = self
            .homes_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token);
        if let Some(previous) = previous {
            self.source.unsubscribe_homes_changed(previous);
        }
    }

    /// Select a home, persisting its id
    ///
    /// Switching to a different home drops the selected accessory, since it
    /// belongs to the old home.
    pub fn select_home(&self, home_id: &str) -> Result<(), SelectionError> {
        if self.source.find_home(home_id).is_none() {
            return Err(SelectionError::UnknownHome(home_id.to_string()));
        }

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            self.settings
                .set(SELECTED_HOME_KEY, home_id)
                .map_err(SelectionError::Persist)?;
            if state.home_id.as_deref() != Some(home_id) {
                state.accessory_id = None;
            }
            state.home_id = Some(home_id.to_string());
        }

        info!("Selected home {}", home_id);
        self.subscribers
            .notify(&SelectionEvent::HomeSelected(home_id.to_string()));
        Ok(())
    }

    /// Select an accessory of the currently selected home, persisting its id
    pub fn select_accessory(&self, accessory_id: &str) -> Result<(), SelectionError> {
        let selection = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let home_id = state.home_id.clone().ok_or(SelectionError::NoHomeSelected)?;
            if self.source.find_accessory(&home_id, accessory_id).is_none() {
                return Err(SelectionError::UnknownAccessory {
                    home_id,
                    accessory_id: accessory_id.to_string(),
                });
            }

            self.settings
                .set(SELECTED_ACCESSORY_KEY, accessory_id)
                .map_err(SelectionError::Persist)?;
            state.accessory_id = Some(accessory_id.to_string());
            SourceSelection::new(home_id, accessory_id)
        };

        info!(
            "Selected accessory {} in home {}",
            selection.accessory_id, selection.home_id
        );
        self.subscribers
            .notify(&SelectionEvent::AccessorySelected(selection));
        Ok(())
    }

    /// Complete selection, if both a home and an accessory are chosen
    pub fn current(&self) -> Option<SourceSelection> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match (&state.home_id, &state.accessory_id) {
            (Some(home_id), Some(accessory_id)) => {
                Some(SourceSelection::new(home_id.clone(), accessory_id.clone()))
            }
            _ => None,
        }
    }

    pub fn selected_home(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .home_id
            .clone()
    }

    /// Apply the persisted selection if it still resolves
    ///
    /// Returns `None` without complaint when nothing is persisted or when
    /// the persisted home or accessory no longer exists.
    pub fn restore(&self) -> Option<SourceSelection> {
        let home_id = self.settings.get(SELECTED_HOME_KEY)?;
        let accessory_id = self.settings.get(SELECTED_ACCESSORY_KEY)?;

        if self.source.find_home(&home_id).is_none() {
            debug!("Persisted home {} no longer exists", home_id);
            return None;
        }
        if self.source.find_accessory(&home_id, &accessory_id).is_none() {
            debug!(
                "Persisted accessory {} not found in home {}",
                accessory_id, home_id
            );
            return None;
        }

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.home_id = Some(home_id.clone());
            state.accessory_id = Some(accessory_id.clone());
        }

        let selection = SourceSelection::new(home_id, accessory_id);
        info!(
            "Restored accessory {} in home {}",
            selection.accessory_id, selection.home_id
        );
        self.subscribers
            .notify(&SelectionEvent::Restored(selection.clone()));
        Some(selection)
    }

    /// Name of the selected home, or a prompt
    pub fn home_label(&self) -> String {
        self.selected_home()
            .and_then(|home_id| self.source.find_home(&home_id))
            .map(|home| home.name)
            .unwrap_or_else(|| NO_HOME_LABEL.to_string())
    }

    /// Name of the selected accessory, or a prompt
    pub fn accessory_label(&self) -> String {
        self.current()
            .and_then(|sel| self.source.find_accessory(&sel.home_id, &sel.accessory_id))
            .map(|accessory| accessory.name)
            .unwrap_or_else(|| NO_ACCESSORY_LABEL.to_string())
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&SelectionEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.unsubscribe(token)
    }
}

impl Drop for AccessorySelection {
    fn drop(&mut self) {
        let token = self
            .homes_token
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            if !self.source.unsubscribe_homes_changed(token) {
                warn!("Home list subscription was already gone");
            }
        }
    }
}

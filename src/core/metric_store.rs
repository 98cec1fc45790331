//! Latest reading per metric plus per-metric visibility
//!
//! The store never merges values: each update replaces the reading for its
//! kind wholesale. Visibility is presentation state only; it has no influence
//! on what gets polled or stored.

use log::trace;
use openair_core::{MetricKind, Reading, Subscribers, SubscriptionToken};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Change published by the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A reading was replaced (fired even if the value did not change)
    Updated(MetricKind),
    /// A metric was shown or hidden
    VisibilityChanged { kind: MetricKind, visible: bool },
}

/// Holds the current reading of every metric kind
pub struct MetricStore {
    readings: RwLock<HashMap<MetricKind, Reading>>,
    visibility: RwLock<HashMap<MetricKind, bool>>,
    subscribers: Subscribers<StoreEvent>,
}

impl MetricStore {
    /// Create an empty store with every metric visible
    pub fn new() -> Self {
        Self::with_hidden(&[])
    }

    /// Create an empty store with the given metrics hidden
    pub fn with_hidden(hidden: &[MetricKind]) -> Self {
        let visibility = MetricKind::ALL
            .iter()
            .map(|kind| (*kind, !hidden.contains(kind)))
            .collect();
        Self {
            readings: RwLock::new(HashMap::with_capacity(MetricKind::ALL.len())),
            visibility: RwLock::new(visibility),
            subscribers: Subscribers::new(),
        }
    }

    /// Replace the current reading for `reading.kind`
    pub fn update(&self, reading: Reading) {
        let kind = reading.kind;
        trace!("Storing {} = {}", kind.id(), reading.formatted);
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, reading);
        self.subscribers.notify(&StoreEvent::Updated(kind));
    }

    /// Current reading, `None` if the metric was never read
    pub fn get(&self, kind: MetricKind) -> Option<Reading> {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
    }

    /// All current readings in display order
    pub fn readings(&self) -> Vec<Reading> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        MetricKind::ALL
            .iter()
            .filter_map(|kind| readings.get(kind).cloned())
            .collect()
    }

    pub fn set_visible(&self, kind: MetricKind, visible: bool) {
        self.visibility
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, visible);
        self.subscribers
            .notify(&StoreEvent::VisibilityChanged { kind, visible });
    }

    /// Flip visibility, returning the new state
    pub fn toggle_visible(&self, kind: MetricKind) -> bool {
        let visible = !self.is_visible(kind);
        self.set_visible(kind, visible);
        visible
    }

    pub fn is_visible(&self, kind: MetricKind) -> bool {
        self.visibility
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or(true)
    }

    /// Visible kinds in display order
    pub fn visible_kinds(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|kind| self.is_visible(*kind))
            .collect()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.subscribers.unsubscribe(token)
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openair_core::SeverityBand;
    use std::sync::{Arc, Mutex};

    fn reading(kind: MetricKind, value: f64) -> Reading {
        Reading::new(kind, value, format!("{}", value), SeverityBand::Unknown, "acc")
    }

    #[test]
    fn test_missing_metric_is_none_not_zero() {
        let store = MetricStore::new();
        for kind in MetricKind::ALL {
            assert!(store.get(kind).is_none());
        }
        assert!(store.readings().is_empty());
    }

    #[test]
    fn test_update_replaces_reading() {
        let store = MetricStore::new();
        store.update(reading(MetricKind::Co2, 600.0));
        store.update(reading(MetricKind::Co2, 900.0));

        assert_eq!(store.get(MetricKind::Co2).unwrap().raw_value, 900.0);
        assert_eq!(store.readings().len(), 1);
    }

    #[test]
    fn test_every_update_notifies_even_if_unchanged() {
        let store = MetricStore::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        store.update(reading(MetricKind::Humidity, 40.0));
        store.update(reading(MetricKind::Humidity, 40.0));

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                StoreEvent::Updated(MetricKind::Humidity),
                StoreEvent::Updated(MetricKind::Humidity)
            ]
        );
    }

    #[test]
    fn test_visibility_is_independent_of_readings() {
        let store = MetricStore::new();
        assert!(MetricKind::ALL.iter().all(|kind| store.is_visible(*kind)));

        store.set_visible(MetricKind::Voc, false);
        store.update(reading(MetricKind::Voc, 30.0));

        assert!(!store.is_visible(MetricKind::Voc));
        assert_eq!(store.get(MetricKind::Voc).unwrap().raw_value, 30.0);

        assert!(store.toggle_visible(MetricKind::Voc));
        assert_eq!(store.get(MetricKind::Voc).unwrap().raw_value, 30.0);
    }

    #[test]
    fn test_initially_hidden_metrics() {
        let store = MetricStore::with_hidden(&[MetricKind::No2, MetricKind::Humidity]);
        assert_eq!(
            store.visible_kinds(),
            vec![
                MetricKind::Co2,
                MetricKind::Pm2_5,
                MetricKind::Voc,
                MetricKind::Temperature
            ]
        );
    }

    #[test]
    fn test_unsubscribed_observer_is_silent() {
        let store = MetricStore::new();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let token = store.subscribe(move |_| *counter.lock().unwrap() += 1);

        store.set_visible(MetricKind::Co2, false);
        assert!(store.unsubscribe(token));
        store.set_visible(MetricKind::Co2, true);

        assert_eq!(*count.lock().unwrap(), 1);
    }
}

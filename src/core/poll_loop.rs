//! Periodic polling of the selected accessory
//!
//! A single tokio interval drives every read. Each tick spawns one task per
//! relevant characteristic, so a slow or failing characteristic never holds
//! up the others. Results are tagged with the generation that was current
//! when the tick started; `start`, `stop` and selection changes all advance
//! the generation, and a completion only reaches the store if its tag still
//! matches. Every tick also gets a sequence number, and a completion never
//! replaces a reading that came from a later tick, so a slow read cannot
//! overwrite a newer value. These checks and the store write happen under one
//! lock, so once `stop` returns no further update can land.

use super::accessory_selection::AccessorySelection;
use super::metric_store::MetricStore;
use log::{debug, info, trace, warn};
use openair_core::units;
use openair_core::{
    CharacteristicType, MetricKind, Reading, SharedSensorSource, SourceError, Subscribers,
    SubscriptionToken, TemperatureUnit, ThresholdClassifier, DEFAULT_READ_TIMEOUT,
    NO_ACCESSORY_SELECTED,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What the loop is currently doing, for the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Stopped,
    /// Started or restarted, first tick not yet issued
    Loading,
    NoAccessorySelected,
    /// The selected accessory is no longer listed by the source
    AccessoryUnavailable,
    Polling,
}

impl PollStatus {
    pub fn message(&self) -> &'static str {
        match self {
            PollStatus::Stopped => "Not polling",
            PollStatus::Loading => "Loading data...",
            PollStatus::NoAccessorySelected => NO_ACCESSORY_SELECTED,
            PollStatus::AccessoryUnavailable => "Accessory unavailable",
            PollStatus::Polling => "Live",
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum PollError {
    #[error("No tokio runtime available to run the poll loop")]
    NoRuntime,

    #[error("Poll interval must be greater than zero")]
    ZeroInterval,
}

/// Tuning knobs for reads
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// A read that takes longer is abandoned until the next tick
    pub read_timeout: Duration,
    pub temperature_unit: TemperatureUnit,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            temperature_unit: TemperatureUnit::default(),
        }
    }
}

/// The running timer task
struct Schedule {
    interval: Duration,
    runtime: Handle,
    task: JoinHandle<()>,
}

/// State checked before every store write
#[derive(Debug, Default)]
struct Ledger {
    generation: u64,
    /// Ticks issued so far; keeps increasing across generations
    ticks: u64,
    /// Tick that produced the stored reading of each kind
    written: HashMap<MetricKind, u64>,
}

/// Repeating reader feeding the metric store
pub struct PollLoop {
    source: SharedSensorSource,
    selection: Arc<AccessorySelection>,
    store: Arc<MetricStore>,
    classifier: ThresholdClassifier,
    options: PollOptions,
    schedule: Mutex<Option<Schedule>>,
    /// Guards every store write; see module docs
    ledger: Mutex<Ledger>,
    status: RwLock<PollStatus>,
    status_subscribers: Subscribers<PollStatus>,
    selection_token: Mutex<Option<SubscriptionToken>>,
}

impl PollLoop {
    pub fn new(
        source: SharedSensorSource,
        selection: Arc<AccessorySelection>,
        store: Arc<MetricStore>,
        classifier: ThresholdClassifier,
        options: PollOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            selection,
            store,
            classifier,
            options,
            schedule: Mutex::new(None),
            ledger: Mutex::new(Ledger::default()),
            status: RwLock::new(PollStatus::Stopped),
            status_subscribers: Subscribers::new(),
            selection_token: Mutex::new(None),
        })
    }

    /// Restart polling whenever the selection changes
    pub fn attach(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.selection.subscribe(move |_event| {
            if let Some(poll_loop) = weak.upgrade() {
                poll_loop.on_selection_changed();
            }
        });

        let previous = self
            .selection_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token);
        if let Some(previous) = previous {
            self.selection.unsubscribe(previous);
        }
    }

    /// Start (or restart) polling with the given interval
    ///
    /// The first tick fires immediately. Calling `start` while running
    /// replaces the existing schedule.
    pub fn start(self: &Arc<Self>, interval: Duration) -> Result<(), PollError> {
        if interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| PollError::NoRuntime)?;

        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = schedule.take() {
            debug!("Replacing running poll schedule ({:?})", previous.interval);
            previous.task.abort();
        }

        let generation = self.advance_generation(PollStatus::Loading);
        let task = self.spawn_ticker(&runtime, interval);
        *schedule = Some(Schedule {
            interval,
            runtime,
            task,
        });

        info!("Polling every {:?} (generation {})", interval, generation);
        Ok(())
    }

    /// Stop polling; in-flight reads complete but are discarded
    pub fn stop(&self) {
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = match schedule.take() {
            Some(previous) => {
                previous.task.abort();
                true
            }
            None => false,
        };

        let generation = self.advance_generation(PollStatus::Stopped);
        if was_running {
            info!("Polling stopped (generation {})", generation);
        }
    }

    pub fn is_running(&self) -> bool {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Interval of the running schedule
    pub fn interval(&self) -> Option<Duration> {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|schedule| schedule.interval)
    }

    pub fn status(&self) -> PollStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Called with the new status whenever it changes
    ///
    /// Callbacks may run while `start` or `stop` holds the schedule lock, so
    /// they must not call either.
    pub fn subscribe_status<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&PollStatus) + Send + Sync + 'static,
    {
        self.status_subscribers.subscribe(callback)
    }

    pub fn unsubscribe_status(&self, token: SubscriptionToken) -> bool {
        self.status_subscribers.unsubscribe(token)
    }

    /// Swap to a fresh generation and, if running, re-issue reads right away
    fn on_selection_changed(self: &Arc<Self>) {
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        match schedule.as_mut() {
            Some(current) => {
                let generation = self.advance_generation(PollStatus::Loading);
                current.task.abort();
                current.task = self.spawn_ticker(&current.runtime, current.interval);
                debug!("Selection changed, restarted polling as generation {}", generation);
            }
            None => {
                let generation = self.advance_generation(PollStatus::Stopped);
                debug!("Selection changed while stopped (generation {})", generation);
            }
        }
    }

    fn advance_generation(&self, status: PollStatus) -> u64 {
        let (generation, changed) = {
            let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.generation += 1;
            ledger.written.clear();
            (ledger.generation, self.replace_status(status))
        };
        if changed {
            self.status_subscribers.notify(&status);
        }
        generation
    }

    /// Record a status change unless the tick that produced it is stale
    fn set_status_for(&self, generation: u64, status: PollStatus) {
        let changed = {
            let ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.generation == generation && self.replace_status(status)
        };
        if changed {
            self.status_subscribers.notify(&status);
        }
    }

    /// Returns whether the status differs from before
    fn replace_status(&self, status: PollStatus) -> bool {
        let mut current = self.status.write().unwrap_or_else(PoisonError::into_inner);
        let changed = *current != status;
        *current = status;
        changed
    }

    fn spawn_ticker(self: &Arc<Self>, runtime: &Handle, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(poll_loop) = weak.upgrade() else {
                    break;
                };
                poll_loop.tick();
            }
        })
    }

    /// Issue one read per relevant characteristic; returns how many
    fn tick(self: &Arc<Self>) -> usize {
        // Read the generation before the selection: if the selection changes
        // in between, these reads carry the old tag and get discarded.
        let (generation, tick) = {
            let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.ticks += 1;
            (ledger.generation, ledger.ticks)
        };

        let Some(selection) = self.selection.current() else {
            trace!("Tick {}: no accessory selected", generation);
            self.set_status_for(generation, PollStatus::NoAccessorySelected);
            return 0;
        };

        let Some(accessory) = self
            .source
            .find_accessory(&selection.home_id, &selection.accessory_id)
        else {
            warn!(
                "Selected accessory {} is not listed in home {}",
                selection.accessory_id, selection.home_id
            );
            self.set_status_for(generation, PollStatus::AccessoryUnavailable);
            return 0;
        };

        let characteristics = accessory.polled_characteristics();
        trace!(
            "Tick {}: reading {} characteristics from {}",
            generation,
            characteristics.len(),
            accessory.name
        );
        self.set_status_for(generation, PollStatus::Polling);

        let count = characteristics.len();
        for (characteristic, kind) in characteristics {
            let poll_loop = Arc::clone(self);
            let accessory_id = accessory.id.clone();
            tokio::spawn(async move {
                poll_loop
                    .read_one(generation, tick, accessory_id, characteristic, kind)
                    .await;
            });
        }
        count
    }

    async fn read_one(
        self: Arc<Self>,
        generation: u64,
        tick: u64,
        accessory_id: String,
        characteristic: CharacteristicType,
        kind: MetricKind,
    ) {
        let read = self.source.read_characteristic(&accessory_id, &characteristic);
        let result = match tokio::time::timeout(self.options.read_timeout, read).await {
            Ok(result) => result,
            Err(_) => {
                let millis = self.options.read_timeout.as_millis() as u64;
                Err(SourceError::Timeout(millis))
            }
        };
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read {} from {}: {}", kind.id(), accessory_id, e);
                return;
            }
        };

        let Some(raw_value) = units::numeric_value(&value) else {
            debug!("Ignoring unparsable {} value {}", kind.id(), value);
            return;
        };

        let formatted = units::format_with_unit(kind, raw_value, self.options.temperature_unit);
        let band = self.classifier.classify(kind, raw_value);
        let reading = Reading::new(kind, raw_value, formatted, band, accessory_id);

        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        if ledger.generation != generation {
            debug!(
                "Discarding stale {} reading from generation {} (now {})",
                kind.id(),
                generation,
                ledger.generation
            );
            return;
        }
        if let Some(&written) = ledger.written.get(&kind) {
            if written >= tick {
                debug!(
                    "Discarding {} reading from tick {}, tick {} already stored",
                    kind.id(),
                    tick,
                    written
                );
                return;
            }
        }
        ledger.written.insert(kind, tick);
        // Store observers run while the ledger lock is held and must not
        // call back into start/stop.
        self.store.update(reading);
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        if let Some(schedule) = self
            .schedule
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            schedule.task.abort();
        }
        let token = self
            .selection_token
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            self.selection.unsubscribe(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use openair_core::{
        HomesChangedCallback, MemoryStore, SensorSource, SeverityBand, SourceError, Subscribers,
    };
    use openair_types::{Accessory, Home, Service, ServiceType};
    use serde_json::{json, Value};
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, watch};

    const HOME: &str = "home-1";
    const FAST: &str = "acc-fast";
    const SLOW: &str = "acc-slow";

    fn sensor_accessory(id: &str) -> Accessory {
        Accessory {
            id: id.to_string(),
            name: format!("Sensor {}", id),
            services: vec![
                Service::new(
                    ServiceType::AirQualitySensor,
                    vec![
                        CharacteristicType::CarbonDioxideLevel,
                        CharacteristicType::Pm2_5Density,
                        CharacteristicType::VolatileOrganicCompoundDensity,
                        CharacteristicType::NitrogenDioxideDensity,
                    ],
                ),
                Service::new(
                    ServiceType::TemperatureSensor,
                    vec![CharacteristicType::CurrentTemperature],
                ),
                Service::new(
                    ServiceType::HumiditySensor,
                    vec![CharacteristicType::CurrentRelativeHumidity],
                ),
                Service::new(
                    ServiceType::Other("outlet".to_string()),
                    vec![CharacteristicType::Other("power_state".to_string())],
                ),
            ],
        }
    }

    /// Source whose reads can be held back, failed or made unparsable
    struct ScriptedSource {
        accessories: Vec<Accessory>,
        values: HashMap<String, f64>,
        held: Mutex<HashSet<String>>,
        failing: Mutex<HashSet<MetricKind>>,
        garbage: Mutex<HashSet<MetricKind>>,
        /// One-off (delay, value) answers per kind, consumed in order
        scripted: Mutex<HashMap<MetricKind, VecDeque<(Duration, f64)>>>,
        release_tx: watch::Sender<bool>,
        release_rx: watch::Receiver<bool>,
        requests: AtomicUsize,
        requested: mpsc::UnboundedSender<String>,
        homes_changed: Subscribers<Vec<Home>>,
    }

    impl ScriptedSource {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (release_tx, release_rx) = watch::channel(false);
            let (requested, requests_rx) = mpsc::unbounded_channel();
            let mut values = HashMap::new();
            values.insert(FAST.to_string(), 420.0);
            values.insert(SLOW.to_string(), 9999.0);
            let source = Arc::new(Self {
                accessories: vec![sensor_accessory(FAST), sensor_accessory(SLOW)],
                values,
                held: Mutex::new(HashSet::new()),
                failing: Mutex::new(HashSet::new()),
                garbage: Mutex::new(HashSet::new()),
                scripted: Mutex::new(HashMap::new()),
                release_tx,
                release_rx,
                requests: AtomicUsize::new(0),
                requested,
                homes_changed: Subscribers::new(),
            });
            (source, requests_rx)
        }

        fn hold(&self, accessory_id: &str) {
            self.held.lock().unwrap().insert(accessory_id.to_string());
        }

        fn release(&self) {
            self.release_tx.send_replace(true);
        }

        fn fail(&self, kind: MetricKind) {
            self.failing.lock().unwrap().insert(kind);
        }

        fn heal(&self, kind: MetricKind) {
            self.failing.lock().unwrap().remove(&kind);
        }

        fn script(&self, kind: MetricKind, delay: Duration, value: f64) {
            self.scripted
                .lock()
                .unwrap()
                .entry(kind)
                .or_default()
                .push_back((delay, value));
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SensorSource for ScriptedSource {
        fn list_homes(&self) -> Vec<Home> {
            vec![Home {
                id: HOME.to_string(),
                name: "Test Home".to_string(),
            }]
        }

        fn list_accessories(&self, home_id: &str) -> Vec<Accessory> {
            if home_id == HOME {
                self.accessories.clone()
            } else {
                Vec::new()
            }
        }

        async fn read_characteristic(
            &self,
            accessory_id: &str,
            characteristic: &CharacteristicType,
        ) -> Result<Value, SourceError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let _ = self.requested.send(accessory_id.to_string());

            let held = self.held.lock().unwrap().contains(accessory_id);
            if held {
                let mut release = self.release_rx.clone();
                while !*release.borrow_and_update() {
                    if release.changed().await.is_err() {
                        break;
                    }
                }
            }

            let kind = characteristic
                .metric_kind()
                .ok_or_else(|| SourceError::Communication("not a sensor".to_string()))?;
            if self.failing.lock().unwrap().contains(&kind) {
                return Err(SourceError::Communication("no response".to_string()));
            }
            if self.garbage.lock().unwrap().contains(&kind) {
                return Ok(json!("n/a"));
            }
            let scripted = self
                .scripted
                .lock()
                .unwrap()
                .get_mut(&kind)
                .and_then(VecDeque::pop_front);
            if let Some((delay, value)) = scripted {
                tokio::time::sleep(delay).await;
                return Ok(json!(value));
            }
            self.values
                .get(accessory_id)
                .map(|v| json!(v))
                .ok_or_else(|| SourceError::UnknownAccessory(accessory_id.to_string()))
        }

        fn subscribe_homes_changed(&self, callback: HomesChangedCallback) -> SubscriptionToken {
            self.homes_changed
                .subscribe(move |homes: &Vec<Home>| callback(homes.as_slice()))
        }

        fn unsubscribe_homes_changed(&self, token: SubscriptionToken) -> bool {
            self.homes_changed.unsubscribe(token)
        }
    }

    struct Fixture {
        source: Arc<ScriptedSource>,
        requested: mpsc::UnboundedReceiver<String>,
        selection: Arc<AccessorySelection>,
        store: Arc<MetricStore>,
        poll_loop: Arc<PollLoop>,
    }

    fn fixture(options: PollOptions) -> Fixture {
        let (source, requested) = ScriptedSource::new();
        let selection = AccessorySelection::new(source.clone(), Arc::new(MemoryStore::new()));
        let store = Arc::new(MetricStore::new());
        let poll_loop = PollLoop::new(
            source.clone(),
            selection.clone(),
            store.clone(),
            ThresholdClassifier::default(),
            options,
        );
        poll_loop.attach();
        Fixture {
            source,
            requested,
            selection,
            store,
            poll_loop,
        }
    }

    fn select(fixture: &Fixture, accessory_id: &str) {
        fixture.selection.select_home(HOME).unwrap();
        fixture.selection.select_accessory(accessory_id).unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn test_start_needs_runtime_and_interval() {
        let fixture = fixture(PollOptions::default());
        assert_eq!(
            fixture.poll_loop.start(Duration::ZERO),
            Err(PollError::ZeroInterval)
        );
        assert_eq!(
            fixture.poll_loop.start(Duration::from_secs(5)),
            Err(PollError::NoRuntime)
        );
        assert!(!fixture.poll_loop.is_running());
        assert_eq!(fixture.poll_loop.status(), PollStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_without_selection_is_idle() {
        let fixture = fixture(PollOptions::default());
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(fixture.poll_loop.status(), PollStatus::NoAccessorySelected);
        assert_eq!(fixture.poll_loop.status().message(), "No Accessory Selected");
        assert_eq!(fixture.source.requests(), 0);
        assert!(fixture.store.readings().is_empty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(fixture.poll_loop.is_running());
        assert_eq!(fixture.source.requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_fill_store_with_formatted_classified_readings() {
        let fixture = fixture(PollOptions::default());
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(fixture.poll_loop.status(), PollStatus::Polling);
        // Six sensor characteristics; the outlet is never read
        assert_eq!(fixture.source.requests(), 6);

        let co2 = fixture.store.get(MetricKind::Co2).unwrap();
        assert_eq!(co2.raw_value, 420.0);
        assert_eq!(co2.formatted, "420 ppm");
        assert_eq!(co2.band, SeverityBand::Normal);
        assert_eq!(co2.accessory_id, FAST);

        let pm = fixture.store.get(MetricKind::Pm2_5).unwrap();
        assert_eq!(pm.band, SeverityBand::Critical);

        let temp = fixture.store.get(MetricKind::Temperature).unwrap();
        assert_eq!(temp.formatted, "788 °F");
        assert_eq!(temp.band, SeverityBand::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_read_leaves_others_and_keeps_stale_value() {
        let fixture = fixture(PollOptions::default());
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;
        let first_humidity = fixture.store.get(MetricKind::Humidity).unwrap();

        fixture.source.fail(MetricKind::Humidity);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fixture.source.requests(), 12);
        assert_eq!(fixture.store.get(MetricKind::Humidity), Some(first_humidity.clone()));
        assert!(fixture.store.get(MetricKind::Co2).unwrap().timestamp >= first_humidity.timestamp);

        fixture.source.heal(MetricKind::Humidity);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fixture.source.requests(), 18);
        assert!(fixture.poll_loop.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_characteristic_never_stored() {
        let fixture = fixture(PollOptions::default());
        fixture.source.fail(MetricKind::Pm2_5);
        fixture.source.garbage.lock().unwrap().insert(MetricKind::Voc);
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;

        assert!(fixture.store.get(MetricKind::Pm2_5).is_none());
        assert!(fixture.store.get(MetricKind::Voc).is_none());
        assert!(fixture.store.get(MetricKind::Co2).is_some());
        assert!(fixture.store.get(MetricKind::No2).is_some());
        assert_eq!(fixture.store.readings().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_reads() {
        let mut fixture = fixture(PollOptions::default());
        fixture.source.hold(SLOW);
        select(&fixture, SLOW);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();

        // Wait until at least one read is in flight
        assert_eq!(fixture.requested.recv().await.as_deref(), Some(SLOW));
        fixture.poll_loop.stop();
        assert!(!fixture.poll_loop.is_running());

        fixture.source.release();
        settle().await;
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert!(fixture.store.readings().is_empty());
        assert_eq!(fixture.poll_loop.status(), PollStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_change_discards_previous_generation() {
        let mut fixture = fixture(PollOptions::default());
        fixture.source.hold(SLOW);
        select(&fixture, SLOW);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        assert_eq!(fixture.requested.recv().await.as_deref(), Some(SLOW));
        let first_generation = fixture.poll_loop.generation();

        fixture.selection.select_accessory(FAST).unwrap();
        assert!(fixture.poll_loop.generation() > first_generation);
        settle().await;
        assert_eq!(fixture.store.get(MetricKind::Co2).unwrap().raw_value, 420.0);

        // Late completions of the first accessory arrive now
        fixture.source.release();
        settle().await;

        for reading in fixture.store.readings() {
            assert_eq!(reading.accessory_id, FAST);
            assert_eq!(reading.raw_value, 420.0);
        }
        assert_eq!(fixture.store.readings().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_schedule() {
        let fixture = fixture(PollOptions::default());
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fixture.source.requests(), 6);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fixture.source.requests(), 12);
        assert_eq!(fixture.poll_loop.interval(), Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_times_out_without_blocking_loop() {
        let options = PollOptions {
            read_timeout: Duration::from_secs(2),
            ..PollOptions::default()
        };
        let fixture = fixture(options);
        fixture.source.hold(SLOW);
        select(&fixture, SLOW);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(fixture.store.readings().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fixture.source.requests(), 12);
        assert_eq!(fixture.poll_loop.status(), PollStatus::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_metrics_are_still_polled() {
        let fixture = fixture(PollOptions::default());
        for kind in MetricKind::ALL {
            fixture.store.set_visible(kind, false);
        }
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(fixture.source.requests(), 6);
        for kind in MetricKind::ALL {
            assert!(fixture.store.get(kind).is_some());
            assert!(!fixture.store.is_visible(kind));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_celsius_option_formats_temperature() {
        let options = PollOptions {
            temperature_unit: TemperatureUnit::Celsius,
            ..PollOptions::default()
        };
        let fixture = fixture(options);
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;

        assert_eq!(
            fixture.store.get(MetricKind::Temperature).unwrap().formatted,
            "420.0 °C"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_never_overwrites_newer_value() {
        let fixture = fixture(PollOptions::default());
        // First CO2 read takes longer than the interval but stays inside the timeout
        fixture
            .source
            .script(MetricKind::Co2, Duration::from_secs(7), 1000.0);
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(fixture.store.get(MetricKind::Co2).is_none());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(fixture.store.get(MetricKind::Co2).unwrap().raw_value, 420.0);

        // The first tick's read completes at t=7s
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fixture.store.get(MetricKind::Co2).unwrap().raw_value, 420.0);
        assert_eq!(fixture.poll_loop.status(), PollStatus::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_read_is_kept_when_nothing_newer_landed() {
        let fixture = fixture(PollOptions::default());
        fixture
            .source
            .script(MetricKind::Co2, Duration::from_secs(7), 1000.0);
        fixture
            .source
            .script(MetricKind::Co2, Duration::from_secs(4), 1200.0);
        select(&fixture, FAST);
        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();

        // Tick two's read of 1200 lands at t=9s, after tick one's 1000 at t=7s
        tokio::time::sleep(Duration::from_millis(7500)).await;
        assert_eq!(fixture.store.get(MetricKind::Co2).unwrap().raw_value, 1000.0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fixture.store.get(MetricKind::Co2).unwrap().raw_value, 1200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_changes_are_published_once() {
        let fixture = fixture(PollOptions::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let token = fixture
            .poll_loop
            .subscribe_status(move |status| sink.lock().unwrap().push(*status));

        fixture.poll_loop.start(Duration::from_secs(5)).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        fixture.poll_loop.stop();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PollStatus::Loading,
                PollStatus::NoAccessorySelected,
                PollStatus::Stopped
            ]
        );
        assert!(fixture.poll_loop.unsubscribe_status(token));
    }
}

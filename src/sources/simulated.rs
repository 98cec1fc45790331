//! Simulated home-automation source for demos and development
//!
//! Provides a couple of homes with air-quality accessories whose values follow
//! a configurable waveform, with optional random latency and failures.

use async_trait::async_trait;
use log::trace;
use openair_core::{
    HomesChangedCallback, SensorSource, SourceError, Subscribers, SubscriptionToken,
};
use openair_types::{
    Accessory, CharacteristicType, Home, MetricKind, Service, ServiceType,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Value generation mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaveMode {
    /// Every metric sits at its baseline
    Steady,
    /// Sine wave oscillation around the baseline
    #[default]
    SineWave,
    /// Triangle wave between baseline - amplitude and baseline + amplitude
    Triangle,
}

/// Configuration for the simulated source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedSourceConfig {
    pub mode: WaveMode,
    /// Wave period in seconds
    pub period: f64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    /// Probability (0.0 - 1.0) that a read fails
    pub failure_rate: f64,
}

impl SimulatedSourceConfig {
    /// Steady values, no latency, no failures
    pub fn instant() -> Self {
        Self {
            mode: WaveMode::Steady,
            period: 60.0,
            min_latency_ms: 0,
            max_latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

impl Default for SimulatedSourceConfig {
    fn default() -> Self {
        Self {
            mode: WaveMode::SineWave,
            period: 120.0,
            min_latency_ms: 50,
            max_latency_ms: 400,
            failure_rate: 0.0,
        }
    }
}

/// A home together with the accessories it contains
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedHome {
    pub home: Home,
    pub accessories: Vec<Accessory>,
}

/// Baseline and swing of each metric (temperature in Celsius)
fn baseline(kind: MetricKind) -> (f64, f64) {
    match kind {
        MetricKind::Co2 => (750.0, 450.0),
        MetricKind::Pm2_5 => (20.0, 15.0),
        MetricKind::Voc => (60.0, 45.0),
        MetricKind::No2 => (22.0, 15.0),
        MetricKind::Temperature => (21.5, 2.5),
        MetricKind::Humidity => (45.0, 10.0),
    }
}

fn stable_id(n: u128) -> String {
    Uuid::from_u128(0x6f70_656e_6169_7200_0000_0000_0000_0000 | n).to_string()
}

fn air_quality_service(characteristics: Vec<CharacteristicType>) -> Service {
    Service::new(ServiceType::AirQualitySensor, characteristics)
}

fn temperature_service() -> Service {
    Service::new(
        ServiceType::TemperatureSensor,
        vec![CharacteristicType::CurrentTemperature],
    )
}

fn humidity_service() -> Service {
    Service::new(
        ServiceType::HumiditySensor,
        vec![CharacteristicType::CurrentRelativeHumidity],
    )
}

/// The homes the simulator starts with
pub fn demo_homes() -> Vec<SimulatedHome> {
    vec![
        SimulatedHome {
            home: Home {
                id: stable_id(1),
                name: "My Home".to_string(),
            },
            accessories: vec![
                Accessory {
                    id: stable_id(0x101),
                    name: "Living Room Air Monitor".to_string(),
                    services: vec![
                        air_quality_service(vec![
                            CharacteristicType::Other("air_quality".to_string()),
                            CharacteristicType::CarbonDioxideLevel,
                            CharacteristicType::Pm2_5Density,
                            CharacteristicType::VolatileOrganicCompoundDensity,
                            CharacteristicType::NitrogenDioxideDensity,
                        ]),
                        temperature_service(),
                        humidity_service(),
                    ],
                },
                Accessory {
                    id: stable_id(0x102),
                    name: "Bedroom Sensor".to_string(),
                    services: vec![temperature_service(), humidity_service()],
                },
                Accessory {
                    id: stable_id(0x103),
                    name: "Desk Lamp".to_string(),
                    services: vec![Service::new(
                        ServiceType::Other("lightbulb".to_string()),
                        vec![CharacteristicType::Other("power_state".to_string())],
                    )],
                },
            ],
        },
        SimulatedHome {
            home: Home {
                id: stable_id(2),
                name: "Cabin".to_string(),
            },
            accessories: vec![Accessory {
                id: stable_id(0x201),
                name: "Cabin Air Monitor".to_string(),
                services: vec![
                    air_quality_service(vec![
                        CharacteristicType::CarbonDioxideLevel,
                        CharacteristicType::Pm2_5Density,
                    ]),
                    temperature_service(),
                ],
            }],
        },
    ]
}

/// In-process stand-in for a home-automation framework
pub struct SimulatedSource {
    config: SimulatedSourceConfig,
    homes: RwLock<Vec<SimulatedHome>>,
    start_time: Instant,
    homes_changed: Subscribers<Vec<Home>>,
}

impl SimulatedSource {
    pub fn new(config: SimulatedSourceConfig) -> Self {
        Self::with_homes(config, demo_homes())
    }

    pub fn with_homes(config: SimulatedSourceConfig, homes: Vec<SimulatedHome>) -> Self {
        Self {
            config,
            homes: RwLock::new(homes),
            start_time: Instant::now(),
            homes_changed: Subscribers::new(),
        }
    }

    pub fn config(&self) -> &SimulatedSourceConfig {
        &self.config
    }

    pub fn home_snapshot(&self) -> Vec<SimulatedHome> {
        self.homes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the known homes and tell subscribers
    pub fn set_homes(&self, homes: Vec<SimulatedHome>) {
        *self.homes.write().unwrap_or_else(PoisonError::into_inner) = homes;
        let listed = self.list_homes();
        self.homes_changed.notify(&listed);
    }

    fn find_any_accessory(&self, accessory_id: &str) -> Option<Accessory> {
        self.homes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|home| home.accessories.iter())
            .find(|accessory| accessory.id == accessory_id)
            .cloned()
    }

    /// Current simulated value for a metric; `phase` shifts the wave per accessory
    fn calculate_value(&self, kind: MetricKind, phase: f64) -> f64 {
        let (base, amplitude) = baseline(kind);
        let period = self.config.period.max(f64::EPSILON);
        let cycles = self.start_time.elapsed().as_secs_f64() / period + phase;

        let offset = match self.config.mode {
            WaveMode::Steady => 0.0,
            WaveMode::SineWave => (cycles * std::f64::consts::TAU).sin(),
            WaveMode::Triangle => {
                let t = cycles.fract() * 2.0; // 0.0 to 2.0
                let normalized = if t <= 1.0 { t } else { 2.0 - t }; // 0 to 1 to 0
                normalized * 2.0 - 1.0
            }
        };

        let value = base + offset * amplitude;
        match kind {
            MetricKind::Temperature => (value * 10.0).round() / 10.0,
            _ => value.round().max(0.0),
        }
    }

    fn latency(&self) -> Duration {
        let min = self.config.min_latency_ms;
        let max = self.config.max_latency_ms.max(min);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn should_fail(&self) -> bool {
        self.config.failure_rate > 0.0 && rand::thread_rng().gen::<f64>() < self.config.failure_rate
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(SimulatedSourceConfig::default())
    }
}

#[async_trait]
impl SensorSource for SimulatedSource {
    fn list_homes(&self) -> Vec<Home> {
        self.homes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|home| home.home.clone())
            .collect()
    }

    fn list_accessories(&self, home_id: &str) -> Vec<Accessory> {
        self.homes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|home| home.home.id == home_id)
            .map(|home| home.accessories.clone())
            .unwrap_or_default()
    }

    async fn read_characteristic(
        &self,
        accessory_id: &str,
        characteristic: &CharacteristicType,
    ) -> Result<Value, SourceError> {
        let accessory = self
            .find_any_accessory(accessory_id)
            .ok_or_else(|| SourceError::UnknownAccessory(accessory_id.to_string()))?;
        let exposed = accessory
            .services
            .iter()
            .any(|service| service.characteristics.contains(characteristic));
        if !exposed {
            return Err(SourceError::CharacteristicUnavailable {
                accessory_id: accessory_id.to_string(),
                characteristic: characteristic.clone(),
            });
        }

        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.should_fail() {
            return Err(SourceError::Communication(format!(
                "{} did not respond",
                accessory.name
            )));
        }

        let Some(kind) = characteristic.metric_kind() else {
            return Ok(json!(true));
        };
        // Spread accessories over the wave so they do not move in lockstep
        let phase = (accessory_id.bytes().map(u32::from).sum::<u32>() % 100) as f64 / 100.0;
        let value = self.calculate_value(kind, phase);
        trace!("Simulated {} = {} for {}", kind.id(), value, accessory.name);
        Ok(json!(value))
    }

    fn subscribe_homes_changed(&self, callback: HomesChangedCallback) -> SubscriptionToken {
        self.homes_changed
            .subscribe(move |homes: &Vec<Home>| callback(homes.as_slice()))
    }

    fn unsubscribe_homes_changed(&self, token: SubscriptionToken) -> bool {
        self.homes_changed.unsubscribe(token)
    }
}

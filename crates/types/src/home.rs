//! Homes, accessories and the characteristics they expose.
//!
//! These mirror what a home-automation framework reports. The monitor never
//! creates them itself; it only reads snapshots handed out by a sensor source.

use serde::{Deserialize, Serialize};

use crate::metric::MetricKind;

/// Kind of service an accessory groups its characteristics under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    AirQualitySensor,
    TemperatureSensor,
    HumiditySensor,
    /// Anything else (lights, outlets, ...), identified by the framework's name
    Other(String),
}

impl ServiceType {
    /// Whether characteristics of this service are polled at all
    pub fn is_sensor(&self) -> bool {
        matches!(
            self,
            ServiceType::AirQualitySensor
                | ServiceType::TemperatureSensor
                | ServiceType::HumiditySensor
        )
    }
}

/// A single readable attribute of an accessory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicType {
    CarbonDioxideLevel,
    NitrogenDioxideDensity,
    #[serde(rename = "pm2_5_density")]
    Pm2_5Density,
    VolatileOrganicCompoundDensity,
    CurrentTemperature,
    CurrentRelativeHumidity,
    Other(String),
}

impl CharacteristicType {
    /// Metric this characteristic feeds, if any
    pub fn metric_kind(&self) -> Option<MetricKind> {
        match self {
            CharacteristicType::CarbonDioxideLevel => Some(MetricKind::Co2),
            CharacteristicType::NitrogenDioxideDensity => Some(MetricKind::No2),
            CharacteristicType::Pm2_5Density => Some(MetricKind::Pm2_5),
            CharacteristicType::VolatileOrganicCompoundDensity => Some(MetricKind::Voc),
            CharacteristicType::CurrentTemperature => Some(MetricKind::Temperature),
            CharacteristicType::CurrentRelativeHumidity => Some(MetricKind::Humidity),
            CharacteristicType::Other(_) => None,
        }
    }
}

/// A service and the characteristics it exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_type: ServiceType,
    pub characteristics: Vec<CharacteristicType>,
}

impl Service {
    pub fn new(service_type: ServiceType, characteristics: Vec<CharacteristicType>) -> Self {
        Self {
            service_type,
            characteristics,
        }
    }
}

/// A physical device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

impl Accessory {
    /// Characteristics worth polling, paired with the metric each one feeds
    ///
    /// Only sensor services are considered, and each metric kind appears at
    /// most once (the first matching characteristic wins).
    pub fn polled_characteristics(&self) -> Vec<(CharacteristicType, MetricKind)> {
        let mut polled: Vec<(CharacteristicType, MetricKind)> = Vec::new();
        for service in self.services.iter().filter(|s| s.service_type.is_sensor()) {
            for characteristic in &service.characteristics {
                if let Some(kind) = characteristic.metric_kind() {
                    if !polled.iter().any(|(_, k)| *k == kind) {
                        polled.push((characteristic.clone(), kind));
                    }
                }
            }
        }
        polled
    }
}

/// A named collection of accessories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Home {
    pub id: String,
    pub name: String,
}

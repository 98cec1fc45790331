//! Sensor source trait

use async_trait::async_trait;
use openair_types::{Accessory, CharacteristicType, Home};
use serde_json::Value;
use std::sync::Arc;

use crate::error::SourceError;
use crate::subscribers::SubscriptionToken;

/// Callback fired when the set of known homes changes
pub type HomesChangedCallback = Arc<dyn Fn(&[Home]) + Send + Sync>;

/// Trait for the home-automation framework the monitor reads from
///
/// Discovery, pairing and connection management all live behind this trait.
/// The monitor only lists what is currently known and asks for single
/// characteristic values.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Homes currently known to the framework
    fn list_homes(&self) -> Vec<Home>;

    /// Accessories in a home (empty when the home is unknown)
    fn list_accessories(&self, home_id: &str) -> Vec<Accessory>;

    /// Read the current value of one characteristic
    ///
    /// The value is whatever the framework reports; callers decide whether
    /// it is numeric.
    async fn read_characteristic(
        &self,
        accessory_id: &str,
        characteristic: &CharacteristicType,
    ) -> Result<Value, SourceError>;

    /// Register for home-list updates
    fn subscribe_homes_changed(&self, callback: HomesChangedCallback) -> SubscriptionToken;

    /// Drop a home-list subscription
    fn unsubscribe_homes_changed(&self, token: SubscriptionToken) -> bool;

    /// Look up a single home by identifier
    fn find_home(&self, home_id: &str) -> Option<Home> {
        self.list_homes().into_iter().find(|home| home.id == home_id)
    }

    /// Look up an accessory inside a specific home
    fn find_accessory(&self, home_id: &str, accessory_id: &str) -> Option<Accessory> {
        self.list_accessories(home_id)
            .into_iter()
            .find(|accessory| accessory.id == accessory_id)
    }
}

/// Type-erased sensor source shared between the selection and the poll loop
pub type SharedSensorSource = Arc<dyn SensorSource>;

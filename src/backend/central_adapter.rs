//! Central adapter trait definition

use trait_variant::make;
use uuid::Uuid;

use crate::core::{
    error::AdapterResult,
    types::{CharacteristicHandle, PeripheralHandle, ServiceHandle},
};

/// Abstraction over the platform Bluetooth central role
///
/// Every method only requests an operation and returns once the request has
/// been issued. Outcomes are delivered later as
/// [`BleEvent`](crate::core::events::BleEvent)s on the channel the
/// implementation was created with.
#[make(Send)]
pub trait CentralAdapter: Sync + 'static {
    /// Start discovering peripherals, optionally limited to advertised services
    async fn scan(&self, service_filter: Option<Vec<Uuid>>) -> AdapterResult<()>;

    /// Connect to a discovered peripheral
    async fn connect(&self, peripheral: &PeripheralHandle) -> AdapterResult<()>;

    /// Drop an existing connection or abort a pending one
    async fn cancel_connection(&self, peripheral: &PeripheralHandle) -> AdapterResult<()>;

    /// Enumerate the services of a connected peripheral
    async fn discover_services(
        &self,
        peripheral: &PeripheralHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()>;

    /// Enumerate the characteristics of a service
    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()>;

    /// Enable or disable value notifications for a characteristic
    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> AdapterResult<()>;
}

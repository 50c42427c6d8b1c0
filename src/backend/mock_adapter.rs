//! Mock central adapter for testing

use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::CentralAdapter;
use crate::core::{
    error::{AdapterError, AdapterResult},
    events::AdapterCommand,
    types::{CharacteristicHandle, PeripheralHandle, ServiceHandle},
};

/// Internal state for the mock adapter
#[derive(Debug, Clone, Default)]
struct MockState {
    commands: Vec<AdapterCommand>,
    should_fail: bool,
}

/// Mock central adapter for testing
///
/// Records every request in order. Events are injected by the test through
/// the service's event channel.
#[derive(Debug, Clone, Default)]
pub struct MockCentralAdapter {
    inner: Arc<Mutex<MockState>>,
}

impl MockCentralAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure mock to reject every request
    pub async fn set_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail = should_fail;
    }

    /// Requests issued so far
    pub async fn commands(&self) -> Vec<AdapterCommand> {
        self.inner.lock().await.commands.clone()
    }

    async fn record(&self, command: AdapterCommand) -> AdapterResult<()> {
        let mut state = self.inner.lock().await;
        if state.should_fail {
            return Err(AdapterError::Bluetooth("Mock adapter failure".into()));
        }
        state.commands.push(command);
        Ok(())
    }
}

impl CentralAdapter for MockCentralAdapter {
    async fn scan(&self, service_filter: Option<Vec<Uuid>>) -> AdapterResult<()> {
        self.record(AdapterCommand::Scan { service_filter }).await
    }

    async fn connect(&self, peripheral: &PeripheralHandle) -> AdapterResult<()> {
        self.record(AdapterCommand::Connect(peripheral.clone()))
            .await
    }

    async fn cancel_connection(&self, peripheral: &PeripheralHandle) -> AdapterResult<()> {
        self.record(AdapterCommand::CancelConnection(peripheral.clone()))
            .await
    }

    async fn discover_services(
        &self,
        peripheral: &PeripheralHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()> {
        self.record(AdapterCommand::DiscoverServices {
            peripheral: peripheral.clone(),
            filter,
        })
        .await
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()> {
        self.record(AdapterCommand::DiscoverCharacteristics {
            service: service.clone(),
            filter,
        })
        .await
    }

    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> AdapterResult<()> {
        self.record(AdapterCommand::SetNotify {
            characteristic: characteristic.clone(),
            enabled,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PeripheralId;

    #[tokio::test]
    async fn test_mock_records_commands() {
        let adapter = MockCentralAdapter::new();
        let peripheral = PeripheralHandle::new(PeripheralId::new("AA"), Some("Sensor".into()));

        adapter.scan(None).await.unwrap();
        adapter.connect(&peripheral).await.unwrap();

        assert_eq!(
            adapter.commands().await,
            vec![
                AdapterCommand::Scan {
                    service_filter: None
                },
                AdapterCommand::Connect(peripheral),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let adapter = MockCentralAdapter::new();
        adapter.set_failure(true).await;

        assert!(adapter.scan(None).await.is_err());
        assert!(adapter.commands().await.is_empty());
    }
}

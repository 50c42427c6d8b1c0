//! BLE session state machine
//!
//! Tracks scan, connect, discovery and subscription progress for a single
//! peripheral. Every step is synchronous and returns the effects the caller
//! has to apply; the machine itself performs no I/O.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{
    error::{DiscoveryStage, SessionError, SessionResult},
    events::{AdapterCommand, BleEvent, Effect},
    types::{
        CharacteristicHandle, Clock, PeripheralHandle, PeripheralId, PowerState, ReceivedValue,
        ServiceHandle, SessionState, SessionStatus, SystemClock,
    },
};

/// What the session looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Advertised name to connect to (exact, case-sensitive)
    pub target_name: String,
    /// Characteristic to subscribe to
    pub characteristic_uuid: Uuid,
}

/// BLE session state machine
pub struct BleSession {
    config: SessionConfig,
    clock: Box<dyn Clock>,
    state: SessionState,
    power: PowerState,
    peripheral: Option<PeripheralHandle>,
    characteristic: Option<CharacteristicHandle>,
}

impl BleSession {
    /// Create a session stamping values with the system clock
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: SessionConfig, clock: impl Clock) -> Self {
        Self {
            config,
            clock: Box::new(clock),
            state: SessionState::Idle,
            power: PowerState::Unknown,
            peripheral: None,
            characteristic: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    pub fn characteristic(&self) -> Option<&CharacteristicHandle> {
        self.characteristic.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot for status queries
    pub fn status(&self, log_length: usize) -> SessionStatus {
        SessionStatus {
            state: self.state,
            power: self.power,
            peripheral_id: self.peripheral.as_ref().map(|p| p.id.to_string()),
            peripheral_name: self.peripheral.as_ref().and_then(|p| p.name.clone()),
            characteristic: self.characteristic.as_ref().map(|c| c.uuid),
            log_length,
        }
    }

    /// Start scanning for the target peripheral
    pub fn start_scan(&mut self) -> SessionResult<Vec<Effect>> {
        if self.power != PowerState::PoweredOn {
            return Err(SessionError::AdapterUnavailable(self.power));
        }
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                operation: "start scan",
                state: self.state,
            });
        }

        self.transition(SessionState::Scanning);
        Ok(vec![
            Effect::Command(AdapterCommand::Scan {
                service_filter: None,
            }),
            Effect::status("Scanning..."),
        ])
    }

    /// Ask the adapter to drop the active connection
    ///
    /// The session stays in its current state until the disconnect event
    /// arrives.
    pub fn request_disconnect(&mut self) -> SessionResult<Vec<Effect>> {
        let peripheral = self.peripheral.clone().ok_or(SessionError::NotConnected)?;
        Ok(vec![Effect::Command(AdapterCommand::CancelConnection(
            peripheral,
        ))])
    }

    /// Handle one adapter event
    pub fn handle(&mut self, event: BleEvent) -> SessionResult<Vec<Effect>> {
        match event {
            BleEvent::PowerStateChanged(power) => Ok(self.on_power_state(power)),
            BleEvent::ScanStopped { error } => Ok(self.on_scan_stopped(error)),
            BleEvent::PeripheralDiscovered { peripheral, rssi } => {
                Ok(self.on_discovered(peripheral, rssi))
            }
            BleEvent::Connected { peripheral, error } => Ok(self.on_connected(peripheral, error)),
            BleEvent::Disconnected { peripheral, error } => {
                Ok(self.on_disconnected(peripheral, error))
            }
            BleEvent::ServicesDiscovered {
                peripheral,
                services,
                error,
            } => self.on_services(peripheral, services, error),
            BleEvent::CharacteristicsDiscovered {
                service,
                characteristics,
                error,
            } => self.on_characteristics(service, characteristics, error),
            BleEvent::ValueUpdated {
                characteristic,
                value,
                error,
            } => Ok(self.on_value(characteristic, value, error)),
        }
    }

    /// Roll back after the adapter rejected `command`
    ///
    /// A rejected scan or connect would otherwise leave the session waiting
    /// for an event that never comes. Rejected discovery and notify requests
    /// keep the connection so it can still be dropped with a disconnect.
    /// Returns whether the session was rolled back.
    pub fn abort(&mut self, command: &AdapterCommand) -> bool {
        match command {
            AdapterCommand::Scan { .. } if self.state == SessionState::Scanning => {
                warn!("Scan request rejected, returning to idle");
                self.reset();
                true
            }
            AdapterCommand::Connect(peripheral) | AdapterCommand::CancelConnection(peripheral)
                if self.is_active(&peripheral.id) =>
            {
                warn!(
                    id = %peripheral.id,
                    state = %self.state,
                    "Connection request rejected, returning to idle"
                );
                self.reset();
                true
            }
            _ => false,
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }

    fn reset(&mut self) {
        self.peripheral = None;
        self.characteristic = None;
        self.transition(SessionState::Idle);
    }

    fn is_active(&self, id: &PeripheralId) -> bool {
        self.peripheral.as_ref().is_some_and(|p| &p.id == id)
    }

    fn on_power_state(&mut self, power: PowerState) -> Vec<Effect> {
        info!(%power, "Adapter power state changed");
        self.power = power;

        let mut effects = Vec::new();
        if power != PowerState::PoweredOn && self.state != SessionState::Idle {
            warn!(state = %self.state, "Adapter lost power, resetting session");
            // Release the adapter's connection tasks so nothing stale reports back
            if let Some(peripheral) = self.peripheral.clone() {
                effects.push(Effect::Command(AdapterCommand::CancelConnection(peripheral)));
            }
            self.reset();
        }

        effects.push(Effect::status(power.status_line()));
        effects
    }

    fn on_scan_stopped(&mut self, error: Option<String>) -> Vec<Effect> {
        if self.state != SessionState::Scanning {
            debug!(state = %self.state, "Ignoring end of discovery");
            return vec![];
        }

        match &error {
            Some(error) => warn!(%error, "Discovery stopped"),
            None => info!("Discovery stopped"),
        }
        self.transition(SessionState::Idle);
        vec![Effect::status("Scanning stopped")]
    }

    fn on_discovered(&mut self, peripheral: PeripheralHandle, rssi: Option<i16>) -> Vec<Effect> {
        if self.state != SessionState::Scanning {
            return vec![];
        }
        if peripheral.name.as_deref() != Some(self.config.target_name.as_str()) {
            return vec![];
        }

        info!(id = %peripheral.id, ?rssi, "Discovered target peripheral");
        let status = format!("Discovered peripheral: {}", peripheral.display_name());
        self.peripheral = Some(peripheral.clone());
        self.transition(SessionState::Connecting);

        vec![
            Effect::Command(AdapterCommand::Connect(peripheral)),
            Effect::Status(status),
        ]
    }

    fn on_connected(&mut self, peripheral: PeripheralHandle, error: Option<String>) -> Vec<Effect> {
        if self.state != SessionState::Connecting || !self.is_active(&peripheral.id) {
            debug!(id = %peripheral.id, state = %self.state, "Ignoring unexpected connect event");
            return vec![];
        }

        // The stored handle keeps the advertised name if the event lacks one
        let stored = self.peripheral.clone().unwrap_or(peripheral);

        if let Some(error) = error {
            warn!(id = %stored.id, %error, "Connection failed");
            self.reset();
            return vec![Effect::Status(format!(
                "Failed to connect to peripheral: {}",
                stored.display_name()
            ))];
        }

        self.transition(SessionState::DiscoveringServices);
        vec![
            Effect::Command(AdapterCommand::DiscoverServices {
                peripheral: stored.clone(),
                filter: None,
            }),
            Effect::Status(format!(
                "Connected to peripheral: {}",
                stored.display_name()
            )),
        ]
    }

    fn on_disconnected(
        &mut self,
        peripheral: PeripheralHandle,
        error: Option<String>,
    ) -> Vec<Effect> {
        if !self.is_active(&peripheral.id) {
            debug!(id = %peripheral.id, "Ignoring disconnect of inactive peripheral");
            return vec![];
        }

        if let Some(error) = &error {
            debug!(id = %peripheral.id, %error, "Disconnected with error");
        }

        let stored = self.peripheral.take().unwrap_or(peripheral);
        self.reset();

        vec![Effect::Status(format!(
            "Disconnected from peripheral: {}",
            stored.display_name()
        ))]
    }

    fn on_services(
        &mut self,
        peripheral: PeripheralId,
        services: Vec<ServiceHandle>,
        error: Option<String>,
    ) -> SessionResult<Vec<Effect>> {
        if self.state != SessionState::DiscoveringServices || !self.is_active(&peripheral) {
            debug!(id = %peripheral, state = %self.state, "Ignoring unexpected services");
            return Ok(vec![]);
        }

        if let Some(reason) = error {
            return Err(SessionError::Discovery {
                stage: DiscoveryStage::Services,
                reason,
            });
        }

        debug!(count = services.len(), "Services discovered");
        self.transition(SessionState::DiscoveringCharacteristics);

        Ok(services
            .into_iter()
            .map(|service| {
                Effect::Command(AdapterCommand::DiscoverCharacteristics {
                    service,
                    filter: None,
                })
            })
            .collect())
    }

    fn on_characteristics(
        &mut self,
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
        error: Option<String>,
    ) -> SessionResult<Vec<Effect>> {
        let accepting = matches!(
            self.state,
            SessionState::DiscoveringCharacteristics | SessionState::Subscribed
        );
        if !accepting || !self.is_active(&service.peripheral) {
            debug!(service = %service.uuid, state = %self.state, "Ignoring unexpected characteristics");
            return Ok(vec![]);
        }

        if let Some(reason) = error {
            return Err(SessionError::Discovery {
                stage: DiscoveryStage::Characteristics,
                reason,
            });
        }

        if self.characteristic.is_some() {
            debug!(service = %service.uuid, "Already subscribed, ignoring characteristics");
            return Ok(vec![]);
        }

        let target = self.config.characteristic_uuid;
        let Some(characteristic) = characteristics.into_iter().find(|c| c.uuid == target) else {
            return Ok(vec![]);
        };

        info!(uuid = %characteristic.uuid, "Subscribing to characteristic");
        self.characteristic = Some(characteristic.clone());
        self.transition(SessionState::Subscribed);

        Ok(vec![
            Effect::Command(AdapterCommand::SetNotify {
                characteristic,
                enabled: true,
            }),
            Effect::status("Subscribed to characteristic"),
        ])
    }

    fn on_value(
        &mut self,
        characteristic: CharacteristicHandle,
        value: Option<Vec<u8>>,
        error: Option<String>,
    ) -> Vec<Effect> {
        if self.state != SessionState::Subscribed
            || self.characteristic.as_ref() != Some(&characteristic)
        {
            debug!(uuid = %characteristic.uuid, "Ignoring value from inactive characteristic");
            return vec![];
        }

        if let Some(error) = error {
            warn!(%error, "Value update failed");
            return vec![];
        }

        let Some(payload) = value else {
            return vec![];
        };

        debug!(payload = %hex::encode(&payload), "Value received");
        vec![Effect::Received(ReceivedValue::decode(
            &payload,
            self.clock.now(),
        ))]
    }
}

impl std::fmt::Debug for BleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("power", &self.power)
            .field("peripheral", &self.peripheral)
            .field("characteristic", &self.characteristic)
            .finish()
    }
}

//! BlueZ central adapter using bluer

use bluer::{
    Adapter, AdapterEvent, AdapterProperty, Address, Device, DeviceEvent, DeviceProperty,
    DiscoveryFilter, DiscoveryTransport,
};
use futures::{StreamExt, pin_mut};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::CentralAdapter,
    core::{
        error::{AdapterError, AdapterResult},
        events::BleEvent,
        types::{
            CharacteristicHandle, PeripheralHandle, PeripheralId, PowerState, ServiceHandle,
        },
    },
};

/// Background tasks owned by the adapter
#[derive(Debug, Default)]
struct Tasks {
    power: Option<JoinHandle<()>>,
    scan: Option<JoinHandle<()>>,
    connections: HashMap<PeripheralId, JoinHandle<()>>,
    notifications: HashMap<CharacteristicHandle, JoinHandle<()>>,
}

impl Tasks {
    fn drop_notifications_of(&mut self, peripheral: &PeripheralId) {
        self.notifications.retain(|characteristic, task| {
            if &characteristic.peripheral == peripheral {
                task.abort();
                false
            } else {
                true
            }
        });
    }
}

/// Devices reported during one discovery run
///
/// A device is reported when first seen and once more when its name shows
/// up, which is all the session needs for name matching.
#[derive(Debug, Default)]
struct SeenDevices {
    named: HashMap<Address, bool>,
}

impl SeenDevices {
    fn should_report(&mut self, address: Address, has_name: bool) -> bool {
        match self.named.insert(address, has_name) {
            None => true,
            Some(had_name) => {
                if had_name {
                    self.named.insert(address, true);
                }
                !had_name && has_name
            }
        }
    }
}

/// Central adapter backed by the BlueZ daemon
///
/// Outcomes of every request are reported as [`BleEvent`]s on the channel
/// given to [`BluerCentral::new`].
pub struct BluerCentral {
    adapter: Adapter,
    events: mpsc::UnboundedSender<BleEvent>,
    tasks: Arc<Mutex<Tasks>>,
}

impl BluerCentral {
    /// Open the named adapter, or the default one
    pub async fn new(
        adapter_name: Option<&str>,
        events: mpsc::UnboundedSender<BleEvent>,
    ) -> Result<Self, bluer::Error> {
        let session = bluer::Session::new().await?;
        let adapter = match adapter_name {
            Some(name) => session.adapter(name)?,
            None => session.default_adapter().await?,
        };

        info!("Using BLE adapter: {}", adapter.name());

        Ok(Self {
            adapter,
            events,
            tasks: Arc::new(Mutex::new(Tasks::default())),
        })
    }

    /// Report the current power state and follow its changes
    pub async fn start(&self) -> Result<(), bluer::Error> {
        let adapter_events = self.adapter.events().await?;
        let powered = self.adapter.is_powered().await?;
        emit(&self.events, BleEvent::PowerStateChanged(powered.into()));

        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            pin_mut!(adapter_events);
            while let Some(event) = adapter_events.next().await {
                match event {
                    AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) => {
                        emit(&tx, BleEvent::PowerStateChanged(PowerState::from(powered)));
                    }
                    AdapterEvent::DeviceRemoved(addr) => {
                        debug!("Device removed: {}", addr);
                    }
                    _ => {}
                }
            }
            warn!("BLE adapter event stream ended");
        });

        if let Some(previous) = self.tasks.lock().await.power.replace(task) {
            previous.abort();
        }

        info!("BLE adapter monitoring started");
        Ok(())
    }

    /// Abort every background task and drop open connections
    pub async fn shutdown(&self) {
        info!("Stopping BLE adapter");

        let mut tasks = self.tasks.lock().await;
        for task in tasks
            .power
            .take()
            .into_iter()
            .chain(tasks.scan.take())
            .chain(tasks.notifications.drain().map(|(_, task)| task))
        {
            task.abort();
        }

        let connections: Vec<_> = tasks.connections.drain().collect();
        drop(tasks);

        for (peripheral, task) in connections {
            task.abort();
            if let Ok(device) = self.device(&peripheral) {
                if let Err(e) = device.disconnect().await {
                    debug!("Disconnect of {} on shutdown failed: {}", peripheral, e);
                }
            }
        }
    }

    fn device(&self, peripheral: &PeripheralId) -> AdapterResult<Device> {
        let address: Address = peripheral
            .as_str()
            .parse()
            .map_err(|_| AdapterError::InvalidAddress(peripheral.to_string()))?;
        Ok(self.adapter.device(address)?)
    }

    async fn describe(
        adapter: &Adapter,
        address: Address,
    ) -> bluer::Result<(PeripheralHandle, Option<i16>)> {
        let device = adapter.device(address)?;
        let name = device.name().await?;
        let rssi = device.rssi().await?;
        Ok((
            PeripheralHandle::new(PeripheralId::new(address.to_string()), name),
            rssi,
        ))
    }

    async fn wait_services_resolved(device: &Device) -> bluer::Result<()> {
        if device.is_services_resolved().await? {
            return Ok(());
        }

        let events = device.events().await?;
        pin_mut!(events);

        // Resolution may have finished before the subscription
        if device.is_services_resolved().await? {
            return Ok(());
        }

        while let Some(event) = events.next().await {
            if let DeviceEvent::PropertyChanged(DeviceProperty::ServicesResolved(true)) = event {
                return Ok(());
            }
        }

        Err(bluer::Error {
            kind: bluer::ErrorKind::NotFound,
            message: "device removed before services were resolved".to_string(),
        })
    }

    async fn list_services(
        device: &Device,
        peripheral: &PeripheralId,
        filter: Option<&[Uuid]>,
    ) -> bluer::Result<Vec<ServiceHandle>> {
        Self::wait_services_resolved(device).await?;

        let mut services = Vec::new();
        for service in device.services().await? {
            let uuid = service.uuid().await?;
            if filter.is_some_and(|f| !f.contains(&uuid)) {
                continue;
            }
            services.push(ServiceHandle {
                peripheral: peripheral.clone(),
                id: service.id(),
                uuid,
            });
        }
        Ok(services)
    }

    async fn list_characteristics(
        device: &Device,
        service: &ServiceHandle,
        filter: Option<&[Uuid]>,
    ) -> bluer::Result<Vec<CharacteristicHandle>> {
        let remote = device.service(service.id).await?;

        let mut characteristics = Vec::new();
        for characteristic in remote.characteristics().await? {
            let uuid = characteristic.uuid().await?;
            if filter.is_some_and(|f| !f.contains(&uuid)) {
                continue;
            }
            characteristics.push(CharacteristicHandle {
                peripheral: service.peripheral.clone(),
                service_id: service.id,
                id: characteristic.id(),
                uuid,
            });
        }
        Ok(characteristics)
    }

    async fn watch_connection(
        device: Device,
        peripheral: PeripheralHandle,
        tx: mpsc::UnboundedSender<BleEvent>,
        tasks: Arc<Mutex<Tasks>>,
    ) {
        if let Err(e) = device.connect().await {
            emit(
                &tx,
                BleEvent::Connected {
                    peripheral,
                    error: Some(e.to_string()),
                },
            );
            return;
        }

        let events = match device.events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Cannot watch {} for disconnects: {}", peripheral.id, e);
                emit(
                    &tx,
                    BleEvent::Connected {
                        peripheral,
                        error: None,
                    },
                );
                return;
            }
        };

        emit(
            &tx,
            BleEvent::Connected {
                peripheral: peripheral.clone(),
                error: None,
            },
        );

        pin_mut!(events);
        let mut error = Some("device removed".to_string());
        while let Some(event) = events.next().await {
            if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(false)) = event {
                error = None;
                break;
            }
        }

        debug!("Peripheral {} disconnected", peripheral.id);
        {
            let mut tasks = tasks.lock().await;
            tasks.drop_notifications_of(&peripheral.id);
            tasks.connections.remove(&peripheral.id);
        }
        emit(&tx, BleEvent::Disconnected { peripheral, error });
    }

    async fn stream_notifications(
        device: Device,
        characteristic: CharacteristicHandle,
        tx: mpsc::UnboundedSender<BleEvent>,
    ) {
        let notifications = async {
            let remote = device
                .service(characteristic.service_id)
                .await?
                .characteristic(characteristic.id)
                .await?;
            remote.notify().await
        }
        .await;

        let notifications = match notifications {
            Ok(stream) => stream,
            Err(e) => {
                emit(
                    &tx,
                    BleEvent::ValueUpdated {
                        characteristic,
                        value: None,
                        error: Some(e.to_string()),
                    },
                );
                return;
            }
        };

        info!("Notifications enabled for {}", characteristic.uuid);
        pin_mut!(notifications);
        while let Some(value) = notifications.next().await {
            emit(
                &tx,
                BleEvent::ValueUpdated {
                    characteristic: characteristic.clone(),
                    value: Some(value),
                    error: None,
                },
            );
        }
        debug!("Notification stream for {} ended", characteristic.uuid);
    }
}

impl CentralAdapter for BluerCentral {
    async fn scan(&self, service_filter: Option<Vec<Uuid>>) -> AdapterResult<()> {
        let mut filter = DiscoveryFilter::default();
        filter.transport = DiscoveryTransport::Le;
        if let Some(uuids) = service_filter {
            filter.uuids = uuids.into_iter().collect();
        }
        self.adapter.set_discovery_filter(filter).await?;

        // Device property changes are re-reported, so a name resolved from a
        // later scan response still reaches the session
        let discovery = self.adapter.discover_devices_with_changes().await?;
        let adapter = self.adapter.clone();
        let tx = self.events.clone();

        let task = tokio::spawn(async move {
            pin_mut!(discovery);
            let mut seen = SeenDevices::default();
            while let Some(event) = discovery.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                match Self::describe(&adapter, address).await {
                    Ok((peripheral, rssi)) => {
                        if seen.should_report(address, peripheral.name.is_some()) {
                            emit(&tx, BleEvent::PeripheralDiscovered { peripheral, rssi });
                        }
                    }
                    Err(e) => debug!("Cannot read properties of {}: {}", address, e),
                }
            }

            // Losing power also ends discovery; the power event covers that case
            let error = match adapter.is_powered().await {
                Ok(false) => {
                    debug!("Discovery stream ended with the adapter powered off");
                    return;
                }
                Ok(true) => None,
                Err(e) => Some(e.to_string()),
            };
            warn!("Discovery stream ended");
            emit(&tx, BleEvent::ScanStopped { error });
        });

        if let Some(previous) = self.tasks.lock().await.scan.replace(task) {
            previous.abort();
        }

        info!("Scanning for peripherals");
        Ok(())
    }

    async fn connect(&self, peripheral: &PeripheralHandle) -> AdapterResult<()> {
        let device = self.device(&peripheral.id)?;
        info!("Connecting to {}", peripheral.id);

        let task = tokio::spawn(Self::watch_connection(
            device,
            peripheral.clone(),
            self.events.clone(),
            self.tasks.clone(),
        ));

        if let Some(previous) = self
            .tasks
            .lock()
            .await
            .connections
            .insert(peripheral.id.clone(), task)
        {
            previous.abort();
        }
        Ok(())
    }

    async fn cancel_connection(&self, peripheral: &PeripheralHandle) -> AdapterResult<()> {
        let device = self.device(&peripheral.id)?;

        let watcher = {
            let mut tasks = self.tasks.lock().await;
            tasks.drop_notifications_of(&peripheral.id);
            tasks.connections.remove(&peripheral.id)
        };
        let Some(watcher) = watcher else {
            return Err(AdapterError::UnknownPeripheral(peripheral.id.to_string()));
        };
        watcher.abort();

        info!("Disconnecting from {}", peripheral.id);
        let error = device.disconnect().await.err().map(|e| e.to_string());
        emit(
            &self.events,
            BleEvent::Disconnected {
                peripheral: peripheral.clone(),
                error,
            },
        );
        Ok(())
    }

    async fn discover_services(
        &self,
        peripheral: &PeripheralHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()> {
        let device = self.device(&peripheral.id)?;
        let id = peripheral.id.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let event = match Self::list_services(&device, &id, filter.as_deref()).await {
                Ok(services) => BleEvent::ServicesDiscovered {
                    peripheral: id,
                    services,
                    error: None,
                },
                Err(e) => BleEvent::ServicesDiscovered {
                    peripheral: id,
                    services: Vec::new(),
                    error: Some(e.to_string()),
                },
            };
            emit(&tx, event);
        });
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Vec<Uuid>>,
    ) -> AdapterResult<()> {
        let device = self.device(&service.peripheral)?;
        let service = service.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = Self::list_characteristics(&device, &service, filter.as_deref()).await;
            let (characteristics, error) = match result {
                Ok(characteristics) => (characteristics, None),
                Err(e) => (Vec::new(), Some(e.to_string())),
            };
            emit(
                &tx,
                BleEvent::CharacteristicsDiscovered {
                    service,
                    characteristics,
                    error,
                },
            );
        });
        Ok(())
    }

    async fn set_notify(
        &self,
        characteristic: &CharacteristicHandle,
        enabled: bool,
    ) -> AdapterResult<()> {
        let mut tasks = self.tasks.lock().await;

        if !enabled {
            if let Some(task) = tasks.notifications.remove(characteristic) {
                debug!("Notifications disabled for {}", characteristic.uuid);
                task.abort();
            }
            return Ok(());
        }

        let device = self.device(&characteristic.peripheral)?;
        let task = tokio::spawn(Self::stream_notifications(
            device,
            characteristic.clone(),
            self.events.clone(),
        ));
        if let Some(previous) = tasks.notifications.insert(characteristic.clone(), task) {
            previous.abort();
        }
        Ok(())
    }
}

fn emit(tx: &mpsc::UnboundedSender<BleEvent>, event: BleEvent) {
    if tx.send(event).is_err() {
        debug!("Bridge service gone, dropping BLE event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seen_devices_reports_first_sighting_and_name() {
        let mut seen = SeenDevices::default();
        let address = Address::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);

        assert!(seen.should_report(address, false));
        assert!(!seen.should_report(address, false));
        assert!(seen.should_report(address, true));
        assert!(!seen.should_report(address, true));
        // A name that disappears again is not reported twice
        assert!(!seen.should_report(address, false));
        assert!(!seen.should_report(address, true));
    }

    #[test]
    fn test_seen_devices_named_on_first_sighting() {
        let mut seen = SeenDevices::default();
        let first = Address::new([0, 0, 0, 0, 0, 1]);
        let second = Address::new([0, 0, 0, 0, 0, 2]);

        assert!(seen.should_report(first, true));
        assert!(!seen.should_report(first, true));
        assert!(seen.should_report(second, true));
    }
}

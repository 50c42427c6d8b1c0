//! Bridge service actor
//!
//! Owns the session state machine and the forwarder. Adapter events and
//! control requests are consumed one at a time, so the session never needs
//! locking.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{
    backend::CentralAdapter,
    core::{
        error::{AdapterResult, ServiceError, ServiceResult, SessionError},
        events::{AdapterCommand, BleEvent, Effect},
        forwarder::NotificationForwarder,
        session::BleSession,
        types::{PowerState, SessionState, SessionStatus},
    },
    display::DisplayUpdate,
    sink::ValueSink,
};

/// Request sent to the actor through a [`BridgeHandle`]
#[derive(Debug)]
enum ControlRequest {
    StartScan(oneshot::Sender<ServiceResult<SessionState>>),
    Disconnect(oneshot::Sender<ServiceResult<()>>),
    Status(oneshot::Sender<SessionStatus>),
    Log(oneshot::Sender<Vec<String>>),
}

/// Cloneable handle for talking to a running [`BridgeService`]
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    tx: mpsc::UnboundedSender<ControlRequest>,
    display: tokio::sync::broadcast::Sender<DisplayUpdate>,
}

impl BridgeHandle {
    /// Start scanning for the target peripheral
    pub async fn start_scan(&self) -> ServiceResult<SessionState> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlRequest::StartScan(reply))?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Drop the active connection
    pub async fn disconnect(&self) -> ServiceResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlRequest::Disconnect(reply))?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Current session snapshot
    pub async fn status(&self) -> ServiceResult<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlRequest::Status(reply))?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Copy of the display log
    pub async fn log(&self) -> ServiceResult<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlRequest::Log(reply))?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Subscribe to display updates published from now on
    pub fn subscribe_display(&self) -> tokio::sync::broadcast::Receiver<DisplayUpdate> {
        self.display.subscribe()
    }

    fn send(&self, request: ControlRequest) -> ServiceResult<()> {
        self.tx.send(request).map_err(|_| ServiceError::Stopped)
    }
}

/// The single actor driving the BLE session
pub struct BridgeService<A: CentralAdapter, S: ValueSink> {
    adapter: Arc<A>,
    session: BleSession,
    forwarder: NotificationForwarder<S>,
    events: mpsc::UnboundedReceiver<BleEvent>,
    control: mpsc::UnboundedReceiver<ControlRequest>,
    auto_scan: bool,
}

impl<A: CentralAdapter, S: ValueSink> BridgeService<A, S> {
    /// Create the actor and the handle used to control it
    ///
    /// `events` must be the receiving end of the channel the adapter reports to.
    pub fn new(
        adapter: Arc<A>,
        session: BleSession,
        forwarder: NotificationForwarder<S>,
        events: mpsc::UnboundedReceiver<BleEvent>,
        auto_scan: bool,
    ) -> (Self, BridgeHandle) {
        let (tx, control) = mpsc::unbounded_channel();
        let handle = BridgeHandle {
            tx,
            display: forwarder.log().updates(),
        };

        let service = Self {
            adapter,
            session,
            forwarder,
            events,
            control,
            auto_scan,
        };

        (service, handle)
    }

    /// Process events and requests until every sender is gone
    pub async fn run(mut self) {
        info!("Bridge service started");

        loop {
            tokio::select! {
                // Adapter events queued before a request are seen by it
                biased;
                Some(event) = self.events.recv() => self.handle_event(event).await,
                Some(request) = self.control.recv() => self.handle_control(request).await,
                else => break,
            }
        }

        info!("Bridge service stopped");
    }

    pub fn session(&self) -> &BleSession {
        &self.session
    }

    pub fn forwarder(&self) -> &NotificationForwarder<S> {
        &self.forwarder
    }

    /// Run one adapter event through the session and apply its effects
    pub async fn handle_event(&mut self, event: BleEvent) {
        let powered_on = matches!(event, BleEvent::PowerStateChanged(PowerState::PoweredOn));

        match self.session.handle(event) {
            // Rejected requests are already reported by `apply`
            Ok(effects) => {
                let _ = self.apply(effects).await;
            }
            Err(e) => warn!("{}", e),
        }

        if powered_on && self.auto_scan && self.session.state() == SessionState::Idle {
            debug!("Adapter powered on, starting scan");
            if let Err(e) = self.start_scan().await {
                warn!("Automatic scan failed: {}", e);
            }
        }
    }

    /// Start scanning for the target peripheral
    pub async fn start_scan(&mut self) -> ServiceResult<SessionState> {
        match self.session.start_scan() {
            Ok(effects) => {
                self.apply(effects).await?;
                Ok(self.session.state())
            }
            Err(e) => {
                if matches!(e, SessionError::AdapterUnavailable(_)) {
                    self.forwarder.post_status(e.to_string());
                }
                Err(e.into())
            }
        }
    }

    /// Ask the adapter to drop the active connection
    pub async fn disconnect(&mut self) -> ServiceResult<()> {
        let effects = self.session.request_disconnect()?;
        self.apply(effects).await?;
        Ok(())
    }

    async fn handle_control(&mut self, request: ControlRequest) {
        // A dropped reply receiver only means the caller went away
        match request {
            ControlRequest::StartScan(reply) => {
                let _ = reply.send(self.start_scan().await);
            }
            ControlRequest::Disconnect(reply) => {
                let _ = reply.send(self.disconnect().await);
            }
            ControlRequest::Status(reply) => {
                let _ = reply.send(self.session.status(self.forwarder.log().len()));
            }
            ControlRequest::Log(reply) => {
                let _ = reply.send(self.forwarder.log().lines().to_vec());
            }
        }
    }

    /// Apply effects in order
    ///
    /// When a rejected request rolls the session back, the rest of the step
    /// is dropped and the adapter error is returned.
    async fn apply(&mut self, effects: Vec<Effect>) -> AdapterResult<()> {
        for effect in effects {
            match effect {
                Effect::Command(command) => {
                    if let Err(e) = self.execute(&command).await {
                        error!(?command, "Adapter request failed: {}", e);
                        self.forwarder.post_status(format!("Request failed: {e}"));
                        if self.session.abort(&command) {
                            return Err(e);
                        }
                    }
                }
                Effect::Status(line) => self.forwarder.post_status(line),
                Effect::Received(value) => self.forwarder.forward(value),
            }
        }
        Ok(())
    }

    async fn execute(&self, command: &AdapterCommand) -> AdapterResult<()> {
        match command {
            AdapterCommand::Scan { service_filter } => {
                self.adapter.scan(service_filter.clone()).await
            }
            AdapterCommand::Connect(peripheral) => self.adapter.connect(peripheral).await,
            AdapterCommand::CancelConnection(peripheral) => {
                self.adapter.cancel_connection(peripheral).await
            }
            AdapterCommand::DiscoverServices { peripheral, filter } => {
                self.adapter
                    .discover_services(peripheral, filter.clone())
                    .await
            }
            AdapterCommand::DiscoverCharacteristics { service, filter } => {
                self.adapter
                    .discover_characteristics(service, filter.clone())
                    .await
            }
            AdapterCommand::SetNotify {
                characteristic,
                enabled,
            } => self.adapter.set_notify(characteristic, *enabled).await,
        }
    }
}

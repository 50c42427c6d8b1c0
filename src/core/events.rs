//! Events delivered by the Bluetooth adapter and the effects the session produces

use uuid::Uuid;

use super::types::{
    CharacteristicHandle, PeripheralHandle, PeripheralId, PowerState, ReceivedValue, ServiceHandle,
};

/// Event delivered by the central adapter
///
/// Each platform callback becomes one of these. Completion events carry the
/// platform error text when the operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BleEvent {
    PowerStateChanged(PowerState),

    /// Discovery ended without being asked to, carrying the reason if known
    ScanStopped {
        error: Option<String>,
    },

    PeripheralDiscovered {
        peripheral: PeripheralHandle,
        rssi: Option<i16>,
    },

    Connected {
        peripheral: PeripheralHandle,
        error: Option<String>,
    },

    Disconnected {
        peripheral: PeripheralHandle,
        error: Option<String>,
    },

    ServicesDiscovered {
        peripheral: PeripheralId,
        services: Vec<ServiceHandle>,
        error: Option<String>,
    },

    CharacteristicsDiscovered {
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
        error: Option<String>,
    },

    ValueUpdated {
        characteristic: CharacteristicHandle,
        value: Option<Vec<u8>>,
        error: Option<String>,
    },
}

/// Request for the central adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCommand {
    Scan {
        service_filter: Option<Vec<Uuid>>,
    },
    Connect(PeripheralHandle),
    CancelConnection(PeripheralHandle),
    DiscoverServices {
        peripheral: PeripheralHandle,
        filter: Option<Vec<Uuid>>,
    },
    DiscoverCharacteristics {
        service: ServiceHandle,
        filter: Option<Vec<Uuid>>,
    },
    SetNotify {
        characteristic: CharacteristicHandle,
        enabled: bool,
    },
}

/// Output of a session step, applied in order by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Command(AdapterCommand),
    Status(String),
    Received(ReceivedValue),
}

impl Effect {
    pub fn status(line: impl Into<String>) -> Self {
        Effect::Status(line.into())
    }
}

//! Error types for the BLE notification bridge

use thiserror::Error;

use super::types::{PowerState, SessionState};

/// Result type for session state machine operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for central adapter requests
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Discovery step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStage {
    Services,
    Characteristics,
}

impl std::fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryStage::Services => f.write_str("service"),
            DiscoveryStage::Characteristics => f.write_str("characteristic"),
        }
    }
}

/// Errors raised by the BLE session state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot scan: Bluetooth adapter is {0}")]
    AdapterUnavailable(PowerState),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("No peripheral connected")]
    NotConnected,

    #[error("Error discovering {stage}s: {reason}")]
    Discovery {
        stage: DiscoveryStage,
        reason: String,
    },
}

/// Errors related to central adapter requests
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),

    #[error("Invalid peripheral address: {0}")]
    InvalidAddress(String),

    #[error("Unknown peripheral: {0}")]
    UnknownPeripheral(String),
}

impl From<bluer::Error> for AdapterError {
    fn from(e: bluer::Error) -> Self {
        AdapterError::Bluetooth(e.to_string())
    }
}

/// Errors related to value sink writes
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to the bridge service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Bridge service stopped")]
    Stopped,
}

/// Errors related to transport layer
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_unavailable_message() {
        let err = SessionError::AdapterUnavailable(PowerState::PoweredOff);
        assert_eq!(err.to_string(), "Cannot scan: Bluetooth adapter is powered off");
    }

    #[test]
    fn test_invalid_state_message() {
        let err = SessionError::InvalidState {
            operation: "start scan",
            state: SessionState::Subscribed,
        };
        assert_eq!(err.to_string(), "Cannot start scan while subscribed");
    }

    #[test]
    fn test_discovery_message() {
        let err = SessionError::Discovery {
            stage: DiscoveryStage::Characteristics,
            reason: "timeout".into(),
        };
        assert_eq!(
            err.to_string(),
            "Error discovering characteristics: timeout"
        );
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err = ServiceError::from(SessionError::NotConnected);
        assert_eq!(err.to_string(), "No peripheral connected");
    }
}

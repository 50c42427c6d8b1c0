//! Domain types for the BLE notification bridge

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Characteristic the bridge subscribes to unless configured otherwise
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid = Uuid::from_bytes([
    0x2e, 0xa5, 0xe5, 0xc0, 0x47, 0xd9, 0x4e, 0xa9, 0x8e, 0x58, 0x2c, 0x2e, 0x09, 0xac, 0xf6, 0xf0,
]);

/// Advertised name the bridge connects to unless configured otherwise
pub const DEFAULT_TARGET_NAME: &str = "iPhone (2)";

/// BLE session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    Subscribed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::Connecting => "connecting",
            SessionState::DiscoveringServices => "discovering services",
            SessionState::DiscoveringCharacteristics => "discovering characteristics",
            SessionState::Subscribed => "subscribed",
        };
        f.write_str(name)
    }
}

/// Power state reported by the Bluetooth adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl PowerState {
    /// Status line shown in the display log for this power state
    pub fn status_line(&self) -> &'static str {
        match self {
            PowerState::PoweredOn => "Ready",
            PowerState::PoweredOff => "Bluetooth is not available",
            PowerState::Unsupported => "Bluetooth is not supported",
            PowerState::Unauthorized => "Bluetooth is not authorized",
            PowerState::Resetting => "Bluetooth is resetting",
            PowerState::Unknown => "Bluetooth state is unknown",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PowerState::Unknown => "in an unknown state",
            PowerState::Resetting => "resetting",
            PowerState::Unsupported => "unsupported",
            PowerState::Unauthorized => "unauthorized",
            PowerState::PoweredOff => "powered off",
            PowerState::PoweredOn => "powered on",
        };
        f.write_str(name)
    }
}

impl From<bool> for PowerState {
    fn from(powered: bool) -> Self {
        if powered {
            PowerState::PoweredOn
        } else {
            PowerState::PoweredOff
        }
    }
}

/// Platform identifier of a remote device (the device address on BlueZ)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discovered remote device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralHandle {
    pub id: PeripheralId,
    /// Advertised name, if the device advertised one
    pub name: Option<String>,
}

impl PeripheralHandle {
    pub fn new(id: PeripheralId, name: Option<String>) -> Self {
        Self { id, name }
    }

    /// Name used in status lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// A GATT service exposed by a connected peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub peripheral: PeripheralId,
    pub id: u16,
    pub uuid: Uuid,
}

/// A GATT characteristic exposed by a peripheral service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub peripheral: PeripheralId,
    pub service_id: u16,
    pub id: u16,
    pub uuid: Uuid,
}

/// A notification value received from the subscribed characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedValue {
    pub text: String,
    pub timestamp: OffsetDateTime,
}

impl ReceivedValue {
    /// Decode a raw payload, substituting an empty string for invalid UTF-8
    pub fn decode(payload: &[u8], timestamp: OffsetDateTime) -> Self {
        let text = std::str::from_utf8(payload)
            .map(str::to_owned)
            .unwrap_or_default();
        Self { text, timestamp }
    }

    /// Line appended to the display log for this value
    pub fn display_line(&self) -> String {
        format!("{} Received", self.text)
    }
}

/// Snapshot of the session for status queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub power: PowerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peripheral_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peripheral_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characteristic: Option<Uuid>,
    pub log_length: usize,
}

/// Source of timestamps for received values
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Session identifier for transport connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_default_characteristic_uuid() {
        assert_eq!(
            DEFAULT_CHARACTERISTIC_UUID,
            Uuid::parse_str("2EA5E5C0-47D9-4EA9-8E58-2C2E09ACF6F0").unwrap()
        );
    }

    #[test]
    fn test_decode_utf8_payload() {
        let value = ReceivedValue::decode(b"42.0", datetime!(2026-10-16 12:00 UTC));
        assert_eq!(value.text, "42.0");
        assert_eq!(value.display_line(), "42.0 Received");
    }

    #[test]
    fn test_decode_invalid_utf8_substitutes_empty() {
        let value = ReceivedValue::decode(&[0xff, 0xfe, 0x41], datetime!(2026-10-16 12:00 UTC));
        assert_eq!(value.text, "");
        assert_eq!(value.display_line(), " Received");
    }

    #[test]
    fn test_power_state_status_lines_are_distinct() {
        let states = [
            PowerState::Unknown,
            PowerState::Resetting,
            PowerState::Unsupported,
            PowerState::Unauthorized,
            PowerState::PoweredOff,
            PowerState::PoweredOn,
        ];

        for (i, a) in states.iter().enumerate() {
            for b in states.iter().skip(i + 1) {
                assert_ne!(a.status_line(), b.status_line());
            }
        }
        assert_eq!(PowerState::PoweredOn.status_line(), "Ready");
    }

    #[test]
    fn test_power_state_from_powered_flag() {
        assert_eq!(PowerState::from(true), PowerState::PoweredOn);
        assert_eq!(PowerState::from(false), PowerState::PoweredOff);
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_string(&SessionState::DiscoveringServices).unwrap();
        assert_eq!(json, r#""discovering_services""#);
    }

    #[test]
    fn test_peripheral_display_name() {
        let named = PeripheralHandle::new(PeripheralId::new("AA:BB"), Some("Sensor".into()));
        let unnamed = PeripheralHandle::new(PeripheralId::new("CC:DD"), None);
        assert_eq!(named.display_name(), "Sensor");
        assert_eq!(unnamed.display_name(), "Unknown");
    }
}

//! Request message types

use serde::{Deserialize, Serialize};

/// Request messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Start scanning for the target peripheral
    StartScan,

    /// Drop the active connection
    Disconnect,

    /// Get session status
    GetStatus,

    /// Get the display log
    GetLog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_start_scan_serialization() {
        let request = Request::StartScan;
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"method":"start_scan"}"#);

        let deserialized: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);
    }

    #[test]
    fn test_request_disconnect() {
        let json = serde_json::to_string(&Request::Disconnect).unwrap();
        assert_eq!(json, r#"{"method":"disconnect"}"#);
    }

    #[test]
    fn test_request_get_status() {
        let json = serde_json::to_string(&Request::GetStatus).unwrap();
        assert_eq!(json, r#"{"method":"get_status"}"#);
    }

    #[test]
    fn test_request_get_log() {
        let request: Request = serde_json::from_str(r#"{"method":"get_log"}"#).unwrap();
        assert_eq!(request, Request::GetLog);
    }

    #[test]
    fn test_unknown_method_rejected() {
        assert!(serde_json::from_str::<Request>(r#"{"method":"reboot"}"#).is_err());
    }
}

//! Response message types

use serde::{Deserialize, Serialize};

use crate::core::types::{SessionState, SessionStatus};

/// Response messages from server to client
///
/// Untagged, so variants with more required fields come first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    /// Status response
    Status(StatusResponse),

    /// Display log response
    Log(LogResponse),

    /// Scan started response
    ScanStarted(ScanStartedResponse),

    /// Disconnect response
    Disconnect(DisconnectResponse),
}

/// Response for start_scan request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStartedResponse {
    pub status: String,
    pub state: SessionState,
}

/// Response for disconnect request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisconnectResponse {
    pub status: String,
}

/// Response for get_status request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    #[serde(flatten)]
    pub session: SessionStatus,
}

/// Response for get_log request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogResponse {
    pub status: String,
    pub lines: Vec<String>,
}

impl ScanStartedResponse {
    pub fn ok(state: SessionState) -> Self {
        Self {
            status: "ok".to_string(),
            state,
        }
    }
}

impl DisconnectResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

impl StatusResponse {
    pub fn ok(session: SessionStatus) -> Self {
        Self {
            status: "ok".to_string(),
            session,
        }
    }
}

impl LogResponse {
    pub fn ok(lines: Vec<String>) -> Self {
        Self {
            status: "ok".to_string(),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PowerState;

    fn status() -> SessionStatus {
        SessionStatus {
            state: SessionState::Subscribed,
            power: PowerState::PoweredOn,
            peripheral_id: Some("AA:BB:CC:DD:EE:01".into()),
            peripheral_name: Some("iPhone (2)".into()),
            characteristic: None,
            log_length: 5,
        }
    }

    #[test]
    fn test_status_response_is_flat() {
        let response = StatusResponse::ok(status());
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""state":"subscribed""#));
        assert!(json.contains(r#""power":"powered_on""#));
        assert!(json.contains(r#""peripheral_name":"iPhone (2)""#));
        assert!(!json.contains(r#""characteristic""#));
    }

    #[test]
    fn test_untagged_round_trip_picks_matching_variant() {
        let responses = [
            Response::Status(StatusResponse::ok(status())),
            Response::Log(LogResponse::ok(vec!["Ready".into()])),
            Response::ScanStarted(ScanStartedResponse::ok(SessionState::Scanning)),
            Response::Disconnect(DisconnectResponse::ok()),
        ];

        for response in responses {
            let json = serde_json::to_string(&response).unwrap();
            let parsed: Response = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, response);
        }
    }
}

//! Notification message types (server-to-client events)

use serde::{Deserialize, Serialize};

use crate::display::DisplayUpdate;

/// Server-to-client notifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "method", content = "params")]
#[serde(rename_all = "snake_case")]
pub enum Notification {
    /// A line was appended to the display log
    LogAppended(LogAppendedParams),

    /// Clients should scroll to the newest line
    ScrollToLast(ScrollToLastParams),
}

/// Log line notification parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogAppendedParams {
    pub index: usize,
    pub line: String,
}

/// Scroll notification parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrollToLastParams {
    pub index: usize,
}

impl From<DisplayUpdate> for Notification {
    fn from(update: DisplayUpdate) -> Self {
        match update {
            DisplayUpdate::Appended { index, line } => {
                Notification::LogAppended(LogAppendedParams { index, line })
            }
            DisplayUpdate::ScrollToLast { index } => {
                Notification::ScrollToLast(ScrollToLastParams { index })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_appended_notification() {
        let notif = Notification::from(DisplayUpdate::Appended {
            index: 2,
            line: "42.0 Received".into(),
        });
        let json = serde_json::to_string(&notif).unwrap();
        assert_eq!(
            json,
            r#"{"method":"log_appended","params":{"index":2,"line":"42.0 Received"}}"#
        );
    }

    #[test]
    fn test_scroll_to_last_notification() {
        let notif = Notification::from(DisplayUpdate::ScrollToLast { index: 2 });
        let json = serde_json::to_string(&notif).unwrap();
        assert_eq!(json, r#"{"method":"scroll_to_last","params":{"index":2}}"#);

        let deserialized: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, notif);
    }
}

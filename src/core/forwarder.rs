//! Notification forwarder

use tracing::debug;

use crate::{
    core::types::ReceivedValue,
    display::DisplayLog,
    sink::{ValueRecord, ValueSink},
};

/// Hands status lines and received values to the display log and the sink
pub struct NotificationForwarder<S: ValueSink> {
    log: DisplayLog,
    sink: S,
}

impl<S: ValueSink> NotificationForwarder<S> {
    pub fn new(log: DisplayLog, sink: S) -> Self {
        Self { log, sink }
    }

    /// Append a status line to the display log
    pub fn post_status(&mut self, status: impl Into<String>) {
        self.log.append(status);
    }

    /// Log the value and submit it to the sink without waiting
    pub fn forward(&mut self, value: ReceivedValue) {
        let index = self.log.append(value.display_line());
        debug!(index, text = %value.text, "Forwarding received value");
        self.sink.append(ValueRecord::from(&value));
    }

    pub fn log(&self) -> &DisplayLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    #[test]
    fn test_forward_logs_and_writes() {
        let sink = MemorySink::new();
        let mut forwarder = NotificationForwarder::new(DisplayLog::default(), sink.clone());
        let timestamp = datetime!(2026-10-16 12:00 UTC);

        forwarder.forward(ReceivedValue {
            text: "42.0".into(),
            timestamp,
        });

        assert_eq!(forwarder.log().lines(), &["42.0 Received".to_string()]);
        assert_eq!(
            sink.records(),
            vec![ValueRecord {
                value: "42.0".into(),
                timestamp
            }]
        );
    }

    #[test]
    fn test_status_not_written_to_sink() {
        let sink = MemorySink::new();
        let mut forwarder = NotificationForwarder::new(DisplayLog::default(), sink.clone());

        forwarder.post_status("Ready");

        assert_eq!(forwarder.log().lines(), &["Ready".to_string()]);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_forward_preserves_event_order() {
        let sink = MemorySink::new();
        let mut forwarder = NotificationForwarder::new(DisplayLog::default(), sink.clone());

        for (i, text) in ["1", "2", "3"].iter().enumerate() {
            forwarder.forward(ReceivedValue {
                text: text.to_string(),
                timestamp: datetime!(2026-10-16 12:00 UTC) + time::Duration::seconds(i as i64),
            });
        }

        let values: Vec<_> = sink.records().into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec!["1", "2", "3"]);
        assert_eq!(forwarder.log().len(), 3);
    }
}

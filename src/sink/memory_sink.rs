//! In-memory value sink for testing

use std::sync::{Arc, Mutex};

use crate::sink::value_sink::{ValueRecord, ValueSink};

/// Records every appended value
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ValueRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended so far, in submission order
    pub fn records(&self) -> Vec<ValueRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ValueSink for MemorySink {
    fn append(&self, record: ValueRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        let clone = sink.clone();

        for value in ["a", "b", "c"] {
            clone.append(ValueRecord {
                value: value.into(),
                timestamp: datetime!(2026-10-16 12:00 UTC),
            });
        }

        let values: Vec<_> = sink.records().into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }
}

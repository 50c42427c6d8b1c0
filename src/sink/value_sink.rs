//! Value sink trait definition

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::types::ReceivedValue;

/// Document written to the sink for every received value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl From<&ReceivedValue> for ValueRecord {
    fn from(value: &ReceivedValue) -> Self {
        Self {
            value: value.text.clone(),
            timestamp: value.timestamp,
        }
    }
}

/// External store receiving forwarded values
///
/// `append` is fire-and-forget: implementations must not block the caller
/// and report failures only through logging. Records submitted in order must
/// be written in that order.
pub trait ValueSink: Send + Sync + 'static {
    fn append(&self, record: ValueRecord);
}

impl<S: ValueSink> ValueSink for std::sync::Arc<S> {
    fn append(&self, record: ValueRecord) {
        (**self).append(record)
    }
}

//! Value sink abstraction layer

pub mod document_store;
pub mod memory_sink;
pub mod value_sink;

pub use {
    document_store::DocumentStoreSink,
    value_sink::{ValueRecord, ValueSink},
};

#[cfg(test)]
pub use memory_sink::MemorySink;

//! BLE Notify Bridge
//!
//! Finds a named BLE peripheral, subscribes to one characteristic and
//! forwards every notification:
//! - to an append-only display log (console and Unix socket presenters)
//! - to a document store collection with a timestamp

pub mod backend;
pub mod config;
pub mod core;
pub mod display;
pub mod protocol;
pub mod sink;
pub mod transport;

pub use crate::core::{
    error::{AdapterError, ServiceError, SessionError, SinkError, TransportError},
    service::{BridgeHandle, BridgeService},
    session::{BleSession, SessionConfig},
    types::{PowerState, ReceivedValue, SessionState, SessionStatus},
};

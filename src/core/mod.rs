//! Core business logic module

pub mod error;
pub mod events;
pub mod forwarder;
pub mod service;
pub mod session;
pub mod types;

//! Bluetooth central backend abstraction layer

pub mod bluer_central;
pub mod central_adapter;
pub mod mock_adapter;

pub use bluer_central::BluerCentral;
pub use central_adapter::CentralAdapter;

#[cfg(test)]
pub use mock_adapter::MockCentralAdapter;

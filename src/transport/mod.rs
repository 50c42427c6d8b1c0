//! Control surface transports

pub mod unix_socket;

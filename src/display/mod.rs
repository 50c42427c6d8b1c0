//! Display log and presenters

pub mod console;
pub mod log;

pub use {
    console::run_console,
    log::{DisplayLog, DisplayUpdate},
};

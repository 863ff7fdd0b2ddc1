// Module declarations for the library crate.

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod hiddev;
pub mod lcd;
pub mod output;
pub mod report;

// Re-export the session-level API for consumers of the library.
pub use driver::{Driver, EventSource};
pub use error::InitError;

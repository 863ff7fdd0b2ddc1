//! Driver start-up errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported synchronously by [`crate::driver::Driver::start`].
///
/// When `start` fails no teardown call is required: everything opened up
/// to the failure point has already been closed again. Runtime read
/// failures never surface here; they arrive as the terminal event on the
/// session pipe instead.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("unsupported hiddev protocol version {found:#x}")]
    ProtocolVersion { found: i32 },

    #[error(
        "not a recognized handset: vendor {vendor:#06x}, product {product:#06x}, \
         version {version:#06x}, {applications} applications"
    )]
    Identity {
        vendor: u16,
        product: u16,
        version: u16,
        applications: u32,
    },

    #[error("failed to set hiddev report flags: {0}")]
    Flags(#[source] io::Error),

    #[error("failed to create the event pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("status priming round trip failed: {0}")]
    Prime(#[source] io::Error),

    #[error("failed to spawn the reader thread: {0}")]
    Spawn(#[source] io::Error),
}

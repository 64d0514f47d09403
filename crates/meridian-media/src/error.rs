//! Error types for the media layer.
//!
//! Any error out of a [`crate::Media`] call is fatal to the node loop:
//! transient conditions (nothing to read, transmit buffer full) are
//! expressed in-band as `Ok(None)` / `Ok(false)`, never as errors.

use meridian_core::FrameError;

/// Errors that can occur opening or driving a bus media.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media not open")]
    NotOpen,
    #[error("invalid frame handed to media: {0}")]
    Frame(#[from] FrameError),
    #[error("configuration error: {0}")]
    Configuration(String),
}

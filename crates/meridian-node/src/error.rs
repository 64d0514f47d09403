//! Error types for the node orchestrator.

use meridian_media::MediaError;

/// Errors that can occur constructing or running a node.
///
/// Anything surfacing here is fatal to the loop; transient and
/// recoverable-resource conditions are absorbed inside [`crate::Node`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Immutable node identity.
//!
//! Created once at startup and read-only thereafter. The unique id is
//! sixteen random bytes drawn from the OS entropy source; everything else
//! is static build information.

use rand::RngCore;

use crate::codec::NAME_MAX;
use crate::error::NodeError;

/// Protocol version this node implements.
pub const PROTOCOL_VERSION: (u8, u8) = (1, 0);

/// Static identity served by the node information query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub protocol_version: (u8, u8),
    pub software_version: (u8, u8),
    pub vcs_revision_id: u64,
    pub unique_id: [u8; 16],
    /// UTF-8 product name, at most [`NAME_MAX`] bytes.
    pub name: String,
}

impl NodeInfo {
    /// Build the identity with a freshly generated unique id.
    pub fn new(name: impl Into<String>) -> Result<Self, NodeError> {
        let mut unique_id = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut unique_id);
        Self::with_unique_id(name, unique_id)
    }

    /// Build the identity with a caller-provided unique id (tests).
    pub fn with_unique_id(name: impl Into<String>, unique_id: [u8; 16]) -> Result<Self, NodeError> {
        let name = name.into();
        if name.len() > NAME_MAX {
            return Err(NodeError::Config(format!(
                "product name exceeds {NAME_MAX} bytes: {}",
                name.len()
            )));
        }
        Ok(Self {
            protocol_version: PROTOCOL_VERSION,
            software_version: software_version(),
            vcs_revision_id: 0,
            unique_id,
            name,
        })
    }
}

fn software_version() -> (u8, u8) {
    let major = env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0);
    let minor = env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0);
    (major, minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_length_enforced() {
        let long = "x".repeat(NAME_MAX + 1);
        assert!(NodeInfo::new(long).is_err());
        assert!(NodeInfo::new("meridian.test.node").is_ok());
    }

    #[test]
    fn test_unique_id_is_stable_after_construction() {
        let info = NodeInfo::new("meridian.test.node").unwrap();
        let again = info.clone();
        assert_eq!(info.unique_id, again.unique_id);
    }

    #[test]
    fn test_protocol_version() {
        let info = NodeInfo::new("n").unwrap();
        assert_eq!(info.protocol_version, (1, 0));
    }
}

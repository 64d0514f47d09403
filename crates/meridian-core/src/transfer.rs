//! The logical unit of communication reconstructed from one or more frames.

extern crate alloc;
use alloc::vec::Vec;
use core::fmt;

use crate::types::{Microseconds, NodeId, PortId, Priority, TransferId};

/// What a transfer is: a broadcast message, a service request, or the
/// response to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Message,
    Request,
    Response,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Message => write!(f, "message"),
            TransferKind::Request => write!(f, "request"),
            TransferKind::Response => write!(f, "response"),
        }
    }
}

/// A reassembled transfer as delivered to the protocol layer.
///
/// The payload buffer is owned; for transfers built by the reassembler it
/// is charged against the arena and must be released back once processing
/// finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub kind: TransferKind,
    pub priority: Priority,
    pub port: PortId,
    /// `None` for anonymous messages.
    pub source: Option<NodeId>,
    /// Set only for requests and responses.
    pub destination: Option<NodeId>,
    pub transfer_id: TransferId,
    /// Monotonic receive timestamp of the transfer's first frame.
    pub timestamp: Microseconds,
    pub payload: Vec<u8>,
}

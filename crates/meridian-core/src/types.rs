//! Newtype wrappers for protocol field values.
//!
//! These types keep node ids, port ids, and transfer ids from being mixed
//! up with one another or with raw integers, and centralize the range
//! checks the wire format depends on.

use core::fmt;

use crate::constants::{NODE_ID_MAX, TRANSFER_ID_MODULO};
use crate::error::FrameError;

/// Monotonic timestamp or duration in microseconds.
pub type Microseconds = u64;

/// A 7-bit node address (0..=127).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct NodeId(u8);

impl NodeId {
    pub const MAX: NodeId = NodeId(NODE_ID_MAX);

    /// Returns `None` if `value` is out of the 7-bit range.
    pub const fn new(value: u8) -> Option<Self> {
        if value <= NODE_ID_MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodeId {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value).ok_or(FrameError::InvalidNodeId(value))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A subject or service selector.
///
/// The valid range depends on the transfer kind: 13 bits for message
/// subjects, 9 bits for services. Range checks happen when an identifier
/// is built, since only there is the kind known.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct PortId(pub u16);

impl PortId {
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortId({})", self.0)
    }
}

/// A 5-bit wrapping transfer sequence counter.
///
/// Successive transfers on the same port from the same sender increment
/// this modulo [`TRANSFER_ID_MODULO`]. Receivers use it to detect
/// duplicates and restarts, never to order transfers across senders.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[must_use]
pub struct TransferId(u8);

impl TransferId {
    /// Wraps `value` into the 5-bit range.
    pub const fn new(value: u8) -> Self {
        Self(value % TRANSFER_ID_MODULO)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The next transfer id in sequence, wrapping at the modulus.
    pub const fn wrapping_next(self) -> Self {
        Self((self.0 + 1) % TRANSFER_ID_MODULO)
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({})", self.0)
    }
}

/// Transfer priority, lower is more urgent.
///
/// Eight levels occupy the top three identifier bits. The queue discipline
/// guarantees FIFO ordering within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    Exceptional = 0,
    Immediate = 1,
    Fast = 2,
    High = 3,
    Nominal = 4,
    Low = 5,
    Slow = 6,
    Optional = 7,
}

impl Priority {
    /// Decode from the three identifier bits. All eight values are valid.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Priority::Exceptional,
            1 => Priority::Immediate,
            2 => Priority::Fast,
            3 => Priority::High,
            4 => Priority::Nominal,
            5 => Priority::Low,
            6 => Priority::Slow,
            _ => Priority::Optional,
        }
    }

    pub const fn to_bits(self) -> u8 {
        self as u8
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Nominal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_range() {
        assert!(NodeId::new(0).is_some());
        assert!(NodeId::new(127).is_some());
        assert!(NodeId::new(128).is_none());
        assert_eq!(NodeId::new(46).unwrap().get(), 46);
    }

    #[test]
    fn test_node_id_try_from() {
        let id: NodeId = 7u8.try_into().unwrap();
        assert_eq!(id.get(), 7);
        assert!(matches!(
            NodeId::try_from(200u8),
            Err(FrameError::InvalidNodeId(200))
        ));
    }

    #[test]
    fn test_transfer_id_wraps() {
        let mut tid = TransferId::new(30);
        tid = tid.wrapping_next();
        assert_eq!(tid.get(), 31);
        tid = tid.wrapping_next();
        assert_eq!(tid.get(), 0);
    }

    #[test]
    fn test_transfer_id_new_masks_modulus() {
        assert_eq!(TransferId::new(32).get(), 0);
        assert_eq!(TransferId::new(37).get(), 5);
    }

    #[test]
    fn test_priority_bits_roundtrip() {
        for bits in 0..8u8 {
            assert_eq!(Priority::from_bits(bits).to_bits(), bits);
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Exceptional < Priority::Nominal);
        assert!(Priority::Nominal < Priority::Optional);
        assert_eq!(Priority::default(), Priority::Nominal);
    }
}

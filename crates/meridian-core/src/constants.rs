//! Protocol constants for the Meridian bus node.

use crate::types::{Microseconds, PortId};

// Identifier field ranges (29-bit extended frame identifier)
pub const NODE_ID_MAX: u8 = 127;
pub const SUBJECT_ID_MAX: u16 = 8191;
pub const SERVICE_ID_MAX: u16 = 511;

/// Transfer ids wrap modulo this value (5 bits carried in the tail byte).
pub const TRANSFER_ID_MODULO: u8 = 32;

/// Classic bus MTU: 7 payload bytes plus the tail byte.
pub const MTU_CLASSIC: usize = 8;

/// Largest frame payload any media may deliver (FD-sized buses).
pub const MTU_MAX: usize = 64;

/// Size of the transfer CRC appended to multi-frame transfers.
pub const TRANSFER_CRC_SIZE: usize = 2;

/// Protocol-reserved subject id for the periodic node status broadcast.
pub const SUBJECT_HEARTBEAT: PortId = PortId(7509);

/// Protocol-reserved service id for the node information query.
pub const SERVICE_NODE_INFO: PortId = PortId(430);

/// Default window after which a reassembly session with no new frames is
/// considered stale and may be purged.
pub const DEFAULT_TRANSFER_ID_TIMEOUT: Microseconds = 2_000_000;

//! Core types, constants, and wire formats for the Meridian bus node.
//!
//! This crate defines the protocol types, newtype wrappers, the frame
//! identifier and tail-byte wire format, the transfer CRC, and transfer
//! fragmentation used by a Meridian node. It carries no I/O and no state:
//! everything here is a pure function over bytes and small integers.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod constants;
pub mod crc;
pub mod error;
pub mod fragment;
pub mod frame;
pub mod transfer;
pub mod types;

pub use constants::{
    DEFAULT_TRANSFER_ID_TIMEOUT, MTU_CLASSIC, MTU_MAX, NODE_ID_MAX, SERVICE_ID_MAX,
    SERVICE_NODE_INFO, SUBJECT_HEARTBEAT, SUBJECT_ID_MAX, TRANSFER_CRC_SIZE, TRANSFER_ID_MODULO,
};
pub use error::FrameError;
pub use fragment::Fragmenter;
pub use frame::{Frame, FrameId, Tail};
pub use transfer::{Transfer, TransferKind};
pub use types::{Microseconds, NodeId, PortId, Priority, TransferId};

//! Outbound scheduling and inbound reassembly for Meridian nodes.
//!
//! This crate holds the two stateful halves of the node core: the
//! deadline-ordered TX queue and the session-based RX reassembler, plus
//! the bounded arena abstraction both draw their buffers from. All state
//! lives in explicit context objects owned by the caller; nothing here is
//! global and nothing blocks.

pub mod arena;
pub mod rx;
pub mod tx;

pub use arena::{Arena, FaultArena, FixedArena};
pub use rx::{RxError, RxReassembler};
pub use tx::{DrainStats, TxItem, TxPushError, TxQueue};

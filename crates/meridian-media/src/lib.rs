//! Bus media abstraction for Meridian nodes.
//!
//! The node core never touches sockets or device drivers directly; it
//! talks to a [`Media`], a non-blocking frame pipe with transient-busy
//! send semantics and zero-timeout receive polling. Concrete
//! implementations here cover development hosts (UDP datagram
//! encapsulation) and tests (in-memory loopback).

pub mod error;
pub mod loopback;
pub mod testing;
pub mod traits;
pub mod udp;

pub use error::MediaError;
pub use loopback::LoopbackMedia;
pub use traits::Media;
pub use udp::{UdpConfig, UdpMedia};

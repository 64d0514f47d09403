//! Core media trait.

use meridian_core::{Frame, Microseconds};

use crate::error::MediaError;

/// A non-blocking frame pipe over one physical (or simulated) bus link.
///
/// The node loop drives a `Media` with zero timeouts and must never be
/// blocked by it: absence of inbound frames is `Ok(None)`, a momentarily
/// saturated transmitter is `Ok(false)`. An `Err` from either call means
/// the link itself has failed and the node loop terminates.
pub trait Media {
    /// Human-readable name, e.g. `"udp[0.0.0.0:29460]"`.
    fn name(&self) -> &str;

    /// Frame payload budget of this link, tail byte included.
    fn mtu(&self) -> usize;

    /// Whether the media is currently usable.
    fn is_open(&self) -> bool;

    /// Attempt to transmit one frame, waiting at most `timeout`
    /// microseconds. `Ok(false)` means the link is momentarily busy and
    /// the frame was not sent.
    fn send(&mut self, frame: &Frame, timeout: Microseconds) -> Result<bool, MediaError>;

    /// Poll for one inbound frame, waiting at most `timeout` microseconds.
    /// Malformed datagrams are dropped silently (wire noise is not an
    /// error); `Ok(None)` means nothing arrived in time.
    fn receive(&mut self, timeout: Microseconds) -> Result<Option<Frame>, MediaError>;
}

//! In-memory loopback media.
//!
//! Used by tests and demos to drive a node without sockets: the harness
//! injects inbound frames and inspects what the node transmitted. The
//! busy and failed switches simulate a saturated transmitter and a
//! hardware-level link failure.

use std::collections::VecDeque;
use std::io::ErrorKind;

use meridian_core::{Frame, Microseconds, MTU_CLASSIC};

use crate::error::MediaError;
use crate::traits::Media;

pub struct LoopbackMedia {
    name: String,
    mtu: usize,
    inbound: VecDeque<Frame>,
    outbound: Vec<Frame>,
    busy: bool,
    failed: bool,
}

impl LoopbackMedia {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mtu: MTU_CLASSIC,
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            busy: false,
            failed: false,
        }
    }

    /// Queue a frame for the node to receive.
    pub fn inject(&mut self, frame: Frame) {
        self.inbound.push_back(frame);
    }

    /// Frames the node has transmitted, in order.
    pub fn sent(&self) -> &[Frame] {
        &self.outbound
    }

    /// Drain and return the transmitted frames.
    pub fn take_sent(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.outbound)
    }

    /// While busy, `send` reports transient saturation.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Once failed, both directions return a fatal error.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    fn check_failed(&self) -> Result<(), MediaError> {
        if self.failed {
            Err(MediaError::Io(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "simulated link failure",
            )))
        } else {
            Ok(())
        }
    }
}

impl Media for LoopbackMedia {
    fn name(&self) -> &str {
        &self.name
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn is_open(&self) -> bool {
        !self.failed
    }

    fn send(&mut self, frame: &Frame, _timeout: Microseconds) -> Result<bool, MediaError> {
        self.check_failed()?;
        if self.busy {
            return Ok(false);
        }
        self.outbound.push(frame.clone());
        Ok(true)
    }

    fn receive(&mut self, _timeout: Microseconds) -> Result<Option<Frame>, MediaError> {
        self.check_failed()?;
        Ok(self.inbound.pop_front())
    }
}

//! UDP datagram media.
//!
//! A development stand-in for a physical bus: each frame travels as one
//! datagram carrying the 29-bit identifier as four big-endian bytes
//! followed by the frame payload. Datagrams are atomic, so no extra
//! framing is needed; a real bus driver would implement [`Media`] at the
//! same seam.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use meridian_core::{Frame, Microseconds, MTU_CLASSIC};

use crate::error::MediaError;
use crate::traits::Media;

/// Identifier prefix bytes in each datagram.
const HEADER_SIZE: usize = 4;

/// Receive buffer: header plus the largest frame payload any peer may send.
const RECV_BUFFER: usize = 128;

/// Sleep granularity while waiting out a non-zero receive timeout.
const POLL_SLEEP: Duration = Duration::from_micros(200);

/// Configuration for a [`UdpMedia`].
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub name: String,
    /// Local address to bind the socket to.
    pub bind: SocketAddr,
    /// Destination for outgoing datagrams (`None` for receive-only).
    pub target: Option<SocketAddr>,
    /// Whether to enable `SO_BROADCAST`.
    pub broadcast: bool,
    /// Frame payload budget advertised to the TX path.
    pub mtu: usize,
}

impl UdpConfig {
    /// Send-and-receive configuration towards a specific peer.
    pub fn unicast(name: impl Into<String>, bind: SocketAddr, target: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind,
            target: Some(target),
            broadcast: false,
            mtu: MTU_CLASSIC,
        }
    }

    /// Send-and-receive configuration over a broadcast address.
    pub fn broadcast(name: impl Into<String>, bind: SocketAddr, target: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind,
            target: Some(target),
            broadcast: true,
            mtu: MTU_CLASSIC,
        }
    }

    /// Receive-only configuration.
    pub fn receive_only(name: impl Into<String>, bind: SocketAddr) -> Self {
        Self {
            name: name.into(),
            bind,
            target: None,
            broadcast: false,
            mtu: MTU_CLASSIC,
        }
    }
}

/// A non-blocking UDP media.
pub struct UdpMedia {
    config: UdpConfig,
    label: String,
    socket: UdpSocket,
}

impl UdpMedia {
    /// Bind the socket and switch it to non-blocking mode.
    pub fn open(config: UdpConfig) -> Result<Self, MediaError> {
        let socket = UdpSocket::bind(config.bind)?;
        socket.set_nonblocking(true)?;
        if config.broadcast {
            socket.set_broadcast(true)?;
        }
        let local = socket.local_addr()?;
        let label = format!("{}[{local}]", config.name);
        debug!(media = %label, target = ?config.target, "udp media open");
        Ok(Self {
            config,
            label,
            socket,
        })
    }

    fn decode(&self, datagram: &[u8]) -> Option<Frame> {
        if datagram.len() <= HEADER_SIZE {
            trace!(media = %self.label, len = datagram.len(), "runt datagram dropped");
            return None;
        }
        let raw_id = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        match Frame::parse(raw_id, &datagram[HEADER_SIZE..]) {
            Ok(frame) => Some(frame),
            Err(e) => {
                trace!(media = %self.label, error = %e, "malformed frame dropped");
                None
            }
        }
    }
}

impl Media for UdpMedia {
    fn name(&self) -> &str {
        &self.label
    }

    fn mtu(&self) -> usize {
        self.config.mtu
    }

    fn is_open(&self) -> bool {
        true
    }

    fn send(&mut self, frame: &Frame, _timeout: Microseconds) -> Result<bool, MediaError> {
        let Some(target) = self.config.target else {
            return Err(MediaError::Configuration(
                "receive-only media cannot transmit".into(),
            ));
        };

        let mut datagram = Vec::with_capacity(HEADER_SIZE + frame.payload().len());
        datagram.extend_from_slice(&frame.id.encode()?.to_be_bytes());
        datagram.extend_from_slice(frame.payload());

        match self.socket.send_to(&datagram, target) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn receive(&mut self, timeout: Microseconds) -> Result<Option<Frame>, MediaError> {
        let deadline = Instant::now() + Duration::from_micros(timeout);
        let mut buf = [0u8; RECV_BUFFER];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, _peer)) => {
                    if let Some(frame) = self.decode(&buf[..len]) {
                        return Ok(Some(frame));
                    }
                    // Noise datagram: keep polling within the same budget.
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if timeout == 0 || Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(POLL_SLEEP);
                }
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}

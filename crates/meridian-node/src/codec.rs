//! Bounded payload codec for the two protocol types this node speaks.
//!
//! Layouts are fixed and little-endian where multi-byte:
//!
//! Heartbeat (7 bytes): uptime seconds `u32`, health byte, mode byte,
//! vendor-specific status byte.
//!
//! Node info response (≤ 79 bytes): protocol version major/minor,
//! software version major/minor, VCS revision id `u64`, 16-byte unique
//! id, name length byte, name bytes. The request payload is empty.

use crate::info::NodeInfo;

/// Serialized heartbeat size; doubles as the subscription extent.
pub const HEARTBEAT_SIZE: usize = 7;

/// Node info requests carry no payload.
pub const INFO_REQUEST_EXTENT: usize = 0;

/// Maximum UTF-8 product name length in bytes.
pub const NAME_MAX: usize = 50;

/// Upper bound of a serialized node info response.
pub const INFO_RESPONSE_MAX: usize = 2 + 2 + 8 + 16 + 1 + NAME_MAX;

/// Payload codec failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload too short: need at least {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },
    #[error("invalid health value: {0}")]
    InvalidHealth(u8),
    #[error("invalid mode value: {0}")]
    InvalidMode(u8),
    #[error("name length {len} exceeds payload of {actual} bytes")]
    NameOverrun { len: usize, actual: usize },
    #[error("name is not valid UTF-8")]
    NameNotUtf8,
}

/// Self-reported node health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Health {
    Nominal = 0,
    Advisory = 1,
    Caution = 2,
    Warning = 3,
}

impl Health {
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(Health::Nominal),
            1 => Ok(Health::Advisory),
            2 => Ok(Health::Caution),
            3 => Ok(Health::Warning),
            other => Err(CodecError::InvalidHealth(other)),
        }
    }
}

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Operational = 0,
    Initialization = 1,
    Maintenance = 2,
    SoftwareUpdate = 3,
}

impl Mode {
    pub fn from_byte(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0 => Ok(Mode::Operational),
            1 => Ok(Mode::Initialization),
            2 => Ok(Mode::Maintenance),
            3 => Ok(Mode::SoftwareUpdate),
            other => Err(CodecError::InvalidMode(other)),
        }
    }
}

/// The periodic status broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub uptime_seconds: u32,
    pub health: Health,
    pub mode: Mode,
    pub vendor_status: u8,
}

impl Heartbeat {
    pub fn serialize(&self) -> [u8; HEARTBEAT_SIZE] {
        let mut out = [0u8; HEARTBEAT_SIZE];
        out[..4].copy_from_slice(&self.uptime_seconds.to_le_bytes());
        out[4] = self.health as u8;
        out[5] = self.mode as u8;
        out[6] = self.vendor_status;
        out
    }

    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() < HEARTBEAT_SIZE {
            return Err(CodecError::TooShort {
                min: HEARTBEAT_SIZE,
                actual: payload.len(),
            });
        }
        Ok(Self {
            uptime_seconds: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
            health: Health::from_byte(payload[4])?,
            mode: Mode::from_byte(payload[5])?,
            vendor_status: payload[6],
        })
    }
}

/// Serialize a node info response. The result never exceeds
/// [`INFO_RESPONSE_MAX`]; the name length is bounded at identity
/// construction.
pub fn serialize_info(info: &NodeInfo) -> Vec<u8> {
    let mut out = Vec::with_capacity(INFO_RESPONSE_MAX);
    out.push(info.protocol_version.0);
    out.push(info.protocol_version.1);
    out.push(info.software_version.0);
    out.push(info.software_version.1);
    out.extend_from_slice(&info.vcs_revision_id.to_le_bytes());
    out.extend_from_slice(&info.unique_id);
    out.push(info.name.len() as u8);
    out.extend_from_slice(info.name.as_bytes());
    out
}

/// Parse a node info response.
pub fn parse_info(payload: &[u8]) -> Result<NodeInfo, CodecError> {
    const FIXED: usize = 2 + 2 + 8 + 16 + 1;
    if payload.len() < FIXED {
        return Err(CodecError::TooShort {
            min: FIXED,
            actual: payload.len(),
        });
    }
    let mut revision = [0u8; 8];
    revision.copy_from_slice(&payload[4..12]);
    let mut unique_id = [0u8; 16];
    unique_id.copy_from_slice(&payload[12..28]);

    let name_len = payload[28] as usize;
    let name_bytes = &payload[FIXED..];
    if name_len > name_bytes.len() {
        return Err(CodecError::NameOverrun {
            len: name_len,
            actual: name_bytes.len(),
        });
    }
    let name = core::str::from_utf8(&name_bytes[..name_len])
        .map_err(|_| CodecError::NameNotUtf8)?
        .to_string();

    Ok(NodeInfo {
        protocol_version: (payload[0], payload[1]),
        software_version: (payload[2], payload[3]),
        vcs_revision_id: u64::from_le_bytes(revision),
        unique_id,
        name,
    })
}

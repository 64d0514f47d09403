//! Frame identifier and tail-byte wire format.
//!
//! A frame is the smallest unit of bus transmission: a 29-bit extended
//! identifier plus a payload whose final byte is the tail byte. The
//! identifier encodes priority, transfer kind, port, and node addresses;
//! the tail byte carries the start/end/toggle reassembly bits and the
//! 5-bit transfer id.
//!
//! Identifier layout:
//!
//! ```text
//! bits 28..26  priority
//! bit  25      service (1) / message (0)
//! messages:    bit 24 anonymous, bits 20..8 subject id, bits 6..0 source
//! services:    bit 24 request (1) / response (0), bits 22..14 service id,
//!              bits 13..7 destination, bits 6..0 source
//! ```
//!
//! Bit 7 is reserved as zero in both forms. For messages, bits 21 and 22
//! transmit as ones and are ignored on receive; bit 23 is reserved as zero.

extern crate alloc;
use alloc::vec::Vec;

use crate::constants::{MTU_MAX, SERVICE_ID_MAX, SUBJECT_ID_MAX};
use crate::error::FrameError;
use crate::transfer::TransferKind;
use crate::types::{NodeId, PortId, Priority, TransferId};

const BIT_SERVICE: u32 = 1 << 25;
const BIT_ANONYMOUS: u32 = 1 << 24;
const BIT_REQUEST: u32 = 1 << 24;
const BIT_RESERVED_23: u32 = 1 << 23;
const BIT_RESERVED_07: u32 = 1 << 7;
const MESSAGE_FILL_21_22: u32 = 0b11 << 21;

const OFFSET_PRIORITY: u32 = 26;
const OFFSET_SUBJECT: u32 = 8;
const OFFSET_SERVICE: u32 = 14;
const OFFSET_DESTINATION: u32 = 7;

const IDENTIFIER_MASK: u32 = 0x1FFF_FFFF;

/// Decoded frame identifier fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId {
    pub priority: Priority,
    pub kind: TransferKind,
    pub port: PortId,
    /// `None` only for anonymous messages.
    pub source: Option<NodeId>,
    /// `Some` only for services.
    pub destination: Option<NodeId>,
}

impl FrameId {
    /// Identifier for a broadcast message. `source = None` marks the
    /// message anonymous.
    pub fn message(
        priority: Priority,
        subject: PortId,
        source: Option<NodeId>,
    ) -> Result<Self, FrameError> {
        if subject.get() > SUBJECT_ID_MAX {
            return Err(FrameError::InvalidSubjectId(subject.get()));
        }
        Ok(Self {
            priority,
            kind: TransferKind::Message,
            port: subject,
            source,
            destination: None,
        })
    }

    /// Identifier for a service request addressed to `destination`.
    pub fn request(
        priority: Priority,
        service: PortId,
        source: NodeId,
        destination: NodeId,
    ) -> Result<Self, FrameError> {
        Self::service(priority, TransferKind::Request, service, source, destination)
    }

    /// Identifier for a service response addressed back to `destination`.
    pub fn response(
        priority: Priority,
        service: PortId,
        source: NodeId,
        destination: NodeId,
    ) -> Result<Self, FrameError> {
        Self::service(priority, TransferKind::Response, service, source, destination)
    }

    fn service(
        priority: Priority,
        kind: TransferKind,
        service: PortId,
        source: NodeId,
        destination: NodeId,
    ) -> Result<Self, FrameError> {
        if service.get() > SERVICE_ID_MAX {
            return Err(FrameError::InvalidServiceId(service.get()));
        }
        Ok(Self {
            priority,
            kind,
            port: service,
            source: Some(source),
            destination: Some(destination),
        })
    }

    /// Parse a raw 29-bit identifier.
    pub fn parse(raw: u32) -> Result<Self, FrameError> {
        if raw & !IDENTIFIER_MASK != 0 {
            return Err(FrameError::IdentifierTooWide(raw));
        }
        if raw & BIT_RESERVED_07 != 0 || raw & BIT_RESERVED_23 != 0 {
            return Err(FrameError::ReservedBitSet(raw));
        }

        let priority = Priority::from_bits((raw >> OFFSET_PRIORITY) as u8);
        let source_bits = (raw & 0x7F) as u8;

        if raw & BIT_SERVICE != 0 {
            let kind = if raw & BIT_REQUEST != 0 {
                TransferKind::Request
            } else {
                TransferKind::Response
            };
            let port = PortId(((raw >> OFFSET_SERVICE) & 0x1FF) as u16);
            let destination = ((raw >> OFFSET_DESTINATION) & 0x7F) as u8;
            Ok(Self {
                priority,
                kind,
                port,
                source: NodeId::new(source_bits),
                destination: NodeId::new(destination),
            })
        } else {
            let port = PortId(((raw >> OFFSET_SUBJECT) & 0x1FFF) as u16);
            let source = if raw & BIT_ANONYMOUS != 0 {
                None
            } else {
                NodeId::new(source_bits)
            };
            Ok(Self {
                priority,
                kind: TransferKind::Message,
                port,
                source,
                destination: None,
            })
        }
    }

    /// Encode to a raw 29-bit identifier.
    pub fn encode(&self) -> Result<u32, FrameError> {
        let priority = (self.priority.to_bits() as u32) << OFFSET_PRIORITY;
        match self.kind {
            TransferKind::Message => {
                if self.port.get() > SUBJECT_ID_MAX {
                    return Err(FrameError::InvalidSubjectId(self.port.get()));
                }
                let source = match self.source {
                    Some(id) => id.get() as u32,
                    None => 0,
                };
                let anonymous = if self.source.is_none() { BIT_ANONYMOUS } else { 0 };
                Ok(priority
                    | anonymous
                    | MESSAGE_FILL_21_22
                    | ((self.port.get() as u32) << OFFSET_SUBJECT)
                    | source)
            }
            TransferKind::Request | TransferKind::Response => {
                if self.port.get() > SERVICE_ID_MAX {
                    return Err(FrameError::InvalidServiceId(self.port.get()));
                }
                let (Some(source), Some(destination)) = (self.source, self.destination) else {
                    return Err(FrameError::MissingNodeId);
                };
                let request = if self.kind == TransferKind::Request {
                    BIT_REQUEST
                } else {
                    0
                };
                Ok(priority
                    | BIT_SERVICE
                    | request
                    | ((self.port.get() as u32) << OFFSET_SERVICE)
                    | ((destination.get() as u32) << OFFSET_DESTINATION)
                    | source.get() as u32)
            }
        }
    }
}

/// Decoded tail byte: reassembly bits plus the transfer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tail {
    pub start: bool,
    pub end: bool,
    pub toggle: bool,
    pub transfer_id: TransferId,
}

impl Tail {
    pub const fn new(start: bool, end: bool, toggle: bool, transfer_id: TransferId) -> Self {
        Self {
            start,
            end,
            toggle,
            transfer_id,
        }
    }

    /// Tail byte of a transfer that fits in one frame.
    pub const fn single(transfer_id: TransferId) -> Self {
        Self::new(true, true, true, transfer_id)
    }

    pub const fn from_byte(byte: u8) -> Self {
        Self {
            start: byte & 0x80 != 0,
            end: byte & 0x40 != 0,
            toggle: byte & 0x20 != 0,
            transfer_id: TransferId::new(byte & 0x1F),
        }
    }

    pub const fn to_byte(self) -> u8 {
        (self.start as u8) << 7
            | (self.end as u8) << 6
            | (self.toggle as u8) << 5
            | self.transfer_id.get()
    }

    /// Whether this tail marks a complete single-frame transfer.
    pub const fn is_single(self) -> bool {
        self.start && self.end
    }
}

/// A wire frame: identifier fields plus payload, tail byte last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: FrameId,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame from an identifier and a payload that already ends
    /// with the tail byte.
    pub fn new(id: FrameId, payload: Vec<u8>) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }
        if payload.len() > MTU_MAX {
            return Err(FrameError::PayloadTooLong {
                max: MTU_MAX,
                actual: payload.len(),
            });
        }
        Ok(Self { id, payload })
    }

    /// Parse a frame from a raw identifier and payload bytes.
    pub fn parse(raw_id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        let id = FrameId::parse(raw_id)?;
        Self::new(id, payload.to_vec())
    }

    /// Full payload including the tail byte.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload bytes without the tail byte.
    pub fn data(&self) -> &[u8] {
        &self.payload[..self.payload.len() - 1]
    }

    pub fn tail(&self) -> Tail {
        Tail::from_byte(self.payload[self.payload.len() - 1])
    }

    /// Consume the frame, returning its payload buffer.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arbitrary_message_id() -> impl Strategy<Value = FrameId> {
        (0..=7u8, 0..=SUBJECT_ID_MAX, proptest::option::of(0..=127u8)).prop_map(
            |(prio, subject, source)| {
                FrameId::message(
                    Priority::from_bits(prio),
                    PortId(subject),
                    source.and_then(NodeId::new),
                )
                .unwrap()
            },
        )
    }

    fn arbitrary_service_id() -> impl Strategy<Value = FrameId> {
        (0..=7u8, 0..=SERVICE_ID_MAX, 0..=127u8, 0..=127u8, proptest::bool::ANY).prop_map(
            |(prio, service, src, dst, request)| {
                let build = if request {
                    FrameId::request
                } else {
                    FrameId::response
                };
                build(
                    Priority::from_bits(prio),
                    PortId(service),
                    NodeId::new(src).unwrap(),
                    NodeId::new(dst).unwrap(),
                )
                .unwrap()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn message_id_roundtrip(id in arbitrary_message_id()) {
            let raw = id.encode().unwrap();
            prop_assert_eq!(FrameId::parse(raw).unwrap(), id);
        }

        #[test]
        fn service_id_roundtrip(id in arbitrary_service_id()) {
            let raw = id.encode().unwrap();
            prop_assert_eq!(FrameId::parse(raw).unwrap(), id);
        }

        #[test]
        fn tail_roundtrip(byte in proptest::num::u8::ANY) {
            prop_assert_eq!(Tail::from_byte(byte).to_byte(), byte);
        }
    }
}

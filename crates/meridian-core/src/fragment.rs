//! Transfer fragmentation.
//!
//! Splits a transfer payload into tail-byte-stamped frame payloads. A
//! payload that fits in one frame travels as-is; anything larger is cut
//! into MTU-sized pieces with the transfer CRC appended after the last
//! payload byte. The toggle bit starts at one on the start frame and
//! alternates on every subsequent frame.

extern crate alloc;
use alloc::vec::Vec;

use crate::constants::{MTU_MAX, TRANSFER_CRC_SIZE};
use crate::crc::transfer_crc;
use crate::frame::Tail;
use crate::types::TransferId;

/// One frame's worth of a fragmented transfer.
///
/// Pieces reference the original payload; [`Piece::write_into`] copies the
/// bytes plus any CRC portion and the tail byte into a destination buffer.
#[derive(Debug, Clone, Copy)]
pub struct Piece<'a> {
    data: &'a [u8],
    crc_bytes: [u8; TRANSFER_CRC_SIZE],
    crc_len: usize,
    tail: Tail,
}

impl Piece<'_> {
    /// Total frame payload length: data, CRC portion, tail byte.
    pub fn len(&self) -> usize {
        self.data.len() + self.crc_len + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn tail(&self) -> Tail {
        self.tail
    }

    /// Append this piece's bytes to `buf`.
    pub fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.data);
        buf.extend_from_slice(&self.crc_bytes[..self.crc_len]);
        buf.push(self.tail.to_byte());
    }
}

/// Iterator over the frame payloads of one transfer.
#[derive(Debug, Clone)]
pub struct Fragmenter<'a> {
    payload: &'a [u8],
    crc: [u8; TRANSFER_CRC_SIZE],
    transfer_id: TransferId,
    capacity: usize,
    total: usize,
    offset: usize,
    index: usize,
}

impl<'a> Fragmenter<'a> {
    /// `mtu` is the full frame payload budget including the tail byte and
    /// must be in `2..=MTU_MAX`.
    pub fn new(payload: &'a [u8], transfer_id: TransferId, mtu: usize) -> Self {
        debug_assert!((2..=MTU_MAX).contains(&mtu));
        let capacity = mtu - 1;
        let multi = payload.len() > capacity;
        let total = if multi {
            payload.len() + TRANSFER_CRC_SIZE
        } else {
            payload.len()
        };
        Self {
            payload,
            crc: transfer_crc(payload).to_be_bytes(),
            transfer_id,
            capacity,
            total,
            offset: 0,
            index: 0,
        }
    }

    /// Number of frames this transfer occupies.
    pub fn frame_count(&self) -> usize {
        if self.total <= self.capacity {
            1
        } else {
            self.total.div_ceil(self.capacity)
        }
    }

    fn is_multi(&self) -> bool {
        self.total > self.payload.len()
    }
}

impl<'a> Iterator for Fragmenter<'a> {
    type Item = Piece<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.frame_count() {
            return None;
        }

        let end = (self.offset + self.capacity).min(self.total);
        let data_end = end.min(self.payload.len());
        let data = if self.offset < self.payload.len() {
            &self.payload[self.offset..data_end]
        } else {
            &[]
        };

        // CRC portion of this frame, if the window extends past the payload.
        let crc_from = self.offset.max(self.payload.len()) - self.payload.len();
        let crc_to = end.max(self.payload.len()) - self.payload.len();
        let mut crc_bytes = [0u8; TRANSFER_CRC_SIZE];
        let crc_len = if self.is_multi() { crc_to - crc_from } else { 0 };
        crc_bytes[..crc_len].copy_from_slice(&self.crc[crc_from..crc_to]);

        let last = self.index + 1 == self.frame_count();
        let tail = Tail::new(
            self.index == 0,
            last,
            self.index % 2 == 0,
            self.transfer_id,
        );

        self.offset = end;
        self.index += 1;
        Some(Piece {
            data,
            crc_bytes,
            crc_len,
            tail,
        })
    }
}

/// Convenience: fragment `payload` into fully materialized frame payloads.
pub fn fragment(payload: &[u8], transfer_id: TransferId, mtu: usize) -> Vec<Vec<u8>> {
    Fragmenter::new(payload, transfer_id, mtu)
        .map(|piece| {
            let mut buf = Vec::with_capacity(piece.len());
            piece.write_into(&mut buf);
            buf
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MTU_CLASSIC;
    use crate::frame::Tail;

    fn tails(frames: &[Vec<u8>]) -> Vec<Tail> {
        frames
            .iter()
            .map(|f| Tail::from_byte(*f.last().unwrap()))
            .collect()
    }

    #[test]
    fn test_empty_payload_single_frame() {
        let frames = fragment(&[], TransferId::new(5), MTU_CLASSIC);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 1);
        let tail = Tail::from_byte(frames[0][0]);
        assert!(tail.is_single());
        assert!(tail.toggle);
        assert_eq!(tail.transfer_id.get(), 5);
    }

    #[test]
    fn test_exact_fit_is_single_frame() {
        let payload = [0xAAu8; MTU_CLASSIC - 1];
        let frames = fragment(&payload, TransferId::new(0), MTU_CLASSIC);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MTU_CLASSIC);
        assert!(Tail::from_byte(*frames[0].last().unwrap()).is_single());
    }

    #[test]
    fn test_one_byte_over_fragments_with_crc() {
        let payload = [0x55u8; MTU_CLASSIC];
        let frames = fragment(&payload, TransferId::new(1), MTU_CLASSIC);
        // 8 payload + 2 CRC = 10 bytes over 7-byte windows → 2 frames.
        assert_eq!(frames.len(), 2);
        let total_bytes: usize = frames.iter().map(|f| f.len() - 1).sum();
        assert_eq!(total_bytes, payload.len() + TRANSFER_CRC_SIZE);
    }

    #[test]
    fn test_toggle_alternates_from_one() {
        let payload = [7u8; 20];
        let frames = fragment(&payload, TransferId::new(2), MTU_CLASSIC);
        let tails = tails(&frames);
        assert!(tails[0].start && !tails[0].end);
        assert!(tails.last().unwrap().end);
        for (i, tail) in tails.iter().enumerate() {
            assert_eq!(tail.toggle, i % 2 == 0, "toggle wrong at frame {i}");
            assert_eq!(tail.transfer_id.get(), 2);
        }
    }

    #[test]
    fn test_crc_straddles_frame_boundary() {
        // 13 payload bytes + 2 CRC = 15 over 7-byte windows: the CRC is
        // split across the second and third frames.
        let payload: Vec<u8> = (0u8..13).collect();
        let frames = fragment(&payload, TransferId::new(3), MTU_CLASSIC);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].len(), 2); // one CRC byte + tail

        let mut accumulated = Vec::new();
        for frame in &frames {
            accumulated.extend_from_slice(&frame[..frame.len() - 1]);
        }
        assert_eq!(transfer_crc(&accumulated), 0);
        assert_eq!(&accumulated[..payload.len()], payload.as_slice());
    }

    #[test]
    fn test_frame_count_matches_iterator() {
        for len in 0..64usize {
            let payload = alloc::vec![0u8; len];
            let fragmenter = Fragmenter::new(&payload, TransferId::new(0), MTU_CLASSIC);
            let expected = fragmenter.frame_count();
            assert_eq!(fragmenter.count(), expected, "payload len {len}");
        }
    }

    #[test]
    fn test_pieces_respect_mtu() {
        let payload = [9u8; 100];
        for frame in fragment(&payload, TransferId::new(4), MTU_CLASSIC) {
            assert!(frame.len() <= MTU_CLASSIC);
            assert!(!frame.is_empty());
        }
    }
}

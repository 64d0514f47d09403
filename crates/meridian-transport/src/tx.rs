//! Outbound transfer scheduling.
//!
//! The TX queue owns every frame buffer between enqueue and transmission.
//! Frames drain in (priority, deadline, insertion) order, so urgent
//! traffic overtakes bulk traffic while FIFO fairness holds within a
//! priority level. A frame whose deadline has passed is dropped and its
//! buffer released; it is never handed to the media.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use meridian_core::{Frame, FrameError, FrameId, Microseconds, TransferKind, MTU_MAX};
use meridian_core::fragment::Fragmenter;
use meridian_core::types::TransferId;

use crate::arena::Arena;

/// Errors from [`TxQueue::push`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TxPushError {
    #[error("TX queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("arena exhausted while building frames")]
    OutOfMemory,
    #[error("anonymous messages must fit in a single frame")]
    AnonymousMultiFrame,
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// A queued frame with its shared transfer deadline.
#[derive(Debug)]
pub struct TxItem {
    pub frame: Frame,
    /// Absolute drop-dead time; `None` means no limit.
    pub deadline: Option<Microseconds>,
    seq: u64,
}

impl TxItem {
    pub fn expired(&self, now: Microseconds) -> bool {
        matches!(self.deadline, Some(d) if d <= now)
    }

    fn key(&self) -> (u8, Microseconds, u64) {
        (
            self.frame.id.priority.to_bits(),
            self.deadline.unwrap_or(Microseconds::MAX),
            self.seq,
        )
    }
}

impl PartialEq for TxItem {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for TxItem {}

impl PartialOrd for TxItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TxItem {
    // BinaryHeap is a max-heap; invert so the head is the lowest
    // (priority, deadline, sequence) triple.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub sent: usize,
    pub expired: usize,
}

/// Bounded, priority- and deadline-ordered outbound frame queue.
pub struct TxQueue {
    heap: BinaryHeap<TxItem>,
    capacity: usize,
    mtu: usize,
    next_seq: u64,
}

impl TxQueue {
    /// `capacity` bounds the queued frame count; `mtu` is the per-frame
    /// payload budget including the tail byte (`2..=MTU_MAX`).
    pub fn new(capacity: usize, mtu: usize) -> Self {
        assert!(
            (2..=MTU_MAX).contains(&mtu),
            "mtu {mtu} outside 2..={MTU_MAX}"
        );
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            capacity,
            mtu,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn peek(&self) -> Option<&TxItem> {
        self.heap.peek()
    }

    /// Fragment a transfer and enqueue all of its frames with a shared
    /// deadline. Either every frame is enqueued or none: capacity and
    /// arena exhaustion leave the queue and arena untouched.
    pub fn push(
        &mut self,
        arena: &mut dyn Arena,
        id: FrameId,
        transfer_id: TransferId,
        payload: &[u8],
        deadline: Option<Microseconds>,
    ) -> Result<usize, TxPushError> {
        id.encode()?;
        if id.kind == TransferKind::Message
            && id.source.is_none()
            && payload.len() > self.mtu - 1
        {
            return Err(TxPushError::AnonymousMultiFrame);
        }

        let fragmenter = Fragmenter::new(payload, transfer_id, self.mtu);
        let count = fragmenter.frame_count();
        if self.heap.len() + count > self.capacity {
            return Err(TxPushError::QueueFull {
                capacity: self.capacity,
            });
        }

        let mut buffers = Vec::with_capacity(count);
        for piece in fragmenter {
            match arena.try_alloc(piece.len()) {
                Some(mut buf) => {
                    piece.write_into(&mut buf);
                    buffers.push(buf);
                }
                None => {
                    for buf in buffers {
                        arena.release(buf);
                    }
                    return Err(TxPushError::OutOfMemory);
                }
            }
        }

        for buf in buffers {
            let frame = Frame::new(id, buf)?;
            self.heap.push(TxItem {
                frame,
                deadline,
                seq: self.next_seq,
            });
            self.next_seq += 1;
        }
        Ok(count)
    }

    /// Drain the queue head-first against a non-blocking send attempt.
    ///
    /// Expired frames are dropped and their buffers released without
    /// transmission. A send returning `Ok(false)` (transient saturation)
    /// leaves the head in place and stops the pass; a send error aborts
    /// the pass and is returned to the caller.
    pub fn drain<E>(
        &mut self,
        arena: &mut dyn Arena,
        now: Microseconds,
        mut send: impl FnMut(&Frame) -> Result<bool, E>,
    ) -> Result<DrainStats, E> {
        let mut stats = DrainStats::default();
        while let Some(head) = self.heap.peek() {
            if head.expired(now) {
                if let Some(item) = self.heap.pop() {
                    arena.release(item.frame.into_payload());
                    stats.expired += 1;
                }
                continue;
            }
            if !send(&head.frame)? {
                break;
            }
            if let Some(item) = self.heap.pop() {
                arena.release(item.frame.into_payload());
                stats.sent += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, FaultArena, FixedArena};
    use meridian_core::types::{NodeId, PortId, Priority};
    use meridian_core::MTU_CLASSIC;

    fn node(v: u8) -> NodeId {
        NodeId::new(v).unwrap()
    }

    fn message_id(priority: Priority, subject: u16) -> FrameId {
        FrameId::message(priority, PortId(subject), Some(node(46))).unwrap()
    }

    /// Drain everything sendable, collecting frames.
    fn drain_all(queue: &mut TxQueue, arena: &mut dyn Arena, now: Microseconds) -> Vec<Frame> {
        let mut sent = Vec::new();
        queue
            .drain::<()>(arena, now, |frame| {
                sent.push(frame.clone());
                Ok(true)
            })
            .unwrap();
        sent
    }

    #[test]
    fn test_priority_orders_drain() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        queue
            .push(&mut arena, message_id(Priority::Low, 10), TransferId::new(0), b"low", None)
            .unwrap();
        queue
            .push(&mut arena, message_id(Priority::Fast, 11), TransferId::new(0), b"fast", None)
            .unwrap();
        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 12),
                TransferId::new(0),
                b"nom",
                None,
            )
            .unwrap();

        let sent = drain_all(&mut queue, &mut arena, 0);
        let subjects: Vec<u16> = sent.iter().map(|f| f.id.port.get()).collect();
        assert_eq!(subjects, vec![11, 12, 10]);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        for subject in [20u16, 21, 22] {
            queue
                .push(
                    &mut arena,
                    message_id(Priority::Nominal, subject),
                    TransferId::new(0),
                    b"x",
                    None,
                )
                .unwrap();
        }

        let sent = drain_all(&mut queue, &mut arena, 0);
        let subjects: Vec<u16> = sent.iter().map(|f| f.id.port.get()).collect();
        assert_eq!(subjects, vec![20, 21, 22]);
    }

    #[test]
    fn test_earlier_deadline_first_within_priority() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 30),
                TransferId::new(0),
                b"later",
                Some(2_000_000),
            )
            .unwrap();
        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 31),
                TransferId::new(0),
                b"sooner",
                Some(1_000_000),
            )
            .unwrap();
        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 32),
                TransferId::new(0),
                b"unlimited",
                None,
            )
            .unwrap();

        let sent = drain_all(&mut queue, &mut arena, 0);
        let subjects: Vec<u16> = sent.iter().map(|f| f.id.port.get()).collect();
        assert_eq!(subjects, vec![31, 30, 32]);
    }

    #[test]
    fn test_expired_frames_never_sent() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 40),
                TransferId::new(0),
                b"stale",
                Some(500),
            )
            .unwrap();
        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 41),
                TransferId::new(0),
                b"fresh",
                Some(10_000),
            )
            .unwrap();

        let mut sent = Vec::new();
        let stats = queue
            .drain::<()>(&mut arena, 1_000, |frame| {
                sent.push(frame.id.port.get());
                Ok(true)
            })
            .unwrap();

        assert_eq!(stats.expired, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(sent, vec![41]);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_deadline_exactly_now_is_expired() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);
        queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 42),
                TransferId::new(0),
                b"edge",
                Some(1_000),
            )
            .unwrap();

        let stats = queue
            .drain::<()>(&mut arena, 1_000, |_| panic!("must not send expired frame"))
            .unwrap();
        assert_eq!(stats.expired, 1);
    }

    #[test]
    fn test_busy_media_stops_drain_and_keeps_head() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);
        queue
            .push(&mut arena, message_id(Priority::Nominal, 50), TransferId::new(0), b"a", None)
            .unwrap();
        queue
            .push(&mut arena, message_id(Priority::Nominal, 51), TransferId::new(0), b"b", None)
            .unwrap();

        let stats = queue.drain::<()>(&mut arena, 0, |_| Ok(false)).unwrap();
        assert_eq!(stats, DrainStats::default());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap().frame.id.port.get(), 50);

        // Next pass with a willing media resumes in order.
        let sent = drain_all(&mut queue, &mut arena, 0);
        assert_eq!(sent[0].id.port.get(), 50);
    }

    #[test]
    fn test_multi_frame_push_enqueues_all_frames() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        let payload = [0xEEu8; 20];
        let count = queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 60),
                TransferId::new(7),
                &payload,
                None,
            )
            .unwrap();
        assert_eq!(count, 4); // 20 + 2 CRC over 7-byte windows
        assert_eq!(queue.len(), 4);

        let sent = drain_all(&mut queue, &mut arena, 0);
        assert!(sent[0].tail().start);
        assert!(sent.last().unwrap().tail().end);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_queue_full_is_clean_failure() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(2, MTU_CLASSIC);

        queue
            .push(&mut arena, message_id(Priority::Nominal, 70), TransferId::new(0), b"a", None)
            .unwrap();
        queue
            .push(&mut arena, message_id(Priority::Nominal, 71), TransferId::new(0), b"b", None)
            .unwrap();

        let used_before = arena.used();
        let err = queue
            .push(&mut arena, message_id(Priority::Nominal, 72), TransferId::new(0), b"c", None)
            .unwrap_err();
        assert_eq!(err, TxPushError::QueueFull { capacity: 2 });
        assert_eq!(queue.len(), 2);
        assert_eq!(arena.used(), used_before);

        // Existing items drain unchanged and in order.
        let sent = drain_all(&mut queue, &mut arena, 0);
        let subjects: Vec<u16> = sent.iter().map(|f| f.id.port.get()).collect();
        assert_eq!(subjects, vec![70, 71]);
    }

    #[test]
    fn test_arena_exhaustion_rolls_back() {
        // Two allocations allowed: a three-frame transfer must fail and
        // refund the two buffers it already took.
        let mut arena = FaultArena::new(4096, 2);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);

        let payload = [1u8; 15]; // 15 + 2 CRC → 3 frames
        let err = queue
            .push(
                &mut arena,
                message_id(Priority::Nominal, 80),
                TransferId::new(0),
                &payload,
                None,
            )
            .unwrap_err();
        assert_eq!(err, TxPushError::OutOfMemory);
        assert_eq!(queue.len(), 0);
        assert_eq!(arena.used(), 0);
    }

    #[test]
    fn test_anonymous_multi_frame_rejected() {
        let mut arena = FixedArena::new(1024);
        let mut queue = TxQueue::new(16, MTU_CLASSIC);
        let id = FrameId::message(Priority::Nominal, PortId(90), None).unwrap();

        let err = queue
            .push(&mut arena, id, TransferId::new(0), &[0u8; 32], None)
            .unwrap_err();
        assert_eq!(err, TxPushError::AnonymousMultiFrame);

        // A fitting anonymous message is fine.
        queue
            .push(&mut arena, id, TransferId::new(0), &[0u8; 7], None)
            .unwrap();
        assert_eq!(queue.len(), 1);
    }
}

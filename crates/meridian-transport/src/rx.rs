//! Inbound frame-to-transfer reassembly.
//!
//! Frames arrive in arbitrary order across redundant links, possibly
//! duplicated or truncated. The reassembler accepts one frame at a time,
//! keyed into per-(source, kind, port) sessions, and emits a completed
//! [`Transfer`] when a sequence closes. State is bounded three ways:
//! subscriptions declare a payload extent, the session table has a fixed
//! slot count with oldest-inactive eviction, and sessions idle past the
//! transfer-id timeout are purged with their buffers released.
//!
//! Deduplication is intentionally basic: within the timeout window a
//! repeated transfer id for a session contributes nothing. Frames of the
//! same transfer interleaved from two links are not merged; the later
//! copy restarts the session.

use std::collections::HashMap;

use tracing::{debug, trace};

use meridian_core::crc::transfer_crc;
use meridian_core::{
    Frame, FrameId, Microseconds, NodeId, PortId, Tail, Transfer, TransferId, TransferKind,
    DEFAULT_TRANSFER_ID_TIMEOUT, TRANSFER_CRC_SIZE,
};

use crate::arena::Arena;

/// Reportable reassembly failures. Everything else (wire noise, toggle
/// discontinuities, unsubscribed ports, duplicates) is discarded silently.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RxError {
    #[error("arena exhausted during reassembly")]
    OutOfMemory,
    #[error("transfer payload exceeds declared extent of {extent} bytes")]
    ExtentExceeded { extent: usize },
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    extent: usize,
    tid_timeout: Microseconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SessionKey {
    source: NodeId,
    kind: TransferKind,
    port: PortId,
}

#[derive(Debug)]
struct Session {
    transfer_id: TransferId,
    expected_toggle: bool,
    /// Accumulation buffer while a multi-frame transfer is in progress.
    payload: Option<Vec<u8>>,
    started_at: Microseconds,
    last_activity: Microseconds,
}

impl Session {
    fn new(transfer_id: TransferId, timestamp: Microseconds) -> Self {
        Self {
            transfer_id,
            expected_toggle: true,
            payload: None,
            started_at: timestamp,
            last_activity: timestamp,
        }
    }
}

/// Reassembles inbound frames into transfers.
pub struct RxReassembler {
    local: Option<NodeId>,
    subscriptions: HashMap<(TransferKind, PortId), Subscription>,
    sessions: HashMap<SessionKey, Session>,
    max_sessions: usize,
}

impl RxReassembler {
    /// `local` filters service frames: requests and responses addressed to
    /// any other node are ignored. `max_sessions` bounds concurrent
    /// reassembly state.
    pub fn new(local: Option<NodeId>, max_sessions: usize) -> Self {
        assert!(max_sessions > 0, "session table needs at least one slot");
        Self {
            local,
            subscriptions: HashMap::new(),
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Declare interest in a port. `extent` bounds the completed payload
    /// size; `tid_timeout` bounds both the dedup window and session
    /// inactivity. Re-subscribing replaces the previous declaration.
    pub fn subscribe(
        &mut self,
        kind: TransferKind,
        port: PortId,
        extent: usize,
        tid_timeout: Microseconds,
    ) {
        self.subscriptions.insert(
            (kind, port),
            Subscription {
                extent,
                tid_timeout,
            },
        );
    }

    /// Remove a subscription and discard any sessions reassembling on it.
    pub fn unsubscribe(&mut self, arena: &mut dyn Arena, kind: TransferKind, port: PortId) -> bool {
        let existed = self.subscriptions.remove(&(kind, port)).is_some();
        let dropped: Vec<SessionKey> = self
            .sessions
            .keys()
            .filter(|key| key.kind == kind && key.port == port)
            .copied()
            .collect();
        for key in dropped {
            self.remove_session(arena, key);
        }
        existed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accept one inbound frame.
    ///
    /// Returns `Ok(Some(transfer))` when the frame completes a transfer.
    /// The transfer's payload buffer is charged to the arena; the caller
    /// must release it once processing finishes.
    pub fn accept(
        &mut self,
        arena: &mut dyn Arena,
        frame: &Frame,
        timestamp: Microseconds,
    ) -> Result<Option<Transfer>, RxError> {
        let id = frame.id;
        let tail = frame.tail();
        let data = frame.data();

        let Some(sub) = self.subscriptions.get(&(id.kind, id.port)).copied() else {
            trace!(kind = %id.kind, port = %id.port, "frame on unsubscribed port ignored");
            return Ok(None);
        };

        if id.kind != TransferKind::Message && (self.local.is_none() || id.destination != self.local)
        {
            trace!(port = %id.port, "service frame for another node ignored");
            return Ok(None);
        }

        let Some(source) = id.source else {
            return self.accept_anonymous(arena, &id, tail, data, timestamp, &sub);
        };

        let key = SessionKey {
            source,
            kind: id.kind,
            port: id.port,
        };

        if tail.start {
            self.accept_start(arena, key, &id, tail, data, timestamp, &sub)
        } else {
            self.accept_continuation(arena, key, &id, tail, data, timestamp, &sub)
        }
    }

    /// Discard sessions with no frame activity inside their timeout
    /// window, releasing any partial buffers.
    pub fn purge(&mut self, arena: &mut dyn Arena, now: Microseconds) {
        let stale: Vec<SessionKey> = self
            .sessions
            .iter()
            .filter(|(key, sess)| {
                let timeout = self
                    .subscriptions
                    .get(&(key.kind, key.port))
                    .map(|sub| sub.tid_timeout)
                    .unwrap_or(DEFAULT_TRANSFER_ID_TIMEOUT);
                now.saturating_sub(sess.last_activity) >= timeout
            })
            .map(|(key, _)| *key)
            .collect();
        for key in stale {
            trace!(source = %key.source, port = %key.port, "stale session purged");
            self.remove_session(arena, key);
        }
    }

    fn accept_anonymous(
        &mut self,
        arena: &mut dyn Arena,
        id: &FrameId,
        tail: Tail,
        data: &[u8],
        timestamp: Microseconds,
        sub: &Subscription,
    ) -> Result<Option<Transfer>, RxError> {
        if !tail.is_single() || !tail.toggle {
            trace!(port = %id.port, "anonymous transfers must be single-frame");
            return Ok(None);
        }
        let payload = copy_bounded(arena, data, sub.extent)?;
        Ok(Some(make_transfer(id, tail.transfer_id, timestamp, payload)))
    }

    fn accept_start(
        &mut self,
        arena: &mut dyn Arena,
        key: SessionKey,
        id: &FrameId,
        tail: Tail,
        data: &[u8],
        timestamp: Microseconds,
        sub: &Subscription,
    ) -> Result<Option<Transfer>, RxError> {
        if !tail.toggle {
            trace!(source = %key.source, port = %key.port, "start frame with cleared toggle");
            return Ok(None);
        }

        if let Some(sess) = self.sessions.get_mut(&key) {
            let within_window = timestamp.saturating_sub(sess.last_activity) < sub.tid_timeout;
            if within_window && tail.transfer_id == sess.transfer_id {
                trace!(
                    source = %key.source,
                    port = %key.port,
                    transfer_id = %tail.transfer_id,
                    "duplicate transfer suppressed"
                );
                return Ok(None);
            }
            // A fresh start preempts whatever the session was doing.
            if let Some(buf) = sess.payload.take() {
                arena.release(buf);
            }
        } else {
            self.make_room(arena);
        }

        let sess = self
            .sessions
            .entry(key)
            .or_insert_with(|| Session::new(tail.transfer_id, timestamp));
        sess.transfer_id = tail.transfer_id;
        sess.started_at = timestamp;
        sess.last_activity = timestamp;

        if tail.end {
            // Single-frame fast path: complete without buffering state.
            sess.payload = None;
            let payload = copy_bounded(arena, data, sub.extent)?;
            return Ok(Some(make_transfer(id, tail.transfer_id, timestamp, payload)));
        }

        let limit = sub.extent + TRANSFER_CRC_SIZE;
        if data.len() > limit {
            self.remove_session(arena, key);
            return Err(RxError::ExtentExceeded { extent: sub.extent });
        }
        let Some(mut buf) = arena.try_alloc(limit) else {
            self.remove_session(arena, key);
            return Err(RxError::OutOfMemory);
        };
        buf.extend_from_slice(data);
        sess.payload = Some(buf);
        sess.expected_toggle = false;
        Ok(None)
    }

    fn accept_continuation(
        &mut self,
        arena: &mut dyn Arena,
        key: SessionKey,
        id: &FrameId,
        tail: Tail,
        data: &[u8],
        timestamp: Microseconds,
        sub: &Subscription,
    ) -> Result<Option<Transfer>, RxError> {
        let Some(sess) = self.sessions.get_mut(&key) else {
            trace!(source = %key.source, port = %key.port, "continuation without session dropped");
            return Ok(None);
        };
        let Some(current_len) = sess.payload.as_ref().map(Vec::len) else {
            trace!(source = %key.source, port = %key.port, "continuation outside a transfer dropped");
            return Ok(None);
        };

        if tail.transfer_id != sess.transfer_id || tail.toggle != sess.expected_toggle {
            if let Some(buf) = sess.payload.take() {
                arena.release(buf);
            }
            trace!(
                source = %key.source,
                port = %key.port,
                "toggle or transfer id discontinuity, session invalidated"
            );
            return Ok(None);
        }

        let limit = sub.extent + TRANSFER_CRC_SIZE;
        if current_len + data.len() > limit {
            if let Some(buf) = sess.payload.take() {
                arena.release(buf);
            }
            return Err(RxError::ExtentExceeded { extent: sub.extent });
        }

        let Some(buf) = sess.payload.as_mut() else {
            return Ok(None);
        };
        buf.extend_from_slice(data);
        sess.expected_toggle = !tail.toggle;
        sess.last_activity = timestamp;

        if !tail.end {
            return Ok(None);
        }

        let Some(mut payload) = sess.payload.take() else {
            return Ok(None);
        };
        if payload.len() < TRANSFER_CRC_SIZE {
            arena.release(payload);
            trace!(source = %key.source, port = %key.port, "short multi-frame transfer dropped");
            return Ok(None);
        }
        if transfer_crc(&payload) != 0 {
            arena.release(payload);
            debug!(source = %key.source, port = %key.port, "transfer CRC mismatch, transfer dropped");
            return Ok(None);
        }
        let stripped = payload.len() - TRANSFER_CRC_SIZE;
        payload.truncate(stripped);

        let started_at = sess.started_at;
        Ok(Some(make_transfer(
            id,
            sess.transfer_id,
            started_at,
            payload,
        )))
    }

    /// Evict the session with the oldest activity when the table is full.
    fn make_room(&mut self, arena: &mut dyn Arena) {
        if self.sessions.len() < self.max_sessions {
            return;
        }
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|(_, sess)| sess.last_activity)
            .map(|(key, _)| *key);
        if let Some(key) = oldest {
            debug!(source = %key.source, port = %key.port, "session table full, evicting oldest");
            self.remove_session(arena, key);
        }
    }

    fn remove_session(&mut self, arena: &mut dyn Arena, key: SessionKey) {
        if let Some(mut sess) = self.sessions.remove(&key) {
            if let Some(buf) = sess.payload.take() {
                arena.release(buf);
            }
        }
    }
}

/// Copy `data` into an arena buffer, enforcing the subscription extent.
fn copy_bounded(
    arena: &mut dyn Arena,
    data: &[u8],
    extent: usize,
) -> Result<Vec<u8>, RxError> {
    if data.len() > extent {
        return Err(RxError::ExtentExceeded { extent });
    }
    let Some(mut buf) = arena.try_alloc(data.len()) else {
        return Err(RxError::OutOfMemory);
    };
    buf.extend_from_slice(data);
    Ok(buf)
}

fn make_transfer(
    id: &FrameId,
    transfer_id: TransferId,
    timestamp: Microseconds,
    payload: Vec<u8>,
) -> Transfer {
    Transfer {
        kind: id.kind,
        priority: id.priority,
        port: id.port,
        source: id.source,
        destination: id.destination,
        transfer_id,
        timestamp,
        payload,
    }
}

//! The node context object and cooperative driver loop.
//!
//! One [`Node`] owns every piece of mutable protocol state: the arena,
//! the TX queue, the RX reassembler, the heartbeat publisher, and the
//! service registry. Each [`Node::step`] runs one non-blocking iteration:
//! emit a heartbeat if due, drain outbound frames, poll for one inbound
//! frame, and feed any completed transfer to the dispatcher. Nothing in
//! an iteration blocks; the empty-receive path is the loop's cooperative
//! yield point.
//!
//! Error discipline per taxonomy: transient conditions (media busy, queue
//! full) retry next iteration; resource exhaustion abandons the affected
//! transfer and continues; only a media error escapes, terminating the
//! loop.

use tracing::{debug, info, trace, warn};

use meridian_core::{
    FrameId, Microseconds, NodeId, Priority, Transfer, TransferKind,
    DEFAULT_TRANSFER_ID_TIMEOUT, SERVICE_NODE_INFO, SUBJECT_HEARTBEAT,
};
use meridian_media::Media;
use meridian_transport::{Arena, RxReassembler, TxQueue};

use crate::clock::Clock;
use crate::config::NodeConfig;
use crate::codec::{Heartbeat, HEARTBEAT_SIZE, INFO_REQUEST_EXTENT};
use crate::error::NodeError;
use crate::heartbeat::{HeartbeatPublisher, HEARTBEAT_TX_DEADLINE};
use crate::info::NodeInfo;
use crate::services::{NodeInfoService, ServiceRegistry};

/// Responses not on the wire within this budget of the request's receipt
/// are dropped rather than queued indefinitely.
pub const RESPONSE_TX_DEADLINE: Microseconds = 1_000_000;

/// How often stale reassembly sessions are swept.
const PURGE_INTERVAL: Microseconds = 1_000_000;

/// Event counters, exposed for observability and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeCounters {
    pub heartbeats_emitted: u64,
    pub frames_sent: u64,
    pub frames_expired: u64,
    pub tx_rejections: u64,
    pub rx_failures: u64,
    pub transfers_completed: u64,
    pub requests_answered: u64,
}

/// A Meridian node: protocol state machine plus driver loop.
pub struct Node<C: Clock, A: Arena> {
    id: NodeId,
    clock: C,
    arena: A,
    tx: TxQueue,
    rx: RxReassembler,
    heartbeat: HeartbeatPublisher,
    services: ServiceRegistry,
    counters: NodeCounters,
    last_purge: Microseconds,
}

impl<C: Clock, A: Arena> Node<C, A> {
    /// Build a node from configuration, wiring up the protocol-reserved
    /// subscriptions and the node information service.
    pub fn new(config: &NodeConfig, info: NodeInfo, clock: C, arena: A) -> Result<Self, NodeError> {
        let id = NodeId::new(config.node.id)
            .ok_or_else(|| NodeError::Config(format!("node id out of range: {}", config.node.id)))?;

        let mut rx = RxReassembler::new(Some(id), config.node.max_rx_sessions);
        rx.subscribe(
            TransferKind::Message,
            SUBJECT_HEARTBEAT,
            HEARTBEAT_SIZE,
            DEFAULT_TRANSFER_ID_TIMEOUT,
        );
        rx.subscribe(
            TransferKind::Request,
            SERVICE_NODE_INFO,
            INFO_REQUEST_EXTENT,
            DEFAULT_TRANSFER_ID_TIMEOUT,
        );

        let mut services = ServiceRegistry::new();
        services.register(SERVICE_NODE_INFO, Box::new(NodeInfoService::new(&info)));

        let now = clock.now();
        Ok(Self {
            id,
            clock,
            arena,
            tx: TxQueue::new(config.node.tx_queue_capacity, config.node.mtu),
            rx,
            heartbeat: HeartbeatPublisher::new(now),
            services,
            counters: NodeCounters::default(),
            last_purge: now,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn counters(&self) -> &NodeCounters {
        &self.counters
    }

    /// Bytes currently charged to the arena across TX and RX buffers.
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    /// Run one cooperative iteration against `media`.
    pub fn step<M: Media>(&mut self, media: &mut M) -> Result<(), NodeError> {
        let now = self.clock.now();

        if self.heartbeat.due(now) {
            self.emit_heartbeat(now);
        }

        let stats = self
            .tx
            .drain(&mut self.arena, now, |frame| media.send(frame, 0))?;
        self.counters.frames_sent += stats.sent as u64;
        self.counters.frames_expired += stats.expired as u64;
        if stats.expired > 0 {
            warn!(expired = stats.expired, "dropped frames past their deadline");
        }

        if now.saturating_sub(self.last_purge) >= PURGE_INTERVAL {
            self.rx.purge(&mut self.arena, now);
            self.last_purge = now;
        }

        // Zero-timeout poll: no frame ends the iteration.
        let Some(frame) = media.receive(0)? else {
            return Ok(());
        };

        let timestamp = self.clock.now();
        match self.rx.accept(&mut self.arena, &frame, timestamp) {
            Ok(Some(transfer)) => self.process_transfer(transfer),
            Ok(None) => {}
            Err(e) => {
                self.counters.rx_failures += 1;
                warn!(error = %e, "inbound transfer abandoned");
            }
        }
        Ok(())
    }

    /// Drive [`Self::step`] until a fatal media error.
    pub fn run<M: Media>(&mut self, media: &mut M) -> Result<(), NodeError> {
        info!(node = %self.id, media = media.name(), "entering node loop");
        loop {
            self.step(media)?;
            // Cooperative yield; the loop never blocks on the media.
            std::thread::yield_now();
        }
    }

    fn emit_heartbeat(&mut self, now: Microseconds) {
        let (heartbeat, tid) = self.heartbeat.emit(now);
        let Ok(id) = FrameId::message(Priority::Nominal, SUBJECT_HEARTBEAT, Some(self.id)) else {
            debug_assert!(false, "heartbeat identifier is statically valid");
            return;
        };

        let deadline = Some(now + HEARTBEAT_TX_DEADLINE);
        match self
            .tx
            .push(&mut self.arena, id, tid, &heartbeat.serialize(), deadline)
        {
            Ok(_) => {
                self.counters.heartbeats_emitted += 1;
                trace!(uptime = heartbeat.uptime_seconds, transfer_id = %tid, "heartbeat enqueued");
            }
            Err(e) => {
                self.counters.tx_rejections += 1;
                warn!(error = %e, "heartbeat dropped");
            }
        }
    }

    fn process_transfer(&mut self, transfer: Transfer) {
        self.counters.transfers_completed += 1;
        match transfer.kind {
            TransferKind::Request => self.answer_request(&transfer),
            TransferKind::Message => {
                if transfer.port == SUBJECT_HEARTBEAT {
                    match Heartbeat::parse(&transfer.payload) {
                        Ok(hb) => debug!(
                            source = ?transfer.source,
                            uptime = hb.uptime_seconds,
                            health = ?hb.health,
                            "peer heartbeat"
                        ),
                        Err(e) => trace!(error = %e, "undecodable heartbeat ignored"),
                    }
                }
            }
            TransferKind::Response => {
                trace!(port = %transfer.port, "unsolicited response ignored");
            }
        }
        // Processing done; the payload goes back to the arena.
        self.arena.release(transfer.payload);
    }

    fn answer_request(&mut self, request: &Transfer) {
        let Some(payload) = self.services.dispatch(request) else {
            return;
        };
        let Some(requester) = request.source else {
            trace!(port = %request.port, "request without a source cannot be answered");
            return;
        };
        let Ok(id) = FrameId::response(request.priority, request.port, self.id, requester) else {
            debug_assert!(false, "response identifier mirrors a parsed request");
            return;
        };

        // Bounded latency: the response ships within the window anchored
        // at the request's receipt or not at all.
        let deadline = Some(request.timestamp + RESPONSE_TX_DEADLINE);
        match self
            .tx
            .push(&mut self.arena, id, request.transfer_id, &payload, deadline)
        {
            Ok(_) => {
                self.counters.requests_answered += 1;
                debug!(port = %request.port, requester = %requester, "response enqueued");
            }
            Err(e) => {
                self.counters.tx_rejections += 1;
                warn!(error = %e, port = %request.port, "response dropped");
            }
        }
    }
}

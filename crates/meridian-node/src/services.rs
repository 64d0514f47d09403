//! Stateless service dispatch.
//!
//! Completed inbound requests addressed to the local node are looked up by
//! service id in a handler registry. Handlers are idempotent and
//! side-effect-free: they map a request to an optional response payload
//! and nothing else. Unknown service ids go unanswered by protocol
//! convention.

use std::collections::HashMap;

use tracing::trace;

use meridian_core::{PortId, Transfer};

use crate::codec::serialize_info;
use crate::info::NodeInfo;

/// A request handler bound to one service id.
pub trait ServiceHandler {
    /// Produce the response payload, or `None` to leave the request
    /// unanswered.
    fn handle(&mut self, request: &Transfer) -> Option<Vec<u8>>;
}

/// Maps service ids to handlers.
#[derive(Default)]
pub struct ServiceRegistry {
    handlers: HashMap<PortId, Box<dyn ServiceHandler>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one on the same id.
    pub fn register(&mut self, service: PortId, handler: Box<dyn ServiceHandler>) {
        self.handlers.insert(service, handler);
    }

    pub fn is_registered(&self, service: PortId) -> bool {
        self.handlers.contains_key(&service)
    }

    /// Dispatch a completed request transfer. `None` for unknown ids.
    pub fn dispatch(&mut self, request: &Transfer) -> Option<Vec<u8>> {
        match self.handlers.get_mut(&request.port) {
            Some(handler) => handler.handle(request),
            None => {
                trace!(port = %request.port, "request on unhandled service ignored");
                None
            }
        }
    }
}

/// Serves the static node identity.
pub struct NodeInfoService {
    response: Vec<u8>,
}

impl NodeInfoService {
    /// The response is fixed for the node's lifetime, so it is serialized
    /// once up front.
    pub fn new(info: &NodeInfo) -> Self {
        Self {
            response: serialize_info(info),
        }
    }
}

impl ServiceHandler for NodeInfoService {
    fn handle(&mut self, _request: &Transfer) -> Option<Vec<u8>> {
        // The request payload is empty; nothing to deserialize.
        Some(self.response.clone())
    }
}

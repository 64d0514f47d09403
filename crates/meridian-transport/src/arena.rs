//! Bounded buffer arena.
//!
//! Every payload buffer the TX queue and the RX reassembler hold is
//! charged against an arena with a fixed byte budget, so total memory use
//! is bounded no matter what arrives on the wire. The arena is an injected
//! trait rather than a global allocator hook, which lets tests substitute
//! a fault-injecting implementation to exercise exhaustion paths.
//!
//! Accounting invariant: buffers handed out by `try_alloc` are never grown
//! past their initial capacity, so releasing by capacity refunds exactly
//! what was charged.

/// A bounded, constant-time buffer source.
pub trait Arena {
    /// Obtain an empty buffer with capacity for `len` bytes, or `None` if
    /// the budget is exhausted.
    fn try_alloc(&mut self, len: usize) -> Option<Vec<u8>>;

    /// Return a buffer's bytes to the budget.
    fn release(&mut self, buf: Vec<u8>);

    /// Bytes currently charged.
    fn used(&self) -> usize;
}

/// Byte-budget arena over a fixed capacity.
#[derive(Debug)]
pub struct FixedArena {
    capacity: usize,
    used: usize,
}

impl FixedArena {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Arena for FixedArena {
    fn try_alloc(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.used.saturating_add(len) > self.capacity {
            return None;
        }
        let buf = Vec::with_capacity(len);
        self.used += buf.capacity();
        Some(buf)
    }

    fn release(&mut self, buf: Vec<u8>) {
        self.used = self.used.saturating_sub(buf.capacity());
    }

    fn used(&self) -> usize {
        self.used
    }
}

/// Arena that starts failing after a set number of successful allocations.
///
/// Test helper for exhaustion paths; delegates accounting to an inner
/// [`FixedArena`].
#[derive(Debug)]
pub struct FaultArena {
    inner: FixedArena,
    allocs_before_failure: usize,
    allocs: usize,
}

impl FaultArena {
    pub fn new(capacity: usize, allocs_before_failure: usize) -> Self {
        Self {
            inner: FixedArena::new(capacity),
            allocs_before_failure,
            allocs: 0,
        }
    }
}

impl Arena for FaultArena {
    fn try_alloc(&mut self, len: usize) -> Option<Vec<u8>> {
        if self.allocs >= self.allocs_before_failure {
            return None;
        }
        let buf = self.inner.try_alloc(len)?;
        self.allocs += 1;
        Some(buf)
    }

    fn release(&mut self, buf: Vec<u8>) {
        self.inner.release(buf);
    }

    fn used(&self) -> usize {
        self.inner.used()
    }
}

use std::collections::VecDeque;
use tracing::warn;

/// FIFO of commands still waiting for their reply.
///
/// Unbounded unless a capacity is set. With a capacity, pushing onto a full
/// queue evicts the oldest entry; the evicted command will never be paired.
#[derive(Debug, Clone)]
pub struct PendingCommandQueue<C> {
    pending: VecDeque<C>,
    capacity: Option<usize>,
    evicted: u64,
}

impl<C> Default for PendingCommandQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PendingCommandQueue<C> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: None,
            evicted: 0,
        }
    }

    /// Create a queue that keeps at most `capacity` pending commands.
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            evicted: 0,
        }
    }

    pub fn push(&mut self, command: C) {
        if let Some(cap) = self.capacity {
            while self.pending.len() >= cap {
                self.pending.pop_front();
                self.evicted += 1;
                warn!(
                    "Pending command queue full ({} entries), evicted oldest command",
                    cap
                );
            }
        }
        self.pending.push_back(command);
    }

    /// Take the oldest pending command, if any.
    pub fn pop(&mut self) -> Option<C> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of commands dropped because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Discard every pending command.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

//! Bounded priority queue for audio awaiting transmission.
//!
//! Three FIFO tiers drained high to low. When the queue is full the
//! oldest entry of the lowest-priority non-empty tier is evicted, so
//! fresh speech audio survives a long outage at the cost of stale
//! backlog.

use std::collections::VecDeque;
use std::time::Instant;

/// Transmission priority for a queued payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessagePriority {
    Low,
    Normal,
    High,
}

/// A payload parked while the link is down.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub payload: Vec<u8>,
    pub priority: MessagePriority,
    pub enqueued_at: Instant,
}

impl QueuedMessage {
    pub fn new(payload: Vec<u8>, priority: MessagePriority) -> Self {
        Self {
            payload,
            priority,
            enqueued_at: Instant::now(),
        }
    }

    /// Copy of this message demoted to [`MessagePriority::Low`].
    pub fn demoted(mut self) -> Self {
        self.priority = MessagePriority::Low;
        self
    }
}

/// Bounded three-tier FIFO. Total length across tiers never exceeds capacity.
#[derive(Debug)]
pub struct PriorityQueue {
    high: VecDeque<QueuedMessage>,
    normal: VecDeque<QueuedMessage>,
    low: VecDeque<QueuedMessage>,
    capacity: usize,
}

impl PriorityQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
            low: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues a message, evicting to make room when full.
    ///
    /// Returns the evicted message, if any. Eviction takes the oldest
    /// entry from the lowest-priority non-empty tier; a High push into
    /// a queue full of High messages evicts the oldest High message.
    pub fn push(&mut self, message: QueuedMessage) -> Option<QueuedMessage> {
        let evicted = if self.len() >= self.capacity {
            self.evict_lowest()
        } else {
            None
        };
        self.tier_mut(message.priority).push_back(message);
        evicted
    }

    /// Dequeues the next message: High before Normal before Low, FIFO
    /// within a tier.
    pub fn pop(&mut self) -> Option<QueuedMessage> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
    }

    fn evict_lowest(&mut self) -> Option<QueuedMessage> {
        self.low
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.high.pop_front())
    }

    fn tier_mut(&mut self, priority: MessagePriority) -> &mut VecDeque<QueuedMessage> {
        match priority {
            MessagePriority::High => &mut self.high,
            MessagePriority::Normal => &mut self.normal,
            MessagePriority::Low => &mut self.low,
        }
    }
}

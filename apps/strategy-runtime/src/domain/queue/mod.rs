//! Event Queue
//!
//! Unbounded multi-producer, single-consumer FIFO that hands work from feed
//! threads to the strategy thread.
//!
//! # Ordering
//!
//! Each producer's pushes are observed by the consumer in the order they were
//! made. Pushes from different producers interleave in arrival order.
//!
//! # Blocking
//!
//! Producers only take the internal lock long enough to append; they never
//! wait for capacity. The consumer blocks in [`EventQueue::pop_blocking`]
//! until an item arrives. The lock is released before the popped item is
//! returned, so whatever the consumer does with it may push back into the
//! same queue.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

/// Thread-safe unbounded FIFO queue.
pub struct EventQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> EventQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake the consumer.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Remove the oldest item, waiting for one if the queue is empty.
    pub fn pop_blocking(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.available.wait(&mut items);
        }
    }

    /// Remove the oldest item if there is one.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Bounded message buffer shared by producers and the dispatcher.
//!
//! # Overflow
//! When full, the oldest entry is evicted to admit the newest. `push` never
//! blocks on the drainer and never fails; the internal lock is held only for
//! the `VecDeque` mutation itself.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use logtap_core::metrics as names;
use logtap_core::types::LogMessage;

/// Result of [`MessageBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without eviction.
    Accepted,
    /// Stored after evicting the oldest entry.
    Evicted,
    /// Blank message, ignored.
    Discarded,
}

/// Fixed-capacity FIFO of captured messages.
///
/// Safe for any number of concurrent producers and a single drainer.
#[derive(Debug)]
pub struct MessageBuffer {
    queue: Mutex<VecDeque<LogMessage>>,
    capacity: usize,
    /// Entries evicted by overflow.
    evicted: AtomicU64,
    /// Non-blank entries ever pushed.
    received: AtomicU64,
}

impl MessageBuffer {
    /// Creates a buffer holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
            evicted: AtomicU64::new(0),
            received: AtomicU64::new(0),
        }
    }

    /// Enqueues a message, evicting the oldest one if the buffer is full.
    ///
    /// Empty and whitespace-only messages are discarded and not counted.
    pub fn push(&self, message: LogMessage) -> PushOutcome {
        if message.is_blank() {
            return PushOutcome::Discarded;
        }

        let outcome = {
            let mut queue = self.lock();
            let outcome = if queue.len() >= self.capacity {
                queue.pop_front();
                PushOutcome::Evicted
            } else {
                PushOutcome::Accepted
            };
            queue.push_back(message);
            metrics::gauge!(names::BUFFER_LEN).set(queue.len() as f64);
            outcome
        };

        self.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::MESSAGES_CAPTURED_TOTAL).increment(1);
        if outcome == PushOutcome::Evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(names::MESSAGES_EVICTED_TOTAL).increment(1);
        }
        outcome
    }

    /// Removes and returns every buffered message, oldest first.
    pub fn drain_all(&self) -> Vec<LogMessage> {
        let drained: Vec<LogMessage> = self.lock().drain(..).collect();
        metrics::gauge!(names::BUFFER_LEN).set(0.0);
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Messages evicted by overflow so far.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Non-blank messages pushed so far.
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Fill ratio in `0.0..=1.0`.
    pub fn utilization(&self) -> f64 {
        let len = self.len();
        f64::from(u32::try_from(len).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }

    // A producer that panicked mid-push cannot leave the deque inconsistent,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogMessage>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

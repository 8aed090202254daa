//! Bounded replay log for late joiners

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use crate::error::{BroadcasterError, Result};
use crate::events::ChatEvent;

/// Fixed-capacity ring of recent chat events.
///
/// Appending to a full buffer overwrites the oldest entry, so the buffer
/// never grows past its capacity and eviction is FIFO.
pub struct HistoryBuffer {
    ring: HeapRb<ChatEvent>,
}

impl HistoryBuffer {
    /// Create a buffer holding at most `capacity` events (must be at least 1)
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BroadcasterError::InvalidConfig(
                "history capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            ring: HeapRb::new(capacity),
        })
    }

    /// Append an event, returning the evicted one if the buffer was full
    pub fn append(&mut self, event: ChatEvent) -> Option<ChatEvent> {
        self.ring.push_overwrite(event)
    }

    /// Owned copy of the retained events, oldest first
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.ring.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }
}

//! Chunk accumulation for one recording

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Collects encoded audio chunks while a clip is being recorded.
///
/// Cloned into the capture backend, which pushes from its own thread. Once
/// `max_bytes` is reached further chunks are dropped, so one clip can never
/// outgrow what the transport accepts.
#[derive(Clone, Debug)]
pub struct ChunkSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    bytes: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
    max_bytes: usize,
}

impl ChunkSink {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            chunks: Arc::new(Mutex::new(Vec::new())),
            bytes: Arc::new(AtomicUsize::new(0)),
            dropped: Arc::new(AtomicUsize::new(0)),
            max_bytes,
        }
    }

    /// Append one chunk. Empty chunks are ignored.
    ///
    /// Returns false if the chunk was dropped for exceeding the clip limit.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        if chunk.is_empty() {
            return true;
        }

        let mut chunks = self.chunks.lock();
        let total = self.bytes.load(Ordering::Relaxed);
        if total + chunk.len() > self.max_bytes {
            self.dropped.fetch_add(chunk.len(), Ordering::Relaxed);
            return false;
        }
        self.bytes.fetch_add(chunk.len(), Ordering::Relaxed);
        chunks.push(chunk);
        true
    }

    /// Number of chunks collected
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// Bytes collected so far
    pub fn total_bytes(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Bytes rejected by the clip limit
    pub fn dropped_bytes(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Concatenate everything collected, in push order, and reset
    pub fn take_payload(&self) -> Vec<u8> {
        let chunks = std::mem::take(&mut *self.chunks.lock());
        self.bytes.store(0, Ordering::Relaxed);
        chunks.concat()
    }
}

//! Bounded FIFO of audio chunks waiting for the decoder sink.
//!
//! Capacity is fixed up front in both chunks and bytes. When a new chunk does
//! not fit, the oldest chunks are evicted: an audible glitch is preferred over
//! unbounded memory growth behind a slow sink.

use super::chunk::AudioChunk;
use std::collections::VecDeque;

/// Default queue depth in chunks (~50 s of 200 ms recorder slices).
pub const DEFAULT_MAX_CHUNKS: usize = 256;

/// Default queue budget in bytes.
pub const DEFAULT_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Capacity limits for a [`ChunkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    pub max_chunks: usize,
    pub max_bytes: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug)]
pub struct ChunkQueue {
    chunks: VecDeque<AudioChunk>,
    bytes: usize,
    limits: QueueLimits,
}

impl ChunkQueue {
    pub fn new(limits: QueueLimits) -> Self {
        let limits = QueueLimits {
            max_chunks: limits.max_chunks.max(1),
            max_bytes: limits.max_bytes.max(1),
        };
        Self {
            chunks: VecDeque::with_capacity(limits.max_chunks),
            bytes: 0,
            limits,
        }
    }

    /// Append to the tail, evicting from the head until the chunk fits.
    ///
    /// Returns the number of chunks evicted. A chunk larger than the whole
    /// byte budget is still kept once everything older is gone.
    pub fn enqueue(&mut self, chunk: AudioChunk) -> usize {
        let mut evicted = 0;
        while !self.chunks.is_empty()
            && (self.chunks.len() >= self.limits.max_chunks
                || self.bytes + chunk.len() > self.limits.max_bytes)
        {
            self.pop_head();
            evicted += 1;
        }
        self.bytes += chunk.len();
        self.chunks.push_back(chunk);
        evicted
    }

    pub fn dequeue(&mut self) -> Option<AudioChunk> {
        self.pop_head()
    }

    /// Put a chunk back at the head after the sink refused it.
    pub fn requeue_front(&mut self, chunk: AudioChunk) {
        self.bytes += chunk.len();
        self.chunks.push_front(chunk);
    }

    /// Drop everything, returning how many chunks were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.chunks.len();
        self.chunks.clear();
        self.bytes = 0;
        dropped
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    fn pop_head(&mut self) -> Option<AudioChunk> {
        let chunk = self.chunks.pop_front()?;
        self.bytes -= chunk.len();
        Some(chunk)
    }
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new(QueueLimits::default())
    }
}

//! Feeder loop between the chunk queue and the decoder sink
//!
//! Two states, Idle and Draining. Every trigger (a chunk arriving on an empty
//! queue, the sink announcing readiness, a new sink being built) funnels into
//! one `drain` call that hands over chunks while the sink says it is ready.
//! The sink never sees two overlapping `accept` calls and never sees chunks
//! out of arrival order.

use super::chunk::{AudioChunk, StreamMeta};
use super::queue::{ChunkQueue, QueueLimits};
use super::sink::{CodecError, DecoderSink, ReadyNotifier, SinkError, SinkFactory};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Draining,
}

/// What the listener should be told about playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    /// No codec announced yet; chunks are held back.
    AwaitingMeta,
    Playing { mime: String },
    /// The sink could not be built for this codec. Cannot play this stream.
    Unsupported { mime: String, reason: String },
    /// The sink broke while playing (output closed, decoder crashed).
    Failed { mime: String, reason: String },
    /// Session closed.
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeederStats {
    pub delivered: u64,
    /// Rejections recovered by requeueing at the head.
    pub rejected: u64,
    pub dropped_overflow: u64,
    /// Flushed on codec change or stream stop.
    pub dropped_stale: u64,
    /// Arrived while the codec was unsupported or after the sink failed.
    pub dropped_unplayable: u64,
}

pub struct Feeder<F: SinkFactory> {
    factory: F,
    notifier: ReadyNotifier,
    queue: ChunkQueue,
    sink: Option<F::Sink>,
    state: FeedState,
    playback: PlaybackState,
    stats: FeederStats,
}

impl<F: SinkFactory> Feeder<F> {
    /// `notifier` is handed to every sink the factory builds.
    pub fn new(factory: F, limits: QueueLimits, notifier: ReadyNotifier) -> Self {
        Self {
            factory,
            notifier,
            queue: ChunkQueue::new(limits),
            sink: None,
            state: FeedState::Idle,
            playback: PlaybackState::AwaitingMeta,
            stats: FeederStats::default(),
        }
    }

    /// Apply a stream announcement.
    ///
    /// The first announcement keeps whatever was queued while waiting. A codec
    /// change discards the old sink and the chunks encoded for it.
    pub fn on_meta(&mut self, meta: &StreamMeta) {
        let mime = meta.mime();
        match &self.playback {
            PlaybackState::Stopped => return,
            PlaybackState::Playing { mime: current }
            | PlaybackState::Unsupported { mime: current, .. }
                if current == mime =>
            {
                return;
            }
            PlaybackState::Playing { mime: current } => {
                let stale = self.queue.clear();
                self.stats.dropped_stale += stale as u64;
                log::info!(
                    "Codec changed from {} to {}, discarded {} stale chunks",
                    current,
                    mime,
                    stale
                );
            }
            _ => {}
        }
        self.sink = None;

        match self.factory.create(mime, self.notifier.clone()) {
            Ok(sink) => {
                log::info!("Decoder sink created for {}", mime);
                self.sink = Some(sink);
                self.playback = PlaybackState::Playing {
                    mime: mime.to_string(),
                };
                self.drain();
            }
            Err(CodecError::UnsupportedCodec { mime, reason }) => {
                log::warn!("Cannot play this stream ({}): {}", mime, reason);
                self.stats.dropped_unplayable += self.queue.clear() as u64;
                self.playback = PlaybackState::Unsupported { mime, reason };
            }
        }
    }

    /// Accept a chunk from the relay.
    pub fn on_chunk(&mut self, chunk: AudioChunk) {
        match self.playback {
            PlaybackState::Stopped => return,
            PlaybackState::Unsupported { .. } | PlaybackState::Failed { .. } => {
                self.stats.dropped_unplayable += 1;
                return;
            }
            _ => {}
        }

        // A non-empty queue means a drain is already waiting on the sink.
        let drain_pending = !self.queue.is_empty();
        let evicted = self.queue.enqueue(chunk);
        if evicted > 0 {
            self.stats.dropped_overflow += evicted as u64;
            log::warn!(
                "Playback queue full ({} chunks, {} bytes), dropped {} oldest",
                self.queue.len(),
                self.queue.bytes(),
                evicted
            );
        }
        if !drain_pending {
            self.drain();
        }
    }

    /// The sink announced it can take another chunk.
    pub fn on_ready(&mut self) {
        self.drain();
    }

    /// The broadcaster stopped. Release the sink and wait for a new announcement.
    pub fn stop_stream(&mut self) {
        if self.playback == PlaybackState::Stopped {
            return;
        }
        self.release();
        self.playback = PlaybackState::AwaitingMeta;
    }

    /// End of session. Later events are ignored.
    pub fn close(&mut self) {
        self.release();
        self.playback = PlaybackState::Stopped;
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn stats(&self) -> FeederStats {
        self.stats
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    fn release(&mut self) {
        self.sink = None;
        self.stats.dropped_stale += self.queue.clear() as u64;
        self.state = FeedState::Idle;
    }

    fn drain(&mut self) {
        if self.state == FeedState::Draining {
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        self.state = FeedState::Draining;

        let failure = loop {
            if let Some(reason) = sink.failure() {
                break Some(reason);
            }
            if !sink.is_ready() {
                break None;
            }
            let Some(chunk) = self.queue.dequeue() else {
                break None;
            };
            match sink.accept(chunk) {
                Ok(()) => self.stats.delivered += 1,
                Err(SinkError::RejectedChunk(chunk)) => {
                    log::debug!("Sink rejected a {} byte chunk, requeued", chunk.len());
                    self.queue.requeue_front(chunk);
                    self.stats.rejected += 1;
                    break sink.failure();
                }
            }
        };

        self.state = FeedState::Idle;
        if let Some(reason) = failure {
            self.fail(reason);
        }
    }

    fn fail(&mut self, reason: String) {
        let PlaybackState::Playing { mime } = &self.playback else {
            return;
        };
        let mime = mime.clone();
        log::error!("Playback of {} failed: {}", mime, reason);
        self.sink = None;
        self.stats.dropped_unplayable += self.queue.clear() as u64;
        self.playback = PlaybackState::Failed { mime, reason };
    }
}

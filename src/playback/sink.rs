//! Decoder sink capability consumed by the feeder.
//!
//! A sink takes one chunk at a time, reports busy while it works on it, and
//! calls its [`ReadyNotifier`] once it can take another.

use super::chunk::AudioChunk;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink was busy or in an error state; the chunk is handed back.
    #[error("Sink rejected chunk of {} bytes", .0.len())]
    RejectedChunk(AudioChunk),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unsupported codec: {mime} ({reason})")]
    UnsupportedCodec { mime: String, reason: String },
}

/// Handle a sink uses to announce it became ready for more input.
#[derive(Clone)]
pub struct ReadyNotifier(Arc<dyn Fn() + Send + Sync>);

impl ReadyNotifier {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Notifier that goes nowhere, for sinks driven by polling.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn notify(&self) {
        (self.0)()
    }
}

impl fmt::Debug for ReadyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReadyNotifier")
    }
}

/// Streaming decoder accepting one chunk at a time. Not re-entrant.
pub trait DecoderSink: Send {
    fn is_ready(&self) -> bool;

    /// Hand over one chunk. May fail even right after `is_ready()` said yes.
    fn accept(&mut self, chunk: AudioChunk) -> Result<(), SinkError>;

    /// Why the sink broke for good, if it did. A failed sink never becomes
    /// ready again.
    fn failure(&self) -> Option<String> {
        None
    }
}

impl<S: DecoderSink + ?Sized> DecoderSink for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn accept(&mut self, chunk: AudioChunk) -> Result<(), SinkError> {
        (**self).accept(chunk)
    }

    fn failure(&self) -> Option<String> {
        (**self).failure()
    }
}

/// Builds a sink for a given container/codec MIME type.
pub trait SinkFactory: Send {
    type Sink: DecoderSink;

    fn create(&mut self, mime: &str, notifier: ReadyNotifier) -> Result<Self::Sink, CodecError>;
}

//! Listener-side playback: bounded chunk queue, decoder sink and feeder loop

mod chunk;
mod feeder;
mod pipe_sink;
mod queue;
mod session;
mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use chunk::{AudioChunk, StreamMeta, DEFAULT_MIME_TYPE};
pub use feeder::{FeedState, Feeder, FeederStats, PlaybackState};
pub use pipe_sink::{PipeSink, PipeSinkFactory};
pub use queue::{ChunkQueue, QueueLimits, DEFAULT_MAX_BYTES, DEFAULT_MAX_CHUNKS};
pub use session::PlaybackSession;
pub use sink::{CodecError, DecoderSink, ReadyNotifier, SinkError, SinkFactory};

//! Scripted sink used by the playback tests.

use super::chunk::AudioChunk;
use super::sink::{CodecError, DecoderSink, ReadyNotifier, SinkError, SinkFactory};
use std::sync::{Arc, Mutex};

/// Everything the tests want to observe about the sinks a factory built.
#[derive(Default)]
pub struct Recorder {
    pub accepted: Vec<AudioChunk>,
    pub accepted_by: Vec<String>,
    pub busy: bool,
    pub reject_next: usize,
    pub overlapping_accepts: usize,
    pub created: Vec<String>,
    pub failure: Option<String>,
    pub notifier: Option<ReadyNotifier>,
}

pub type SharedRecorder = Arc<Mutex<Recorder>>;

impl Recorder {
    pub fn accepted_tags(&self) -> Vec<u8> {
        self.accepted.iter().map(|c| c.as_bytes()[0]).collect()
    }
}

/// Mark the in-flight chunk as decoded and fire the ready notification.
pub fn finish_current(recorder: &SharedRecorder) {
    let notifier = {
        let mut p = recorder.lock().unwrap();
        p.busy = false;
        p.notifier.clone()
    };
    if let Some(notifier) = notifier {
        notifier.notify();
    }
}

pub struct MockSink {
    mime: String,
    recorder: SharedRecorder,
}

impl DecoderSink for MockSink {
    fn is_ready(&self) -> bool {
        !self.recorder.lock().unwrap().busy
    }

    fn accept(&mut self, chunk: AudioChunk) -> Result<(), SinkError> {
        let mut p = self.recorder.lock().unwrap();
        if p.reject_next > 0 {
            p.reject_next -= 1;
            return Err(SinkError::RejectedChunk(chunk));
        }
        if p.busy {
            p.overlapping_accepts += 1;
            return Err(SinkError::RejectedChunk(chunk));
        }
        p.busy = true;
        p.accepted.push(chunk);
        p.accepted_by.push(self.mime.clone());
        Ok(())
    }

    fn failure(&self) -> Option<String> {
        self.recorder.lock().unwrap().failure.clone()
    }
}

pub struct MockFactory {
    recorder: SharedRecorder,
    unsupported: Vec<String>,
}

impl MockFactory {
    pub fn new() -> (Self, SharedRecorder) {
        let recorder = SharedRecorder::default();
        (
            Self {
                recorder: recorder.clone(),
                unsupported: Vec::new(),
            },
            recorder,
        )
    }

    pub fn rejecting(mut self, mime: &str) -> Self {
        self.unsupported.push(mime.to_string());
        self
    }
}

impl SinkFactory for MockFactory {
    type Sink = MockSink;

    fn create(&mut self, mime: &str, notifier: ReadyNotifier) -> Result<MockSink, CodecError> {
        if self.unsupported.iter().any(|m| m == mime) {
            return Err(CodecError::UnsupportedCodec {
                mime: mime.to_string(),
                reason: "not supported by mock".to_string(),
            });
        }
        let mut p = self.recorder.lock().unwrap();
        p.created.push(mime.to_string());
        p.busy = false;
        p.failure = None;
        p.notifier = Some(notifier);
        Ok(MockSink {
            mime: mime.to_string(),
            recorder: self.recorder.clone(),
        })
    }
}

pub fn chunk(tag: u8) -> AudioChunk {
    AudioChunk::from(vec![tag; 16])
}

//! Decoder sink that pipes the encoded stream into a byte writer.
//!
//! Runs a dedicated writer thread that owns the output (stdout, a file, the
//! stdin of an external player). The sink is busy from the moment a chunk is
//! handed over until the thread has written and flushed it, then it fires the
//! ready notification.

use super::chunk::AudioChunk;
use super::sink::{CodecError, DecoderSink, ReadyNotifier, SinkError, SinkFactory};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Output = Box<dyn Write + Send>;
type OpenOutput = Box<dyn FnMut() -> io::Result<Output> + Send>;

/// How long a new sink waits for the previous writer to flush its last chunk.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PipeSink {
    tx: Sender<AudioChunk>,
    busy: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
    /// Disconnects once the writer thread has exited.
    finished: Receiver<()>,
}

impl PipeSink {
    pub fn new(mut output: Output, notifier: ReadyNotifier) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<AudioChunk>(1);
        let (done_tx, finished) = crossbeam_channel::bounded::<()>(0);
        let busy = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));

        let busy_for_thread = Arc::clone(&busy);
        let failure_for_thread = Arc::clone(&failure);
        thread::spawn(move || {
            let _done = done_tx;
            // Ends when the sink (and with it the sender) is dropped.
            for chunk in rx {
                if let Err(e) = output
                    .write_all(chunk.as_bytes())
                    .and_then(|_| output.flush())
                {
                    log::error!("Failed to write audio output: {}", e);
                    if let Ok(mut failure) = failure_for_thread.lock() {
                        *failure = Some(format!("audio output failed: {}", e));
                    }
                    notifier.notify();
                    return;
                }
                busy_for_thread.store(false, Ordering::SeqCst);
                notifier.notify();
            }
        });

        Self {
            tx,
            busy,
            failure,
            finished,
        }
    }

    pub fn has_failed(&self) -> bool {
        self.failure().is_some()
    }
}

impl DecoderSink for PipeSink {
    fn is_ready(&self) -> bool {
        !self.busy.load(Ordering::SeqCst) && !self.has_failed()
    }

    fn accept(&mut self, chunk: AudioChunk) -> Result<(), SinkError> {
        if !self.is_ready() {
            return Err(SinkError::RejectedChunk(chunk));
        }
        self.busy.store(true, Ordering::SeqCst);
        match self.tx.try_send(chunk) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(chunk)) | Err(TrySendError::Disconnected(chunk)) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(SinkError::RejectedChunk(chunk))
            }
        }
    }

    fn failure(&self) -> Option<String> {
        match self.failure.lock() {
            Ok(failure) => failure.clone(),
            Err(_) => Some("audio writer panicked".to_string()),
        }
    }
}

/// Builds [`PipeSink`]s for `audio/*` streams.
pub struct PipeSinkFactory {
    open: OpenOutput,
    accepted_prefix: String,
    previous_writer: Option<Receiver<()>>,
}

impl PipeSinkFactory {
    pub fn new(open: impl FnMut() -> io::Result<Output> + Send + 'static) -> Self {
        Self {
            open: Box::new(open),
            accepted_prefix: "audio/".to_string(),
            previous_writer: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(|| Ok(Box::new(io::stdout()) as Output))
    }

    /// Each new sink truncates the file, so a codec change starts a fresh container.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || Ok(Box::new(File::create(&path)?) as Output))
    }

    /// Let the last sink's writer finish before its output is reopened.
    fn wait_for_previous_writer(&mut self) {
        let Some(finished) = self.previous_writer.take() else {
            return;
        };
        match finished.recv_timeout(WRITER_DRAIN_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Previous audio writer still busy, opening output anyway")
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }
}

impl SinkFactory for PipeSinkFactory {
    type Sink = PipeSink;

    fn create(&mut self, mime: &str, notifier: ReadyNotifier) -> Result<PipeSink, CodecError> {
        if !mime.to_ascii_lowercase().starts_with(&self.accepted_prefix) {
            return Err(CodecError::UnsupportedCodec {
                mime: mime.to_string(),
                reason: format!("only {}* streams can be piped", self.accepted_prefix),
            });
        }
        self.wait_for_previous_writer();
        let output = (self.open)().map_err(|e| CodecError::UnsupportedCodec {
            mime: mime.to_string(),
            reason: format!("cannot open output: {}", e),
        })?;
        let sink = PipeSink::new(output, notifier);
        self.previous_writer = Some(sink.finished.clone());
        Ok(sink)
    }
}

//! Per-listener playback session
//!
//! Owns one [`Feeder`] inside a dedicated tokio task. Relay events and sink
//! readiness notifications all arrive on the same command channel, so the
//! queue is only ever touched from that task. Dropping the handle ends the
//! task, which releases the sink and drops whatever was still queued.

use super::chunk::{AudioChunk, StreamMeta};
use super::feeder::{Feeder, FeederStats, PlaybackState};
use super::queue::QueueLimits;
use super::sink::{ReadyNotifier, SinkFactory};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug)]
enum SessionCmd {
    Meta(StreamMeta),
    Chunk(AudioChunk),
    Ready,
    StopStream,
    Shutdown,
}

/// Handle to a running playback session.
pub struct PlaybackSession {
    tx: mpsc::UnboundedSender<SessionCmd>,
    state_rx: watch::Receiver<PlaybackState>,
    stats_rx: watch::Receiver<FeederStats>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Start a session on the current tokio runtime.
    pub fn spawn<F>(factory: F, limits: QueueLimits) -> Self
    where
        F: SinkFactory + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        // Weak so a sink kept alive inside the task cannot keep the channel open.
        let weak = tx.downgrade();
        let notifier = ReadyNotifier::new(move || {
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(SessionCmd::Ready);
            }
        });

        let feeder = Feeder::new(factory, limits, notifier);
        let (state_tx, state_rx) = watch::channel(feeder.playback().clone());
        let (stats_tx, stats_rx) = watch::channel(feeder.stats());

        let task = tokio::spawn(session_main(feeder, rx, state_tx, stats_tx));

        Self {
            tx,
            state_rx,
            stats_rx,
            task: Some(task),
        }
    }

    pub fn meta(&self, meta: StreamMeta) {
        let _ = self.tx.send(SessionCmd::Meta(meta));
    }

    pub fn chunk(&self, chunk: impl Into<AudioChunk>) {
        let _ = self.tx.send(SessionCmd::Chunk(chunk.into()));
    }

    pub fn stop_stream(&self) {
        let _ = self.tx.send(SessionCmd::StopStream);
    }

    pub fn state(&self) -> PlaybackState {
        self.state_rx.borrow().clone()
    }

    /// Watch playback state changes (e.g. to surface "cannot play this stream").
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_rx.clone()
    }

    pub fn stats(&self) -> FeederStats {
        *self.stats_rx.borrow()
    }

    /// Stop the session and wait for the sink to be released.
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(SessionCmd::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Playback session task failed: {}", e);
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        let _ = self.tx.send(SessionCmd::Shutdown);
    }
}

async fn session_main<F: SinkFactory>(
    mut feeder: Feeder<F>,
    mut rx: mpsc::UnboundedReceiver<SessionCmd>,
    state_tx: watch::Sender<PlaybackState>,
    stats_tx: watch::Sender<FeederStats>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCmd::Meta(meta) => feeder.on_meta(&meta),
            SessionCmd::Chunk(chunk) => feeder.on_chunk(chunk),
            SessionCmd::Ready => feeder.on_ready(),
            SessionCmd::StopStream => feeder.stop_stream(),
            SessionCmd::Shutdown => break,
        }
        publish(&feeder, &state_tx, &stats_tx);
    }

    feeder.close();
    publish(&feeder, &state_tx, &stats_tx);
    log::debug!("Playback session closed: {:?}", feeder.stats());
}

fn publish<F: SinkFactory>(
    feeder: &Feeder<F>,
    state_tx: &watch::Sender<PlaybackState>,
    stats_tx: &watch::Sender<FeederStats>,
) {
    state_tx.send_if_modified(|state| {
        if state != feeder.playback() {
            *state = feeder.playback().clone();
            true
        } else {
            false
        }
    });
    stats_tx.send_if_modified(|stats| {
        let changed = *stats != feeder.stats();
        *stats = feeder.stats();
        changed
    });
}

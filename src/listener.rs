//! Native listener: connects to the relay and plays the stream through a
//! [`PlaybackSession`].
//!
//! A dropped connection is retried according to the [`ReconnectPolicy`]. The
//! session is told the stream stopped, so the announcement the relay replays
//! on rejoin sets up a fresh sink. A sink failure ends the listener with an
//! error.

use crate::config::ReconnectPolicy;
use crate::playback::{PlaybackSession, PlaybackState, QueueLimits, SinkFactory};
use crate::relay::ControlMessage;
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Interrupt = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Why one connection to the relay ended.
enum Disconnect {
    Interrupted,
    Lost(String),
    PlaybackFailed { mime: String, reason: String },
}

/// Listen to `url` until Ctrl-C, playback failure, or reconnecting gives up.
pub async fn listen<F>(
    url: &str,
    factory: F,
    limits: QueueLimits,
    reconnect: ReconnectPolicy,
) -> anyhow::Result<()>
where
    F: SinkFactory + 'static,
{
    let session = PlaybackSession::spawn(factory, limits);
    let mut state = session.subscribe_state();
    let mut interrupt: Interrupt = Box::pin(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    });

    let mut retries = 0u32;
    let result = loop {
        match tokio_tungstenite::connect_async(url).await {
            Ok((mut ws, _)) => {
                log::info!("Connected to {}", url);
                retries = 0;
                match pump(&mut ws, &session, &mut state, &mut interrupt).await {
                    Disconnect::Interrupted => {
                        log::info!("Interrupted");
                        break Ok(());
                    }
                    Disconnect::PlaybackFailed { mime, reason } => {
                        break Err(anyhow::anyhow!("Cannot play {}: {}", mime, reason));
                    }
                    Disconnect::Lost(reason) => {
                        log::warn!("Lost connection to {}: {}", url, reason);
                        session.stop_stream();
                    }
                }
            }
            Err(e) if retries >= reconnect.attempts => {
                break Err(anyhow::Error::new(e).context(format!("Failed to connect to {}", url)));
            }
            Err(e) => log::warn!("Failed to connect to {}: {}", url, e),
        }

        if retries >= reconnect.attempts {
            log::info!("Not reconnecting");
            break Ok(());
        }
        retries += 1;
        log::info!(
            "Reconnecting in {:?} (attempt {}/{})",
            reconnect.delay,
            retries,
            reconnect.attempts
        );
        tokio::select! {
            _ = tokio::time::sleep(reconnect.delay) => {}
            _ = &mut interrupt => break Ok(()),
        }
    };

    let stats = session.stats();
    session.shutdown().await;
    log::info!(
        "Delivered {} chunks ({} dropped on overflow, {} stale, {} unplayable)",
        stats.delivered,
        stats.dropped_overflow,
        stats.dropped_stale,
        stats.dropped_unplayable
    );
    result
}

/// Feed one connection into the session until it ends.
async fn pump(
    ws: &mut RelaySocket,
    session: &PlaybackSession,
    state: &mut watch::Receiver<PlaybackState>,
    interrupt: &mut Interrupt,
) -> Disconnect {
    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Binary(data))) => session.chunk(data),
                Some(Ok(Message::Text(text))) => handle_text(session, text.as_str()),
                Some(Ok(Message::Close(_))) | None => {
                    return Disconnect::Lost("server closed the connection".to_string())
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Disconnect::Lost(e.to_string()),
            },
            changed = state.changed() => {
                if changed.is_err() {
                    return Disconnect::Interrupted;
                }
                let current = state.borrow_and_update().clone();
                report(&current);
                if let PlaybackState::Failed { mime, reason } = current {
                    return Disconnect::PlaybackFailed { mime, reason };
                }
            },
            _ = &mut *interrupt => return Disconnect::Interrupted,
        }
    }
}

fn handle_text(session: &PlaybackSession, text: &str) {
    match ControlMessage::parse(text) {
        Ok(ControlMessage::AudioMeta(meta)) => session.meta(meta),
        Ok(ControlMessage::Chat(msg)) => {
            log::info!("[chat {}] {}: {}", msg.time.as_deref().unwrap_or("--"), msg.sender(), msg.text)
        }
        Ok(ControlMessage::StopStream) => {
            log::info!("Broadcast stopped");
            session.stop_stream();
        }
        Err(e) => log::warn!("Ignoring frame: {}", e),
    }
}

fn report(state: &PlaybackState) {
    match state {
        PlaybackState::AwaitingMeta => log::info!("Waiting for the broadcast to start"),
        PlaybackState::Playing { mime } => log::info!("Playing {}", mime),
        PlaybackState::Unsupported { mime, reason } => {
            log::error!("Cannot play this stream ({}): {}", mime, reason)
        }
        PlaybackState::Failed { mime, reason } => {
            log::error!("Playback of {} stopped: {}", mime, reason)
        }
        PlaybackState::Stopped => {}
    }
}

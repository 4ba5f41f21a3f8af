//! WebSocket endpoint for broadcasters and listeners
//!
//! Every connection is both: binary frames it sends are relayed as audio,
//! JSON text frames as stream announcements, chat or stop notices.

use super::hub::{ConnectionId, RelayFrame, RelayHub, RelayMessage, Subscription};
use super::protocol::ControlMessage;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;

/// Handles upgrade requests to `/ws`.
pub async fn handle_upgrade(ws: WebSocketUpgrade, State(hub): State<RelayHub>) -> Response {
    let limit = hub.max_frame_bytes();
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| serve_connection(socket, hub))
}

async fn serve_connection(mut socket: WebSocket, hub: RelayHub) {
    let Subscription {
        id,
        mut frames,
        current_meta,
    } = hub.subscribe();
    log::info!("New connection: {}", id);

    if let Some(meta) = current_meta {
        let text = ControlMessage::AudioMeta(meta).to_text();
        if socket.send(Message::Text(text.into())).await.is_err() {
            log::info!("Client disconnected: {}", id);
            return;
        }
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if !frame.is_for(id) {
                        continue;
                    }
                    if socket.send(encode(frame)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Connection {} fell behind, skipped {} frames", id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Binary(data))) => {
                    hub.publish(id, RelayMessage::Audio(data));
                }
                Some(Ok(Message::Text(text))) => handle_text(&hub, id, text.as_str()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Ping/pong is answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }

    log::info!("Client disconnected: {}", id);
}

fn handle_text(hub: &RelayHub, id: ConnectionId, text: &str) {
    match ControlMessage::parse(text) {
        Ok(ControlMessage::AudioMeta(meta)) => {
            log::info!("Connection {} announced stream {}", id, meta.mime());
            hub.publish(id, RelayMessage::Meta(meta));
        }
        Ok(ControlMessage::Chat(msg)) => {
            if msg.is_blank() {
                return;
            }
            hub.publish(id, RelayMessage::Chat(msg));
        }
        Ok(ControlMessage::StopStream) => {
            log::info!("Stream stopped by {}", id);
            hub.publish(id, RelayMessage::StopStream);
        }
        Err(e) => log::warn!("Ignoring frame from {}: {}", id, e),
    }
}

fn encode(frame: RelayFrame) -> Message {
    let control = match frame.message {
        RelayMessage::Audio(data) => return Message::Binary(data),
        RelayMessage::Meta(meta) => ControlMessage::AudioMeta(meta),
        RelayMessage::Chat(msg) => ControlMessage::Chat(msg),
        RelayMessage::StopStream => ControlMessage::StopStream,
    };
    Message::Text(control.to_text().into())
}

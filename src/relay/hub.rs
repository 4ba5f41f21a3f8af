//! Broadcast hub shared by every relay connection.
//!
//! Frames go out on a `tokio::sync::broadcast` channel. A connection that
//! falls behind loses the oldest frames instead of growing a backlog. The
//! latest stream announcement is kept in a `watch` so a listener that joins
//! mid-stream can build its decoder before the first chunk arrives.

use super::protocol::ChatMessage;
use crate::playback::StreamMeta;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

pub type ConnectionId = u64;

#[derive(Debug, Clone)]
pub enum RelayMessage {
    Audio(Bytes),
    Meta(StreamMeta),
    Chat(ChatMessage),
    StopStream,
}

impl RelayMessage {
    /// Chat and stop notices are echoed to their sender too.
    fn echoes_to_origin(&self) -> bool {
        matches!(self, RelayMessage::Chat(_) | RelayMessage::StopStream)
    }
}

#[derive(Debug, Clone)]
pub struct RelayFrame {
    pub origin: ConnectionId,
    pub message: RelayMessage,
}

impl RelayFrame {
    pub fn is_for(&self, conn: ConnectionId) -> bool {
        self.origin != conn || self.message.echoes_to_origin()
    }
}

/// A registered connection: its id, its feed, and the announcement in force
/// when it joined.
pub struct Subscription {
    pub id: ConnectionId,
    pub frames: broadcast::Receiver<RelayFrame>,
    pub current_meta: Option<StreamMeta>,
}

#[derive(Clone)]
pub struct RelayHub {
    tx: broadcast::Sender<RelayFrame>,
    meta: Arc<watch::Sender<Option<StreamMeta>>>,
    next_id: Arc<AtomicU64>,
    max_frame_bytes: usize,
}

impl RelayHub {
    pub fn new(capacity: usize, max_frame_bytes: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (meta, _) = watch::channel(None);
        Self {
            tx,
            meta: Arc::new(meta),
            next_id: Arc::new(AtomicU64::new(1)),
            max_frame_bytes,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        // Subscribe before reading the cache so no announcement slips between.
        let frames = self.tx.subscribe();
        Subscription {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            frames,
            current_meta: self.meta.borrow().clone(),
        }
    }

    pub fn publish(&self, origin: ConnectionId, message: RelayMessage) {
        match &message {
            RelayMessage::Meta(meta) => {
                self.meta.send_replace(Some(meta.clone()));
            }
            RelayMessage::StopStream => {
                self.meta.send_replace(None);
            }
            _ => {}
        }
        // No subscribers is not an error for a radio.
        let _ = self.tx.send(RelayFrame { origin, message });
    }

    pub fn current_meta(&self) -> Option<StreamMeta> {
        self.meta.borrow().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

//! Text frames exchanged over the relay socket.
//!
//! Binary frames are raw audio chunks and never go through this module.

use crate::playback::StreamMeta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A chat line. Fields other than `text` are passed through as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl ChatMessage {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or("anonymous")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    AudioMeta(StreamMeta),
    #[serde(alias = "chatMessage")]
    Chat(ChatMessage),
    #[serde(alias = "stopStream")]
    StopStream,
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> String {
        // Plain structs and strings only; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

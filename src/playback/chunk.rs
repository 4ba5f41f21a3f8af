//! Audio chunk and stream metadata types shared by the relay and the player.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// MIME type assumed when a broadcaster announces a stream without one.
pub const DEFAULT_MIME_TYPE: &str = "audio/mpeg";

/// An opaque slice of encoded audio.
///
/// The buffering core never looks inside; arrival order is playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk(Bytes);

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for AudioChunk {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for AudioChunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

/// Codec/container announcement that must precede playable chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMeta {
    #[serde(default)]
    pub mime_type: String,
}

impl StreamMeta {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }

    /// The announced MIME type, or [`DEFAULT_MIME_TYPE`] when it was left blank.
    pub fn mime(&self) -> &str {
        let mime = self.mime_type.trim();
        if mime.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            mime
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_mime_falls_back_to_mpeg() {
        let meta: StreamMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta.mime(), DEFAULT_MIME_TYPE);

        let meta = StreamMeta::new("  ");
        assert_eq!(meta.mime(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn meta_uses_camel_case_on_the_wire() {
        let meta = StreamMeta::new("audio/webm;codecs=opus");
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"mimeType":"audio/webm;codecs=opus"}"#);
    }
}

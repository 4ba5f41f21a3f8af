//! # Relay
//!
//! Thin fan-out between one broadcaster and many listeners over WebSocket.
//!
//! | Frame | From | Delivered to |
//! |-------|------|--------------|
//! | binary (audio chunk) | broadcaster | everyone else |
//! | `audio-meta` | broadcaster | everyone else, cached for late joiners |
//! | `chat` | anyone | everyone, sender included |
//! | `stop-stream` | broadcaster | everyone, clears the cache |

mod hub;
mod protocol;
mod socket;

pub use hub::{ConnectionId, RelayFrame, RelayHub, RelayMessage, Subscription};
pub use protocol::{ChatMessage, ControlMessage, ProtocolError};
pub use socket::handle_upgrade;

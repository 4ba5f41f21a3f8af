//! Web Radio
//!
//! Internet radio relay: a broadcaster streams encoded audio over WebSocket,
//! the server fans it out to listeners together with a live chat, and a small
//! session login guards user management. Listeners buffer incoming chunks in
//! a bounded queue and feed them to a decoder sink one at a time.

pub mod auth;
pub mod config;
pub mod listener;
pub mod playback;
pub mod relay;
pub mod server;

pub use config::Config;
pub use server::serve;

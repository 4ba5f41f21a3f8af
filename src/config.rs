//! Runtime configuration read from the environment (and `.env`).

use crate::playback::QueueLimits;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ADMIN_PASSWORD: &str = "1234";
/// Largest WebSocket message accepted from a client (1 MB, enough for audio slices).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1_000_000;
pub const DEFAULT_RELAY_CAPACITY: usize = 256;
pub const DEFAULT_PASSWORD_COST: u32 = 10;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 10;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

const USERS_FILENAME: &str = "users.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// How the native listener retries after losing the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Connection attempts in a row before giving up; 0 disables reconnecting.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RECONNECT_ATTEMPTS,
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub public_dir: PathBuf,
    pub users_file: PathBuf,
    pub admin_password: String,
    pub max_frame_bytes: usize,
    pub relay_capacity: usize,
    pub password_cost: u32,
    /// Listener-side playback queue bounds.
    pub queue: QueueLimits,
    pub reconnect: ReconnectPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            public_dir: PathBuf::from("public"),
            users_file: default_users_file(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            password_cost: DEFAULT_PASSWORD_COST,
            queue: QueueLimits::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(v) = lookup("RADIO_BIND") {
            config.bind = parse("RADIO_BIND", v)?;
        }
        if let Some(v) = lookup("PORT") {
            config.port = parse("PORT", v)?;
        }
        if let Some(v) = lookup("RADIO_PUBLIC_DIR") {
            config.public_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RADIO_USERS_FILE") {
            config.users_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("RADIO_ADMIN_PASSWORD") {
            if v.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: "RADIO_ADMIN_PASSWORD",
                    value: v,
                });
            }
            config.admin_password = v;
        }
        if let Some(v) = lookup("RADIO_MAX_FRAME_BYTES") {
            config.max_frame_bytes = parse_positive("RADIO_MAX_FRAME_BYTES", v)?;
        }
        if let Some(v) = lookup("RADIO_RELAY_CAPACITY") {
            config.relay_capacity = parse_positive("RADIO_RELAY_CAPACITY", v)?;
        }
        if let Some(v) = lookup("RADIO_QUEUE_CHUNKS") {
            config.queue.max_chunks = parse_positive("RADIO_QUEUE_CHUNKS", v)?;
        }
        if let Some(v) = lookup("RADIO_QUEUE_BYTES") {
            config.queue.max_bytes = parse_positive("RADIO_QUEUE_BYTES", v)?;
        }
        if let Some(v) = lookup("RADIO_RECONNECT_ATTEMPTS") {
            config.reconnect.attempts = parse("RADIO_RECONNECT_ATTEMPTS", v)?;
        }
        if let Some(v) = lookup("RADIO_RECONNECT_DELAY_MS") {
            config.reconnect.delay = Duration::from_millis(parse("RADIO_RECONNECT_DELAY_MS", v)?);
        }

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

/// `<data dir>/web-radio/users.json`, or the working directory when the
/// platform has no data directory.
pub fn default_users_file() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("web-radio").join(USERS_FILENAME))
        .unwrap_or_else(|| PathBuf::from("radio-users.json"))
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_positive(name: &'static str, value: String) -> Result<usize, ConfigError> {
    match parse::<usize>(name, value.clone())? {
        0 => Err(ConfigError::InvalidValue { name, value }),
        n => Ok(n),
    }
}

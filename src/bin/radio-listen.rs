//! Command-line listener.
//!
//! Usage:
//!   radio-listen [WS_URL] [OUTPUT_FILE]
//!
//! Examples:
//!   radio-listen                                   # ws://127.0.0.1:3000/ws to stdout
//!   radio-listen ws://radio.local:3000/ws | ffplay -
//!   radio-listen ws://radio.local:3000/ws show.webm

use web_radio_lib::listener;
use web_radio_lib::playback::PipeSinkFactory;
use web_radio_lib::Config;

const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    // Logs go to stderr so stdout stays a clean audio stream.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let url = args.get(1).map(String::as_str).unwrap_or(DEFAULT_URL);
    let factory = match args.get(2) {
        Some(path) => PipeSinkFactory::file(path),
        None => PipeSinkFactory::stdout(),
    };

    let config = Config::from_env()?;
    listener::listen(url, factory, config.queue, config.reconnect).await
}

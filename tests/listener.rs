//! Native listener against a scripted relay that can drop and come back.

use futures_util::SinkExt;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use web_radio_lib::config::ReconnectPolicy;
use web_radio_lib::listener::listen;
use web_radio_lib::playback::{PipeSinkFactory, QueueLimits};

const META: &str = r#"{"type":"audio-meta","mimeType":"audio/webm"}"#;

fn quick_retries(attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        attempts,
        delay: Duration::from_millis(50),
    }
}

fn spawn_listener(
    addr: SocketAddr,
    factory: PipeSinkFactory,
    reconnect: ReconnectPolicy,
) -> JoinHandle<anyhow::Result<()>> {
    let url = format!("ws://{}/ws", addr);
    tokio::spawn(async move { listen(&url, factory, QueueLimits::default(), reconnect).await })
}

/// Accept one listener, announce the stream and send `chunks`.
async fn serve_once(relay: &TcpListener, chunks: &[&[u8]]) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), relay.accept())
        .await
        .expect("listener never connected")
        .expect("accept listener");
    let mut ws = accept_async(stream).await.expect("websocket handshake");
    ws.send(Message::Text(META.into())).await.unwrap();
    for chunk in chunks {
        ws.send(Message::Binary(chunk.to_vec().into())).await.unwrap();
    }
    ws
}

async fn wait_for_file(path: &Path, expected: &[u8]) {
    let mut written = Vec::new();
    for _ in 0..300 {
        written = std::fs::read(path).unwrap_or_default();
        if written == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {:?} in {}, found {:?}",
        String::from_utf8_lossy(expected),
        path.display(),
        String::from_utf8_lossy(&written)
    );
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn listener_resumes_after_relay_restart() {
    let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = relay.local_addr().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("stream.webm");

    let listener = spawn_listener(addr, PipeSinkFactory::file(&out_path), quick_retries(20));

    let ws = serve_once(&relay, &[b"before"]).await;
    wait_for_file(&out_path, b"before").await;

    // Relay goes away entirely; connection attempts are refused for a while.
    drop(ws);
    drop(relay);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let relay = TcpListener::bind(addr).await.unwrap();
    let _ws = serve_once(&relay, &[b"after-", b"restart"]).await;
    wait_for_file(&out_path, b"after-restart").await;

    assert!(!listener.is_finished());
    listener.abort();
}

#[tokio::test]
async fn listener_gives_up_after_configured_attempts() {
    let addr = {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        unused.local_addr().unwrap()
    };
    let listener = spawn_listener(addr, PipeSinkFactory::new(|| Ok(Box::new(io::sink()) as Box<dyn Write + Send>)), quick_retries(2));

    let result = tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .expect("listener kept retrying")
        .expect("listener task panicked");
    let err = result.expect_err("connecting to a closed port succeeded");
    assert!(err.to_string().starts_with("Failed to connect to"));
}

#[tokio::test]
async fn broken_output_stops_the_listener() {
    let relay = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = relay.local_addr().unwrap();
    let factory = PipeSinkFactory::new(|| Ok(Box::new(ClosedPipe) as Box<dyn Write + Send>));
    let listener = spawn_listener(addr, factory, quick_retries(3));

    let _ws = serve_once(&relay, &[b"one", b"two", b"three"]).await;

    let result = tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .expect("listener kept running with a dead output")
        .expect("listener task panicked");
    let err = result.expect_err("playback failure was not reported");
    assert!(err.to_string().starts_with("Cannot play audio/webm"));
}

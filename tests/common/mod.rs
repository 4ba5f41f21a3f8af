//! Shared async test server for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use web_radio_lib::relay::RelayHub;
use web_radio_lib::server::{router, AppState};
use web_radio_lib::Config;

pub const ADMIN_PAGE: &str = "<h1>admin panel</h1>";
pub const LOGIN_PAGE: &str = "<form action=\"/login\"></form>";

/// Spawns the full application on a random localhost port.
pub struct TestServer {
    addr: SocketAddr,
    pub hub: RelayHub,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(&public_dir).expect("create public dir");
        std::fs::write(public_dir.join("admin.html"), ADMIN_PAGE).expect("write admin page");
        std::fs::write(public_dir.join("login.html"), LOGIN_PAGE).expect("write login page");

        let config = Config {
            public_dir,
            users_file: dir.path().join("users.json"),
            password_cost: 4,
            ..Config::default()
        };
        let state = AppState::prepare(config).expect("prepare app state");
        let hub = state.hub.clone();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("read local addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server = axum::serve(listener, router(state)).with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(async move {
            server.await.expect("run test server");
        });

        Self {
            addr,
            hub,
            shutdown_tx: Some(shutdown_tx),
            _dir: dir,
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Wait until the hub has `n` registered connections.
    pub async fn wait_for_connections(&self, n: usize) {
        for _ in 0..200 {
            if self.hub.connection_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} relay connections, have {}",
            n,
            self.hub.connection_count()
        );
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

//! # Radio Web Server
//!
//! Axum application tying the relay, the admin routes and the static site
//! together.
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/ws` | WebSocket relay for audio, stream announcements and chat |
//! | `/login`, `/logout` | Session login and logout |
//! | `/admin.html`, `/panel.html` | Pages that require a session |
//! | `/api/*` | User management for logged-in admins |
//! | anything else | Static files from the public directory (protected pages still need a session) |

use crate::auth::{self, CredentialStore, SessionStore, StoreError};
use crate::config::Config;
use crate::relay::{self, RelayHub};
use anyhow::Context;
use axum::extract::FromRef;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: RelayHub,
    pub store: Arc<CredentialStore>,
    pub sessions: Arc<SessionStore>,
}

impl FromRef<AppState> for RelayHub {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}

impl FromRef<AppState> for Arc<SessionStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.sessions)
    }
}

impl AppState {
    /// Open the credential store and make sure the admin account exists.
    ///
    /// Blocks on file I/O and bcrypt.
    pub fn prepare(config: Config) -> Result<Self, StoreError> {
        let store = CredentialStore::open(&config.users_file, config.password_cost)?;
        if store.init_admin(&config.admin_password)? {
            log::warn!(
                "Default admin account created in {}; change its password",
                store.path().display()
            );
        }
        Ok(Self {
            hub: RelayHub::new(config.relay_capacity, config.max_frame_bytes),
            config: Arc::new(config),
            store: Arc::new(store),
            sessions: Arc::new(SessionStore::new()),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let static_files: Router = Router::new()
        .fallback_service(ServeDir::new(&state.config.public_dir))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::guard_static_pages,
        ));
    Router::new()
        .route("/ws", get(relay::handle_upgrade))
        .merge(auth::routes())
        .fallback_service(static_files)
        .with_state(state)
}

/// Run the server until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.addr();
    let state = tokio::task::spawn_blocking(move || AppState::prepare(config))
        .await
        .context("Credential store task failed")?
        .context("Failed to open credential store")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server terminated unexpectedly")?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

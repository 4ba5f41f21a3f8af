//! Login, logout, protected pages and the user-management API.

use super::sessions::{expired_cookie, session_cookie, token_from_headers, SessionStore};
use super::store::{normalize_username, CredentialStore, StoreError};
use crate::server::AppState;
use axum::extract::{FromRef, FromRequest, FromRequestParts, Request, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const LOGIN_PAGE: &str = "/login.html";
const ADMIN_PAGE: &str = "/admin.html";
/// Files in the public directory that need a session.
const PROTECTED_PAGES: [&str; 2] = ["admin.html", "panel.html"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/admin.html", get(admin_page))
        .route("/panel.html", get(panel_page))
        .route("/api/whoami", get(whoami))
        .route("/api/users", get(list_users))
        .route("/api/change-password", post(change_password))
        .route("/api/new-user", post(new_user))
        .route("/api/delete-user", post(delete_user))
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match self {
            RouteError::Store(StoreError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            other => {
                log::error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Username of the logged-in caller. Requests without a session are sent to
/// the login page.
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    Arc<SessionStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionStore>::from_ref(state);
        token_from_headers(&parts.headers)
            .and_then(|token| sessions.username(&token))
            .map(AuthUser)
            .ok_or_else(|| Redirect::to(LOGIN_PAGE))
    }
}

/// Middleware for the static file fallback. The file server decodes and
/// normalizes request paths, so `/%61dmin.html` or `//admin.html` would reach
/// a protected page without going through its route.
pub async fn guard_static_pages(
    State(sessions): State<Arc<SessionStore>>,
    request: Request,
    next: Next,
) -> Response {
    if names_protected_page(request.uri().path()) {
        let signed_in = token_from_headers(request.headers())
            .and_then(|token| sessions.username(&token))
            .is_some();
        if !signed_in {
            return Redirect::to(LOGIN_PAGE).into_response();
        }
    }
    next.run(request).await
}

fn names_protected_page(path: &str) -> bool {
    let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
    let segments: Vec<&str> = decoded
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    match segments.as_slice() {
        [name] => PROTECTED_PAGES.iter().any(|page| page.eq_ignore_ascii_case(name)),
        _ => false,
    }
}

/// Body extractor accepting either a urlencoded form or JSON, picked by
/// `Content-Type`.
pub struct FormOrJson<T>(pub T);

impl<S, T> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            Ok(Self(value))
        }
    }
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ChangePassword {
    #[serde(rename = "oldPass")]
    old_pass: String,
    #[serde(rename = "newPass")]
    new_pass: String,
}

#[derive(Deserialize)]
struct Username {
    username: String,
}

/// Run a blocking store operation off the async runtime.
async fn with_store<T, F>(store: &Arc<CredentialStore>, f: F) -> Result<T, RouteError>
where
    F: FnOnce(&CredentialStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| RouteError::Task(e.to_string()))?;
    Ok(result?)
}

async fn login(
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<Credentials>,
) -> Result<Response, RouteError> {
    let username = normalize_username(&form.username).to_string();
    let password = form.password;

    let name = username.clone();
    let valid = with_store(&state.store, move |store| store.verify(&name, &password)).await?;

    if valid {
        let token = state.sessions.create(&username);
        log::info!("Login: {}", username);
        Ok(([(SET_COOKIE, session_cookie(&token))], Redirect::to(ADMIN_PAGE)).into_response())
    } else {
        log::warn!("Failed login for {:?}", username);
        Ok(Html(format!(
            "Wrong username or password. <a href='{}'>Try again</a>",
            LOGIN_PAGE
        ))
        .into_response())
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(username) = token_from_headers(&headers).and_then(|t| state.sessions.remove(&t)) {
        log::info!("Logout: {}", username);
    }
    ([(SET_COOKIE, expired_cookie())], Redirect::to(LOGIN_PAGE)).into_response()
}

async fn admin_page(_user: AuthUser, State(state): State<AppState>) -> Response {
    serve_page(&state.config.public_dir, "admin.html").await
}

async fn panel_page(_user: AuthUser, State(state): State<AppState>) -> Response {
    serve_page(&state.config.public_dir, "panel.html").await
}

async fn serve_page(public_dir: &Path, name: &str) -> Response {
    match tokio::fs::read_to_string(public_dir.join(name)).await {
        Ok(content) => Html(content).into_response(),
        Err(e) => {
            log::warn!("Cannot serve {}: {}", name, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn whoami(AuthUser(username): AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "username": username }))
}

async fn list_users(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, RouteError> {
    let users = with_store(&state.store, |store| store.usernames()).await?;
    Ok(Json(users))
}

async fn change_password(
    AuthUser(username): AuthUser,
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<ChangePassword>,
) -> Result<&'static str, RouteError> {
    let changed = with_store(&state.store, move |store| {
        if store.verify(&username, &form.old_pass)? {
            store.update_password(&username, &form.new_pass)
        } else {
            Ok(false)
        }
    })
    .await?;

    Ok(if changed {
        "Password updated."
    } else {
        "Current password is incorrect."
    })
}

async fn new_user(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<Credentials>,
) -> Result<&'static str, RouteError> {
    let username = normalize_username(&form.username).to_string();
    let name = username.clone();
    let created =
        with_store(&state.store, move |store| store.create_user(&name, &form.password)).await?;

    if created {
        log::info!("{} created user {}", admin, username);
        Ok("Broadcaster account created.")
    } else {
        Ok("That user already exists.")
    }
}

async fn delete_user(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    FormOrJson(form): FormOrJson<Username>,
) -> Result<&'static str, RouteError> {
    let username = normalize_username(&form.username).to_string();
    let name = username.clone();
    let deleted = with_store(&state.store, move |store| store.delete_user(&name)).await?;

    if deleted {
        state.sessions.remove_user(&username);
        log::info!("{} deleted user {}", admin, username);
        Ok("User deleted.")
    } else {
        Ok("No such user.")
    }
}

//! In-memory login sessions keyed by a random cookie token.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "radio_session";

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `username` and return its token.
    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(token.clone(), username.to_string());
        }
        token
    }

    pub fn username(&self, token: &str) -> Option<String> {
        self.sessions.lock().ok()?.get(token).cloned()
    }

    pub fn remove(&self, token: &str) -> Option<String> {
        self.sessions.lock().ok()?.remove(token)
    }

    /// Drop every session belonging to `username` (e.g. after deleting the account).
    pub fn remove_user(&self, username: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.retain(|_, user| user != username);
        }
    }
}

pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

pub fn expired_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Pull the session token out of the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn sessions_round_trip() {
        let store = SessionStore::new();
        let token = store.create("admin");
        assert_eq!(store.username(&token).as_deref(), Some("admin"));
        assert_eq!(store.remove(&token).as_deref(), Some("admin"));
        assert_eq!(store.username(&token), None);
    }

    #[test]
    fn removing_a_user_ends_all_their_sessions() {
        let store = SessionStore::new();
        let a = store.create("dj");
        let b = store.create("dj");
        let other = store.create("admin");
        store.remove_user("dj");
        assert!(store.username(&a).is_none());
        assert!(store.username(&b).is_none());
        assert!(store.username(&other).is_some());
    }

    #[test]
    fn finds_token_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_static("lang=es; radio_session=abc123; x=y"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_or_missing_token_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("radio_session="));
        assert_eq!(token_from_headers(&headers), None);
    }
}

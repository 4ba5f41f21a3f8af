//! Admin accounts: credential store, login sessions and HTTP routes

mod routes;
mod sessions;
mod store;

pub use routes::{guard_static_pages, routes, AuthUser, FormOrJson, RouteError};
pub use sessions::{session_cookie, token_from_headers, SessionStore, SESSION_COOKIE};
pub use store::{normalize_username, CredentialStore, StoreError, UserRecord, ADMIN_USERNAME};

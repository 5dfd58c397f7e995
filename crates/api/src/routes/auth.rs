//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /login            -> login
/// POST /register         -> register
/// GET  /google           -> google
/// GET  /google/callback  -> google_callback
/// GET  /apple            -> apple
/// POST /apple/callback   -> apple_callback
/// POST /logout           -> logout
/// GET  /me               -> me (requires session user)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/google", get(auth::google))
        .route("/google/callback", get(auth::google_callback))
        .route("/apple", get(auth::apple))
        .route("/apple/callback", post(auth::apple_callback))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

pub mod auth;
pub mod health;

use axum::Router;

use crate::handlers::fallback;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                       service health
///
/// /auth/login                   sign in (POST)
/// /auth/register                sign up (POST)
/// /auth/google                  Google OAuth start
/// /auth/google/callback         Google OAuth redirect
/// /auth/apple                   Apple Sign In start
/// /auth/apple/callback          Apple Sign In form post (POST)
/// /auth/logout                  destroy session (POST)
/// /auth/me                      current session user
/// ```
///
/// Anything else under `/api` is a JSON 404.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .fallback(fallback::not_found)
}

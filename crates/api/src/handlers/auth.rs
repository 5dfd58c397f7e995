//! Handlers for the `/auth` resource.
//!
//! Sign-in is wired through the strategy registry but no strategy accepts
//! credentials yet, so login and the provider endpoints answer with a
//! "not yet implemented" message.

use axum::body::Bytes;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::auth::session::{serialize_user, SessionUser};
use crate::auth::strategy::{self, AuthOutcome, AuthRequest, Credentials};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: SessionUser,
}

/// Query string of an OAuth redirect.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// Body of Apple's form-post callback.
#[derive(Debug, Default, Deserialize)]
pub struct AppleCallbackForm {
    pub code: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /auth/login
///
/// Accepts any body. A body that is not JSON credentials is treated as
/// empty credentials.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let credentials: Credentials = serde_json::from_slice(&body).unwrap_or_default();

    match state
        .strategies
        .authenticate(strategy::LOCAL, &AuthRequest::Password(credentials))
        .await
    {
        AuthOutcome::Authenticated(user) => {
            serialize_user(&session, &user).await?;
            tracing::info!(user_id = user.user_id, "User signed in");
            Ok(Json(serde_json::json!({ "user": user })))
        }
        AuthOutcome::Rejected { message } => Ok(Json(serde_json::json!({ "message": message }))),
    }
}

/// POST /auth/register
pub async fn register(_body: Bytes) -> Json<MessageResponse> {
    MessageResponse::new(strategy::NOT_IMPLEMENTED)
}

/// GET /auth/google
pub async fn google() -> Json<MessageResponse> {
    MessageResponse::new("Google OAuth not yet implemented")
}

/// GET /auth/google/callback
pub async fn google_callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
) -> Json<MessageResponse> {
    let code = params.ok().and_then(|Query(p)| p.code);
    let outcome = state
        .strategies
        .authenticate(strategy::GOOGLE, &AuthRequest::Callback { code })
        .await;
    tracing::debug!(?outcome, "Google OAuth callback");
    MessageResponse::new("Google OAuth callback not yet implemented")
}

/// GET /auth/apple
pub async fn apple() -> Json<MessageResponse> {
    MessageResponse::new("Apple Sign In not yet implemented")
}

/// POST /auth/apple/callback
///
/// A missing or malformed form is read as no code. A body that could not be
/// read at all, such as one over the size limit, is still rejected.
pub async fn apple_callback(
    State(state): State<AppState>,
    form: Result<Form<AppleCallbackForm>, FormRejection>,
) -> Result<Json<MessageResponse>, FormRejection> {
    let code = match form {
        Ok(Form(f)) => f.code,
        Err(rejection @ FormRejection::BytesRejection(_)) => return Err(rejection),
        Err(_) => None,
    };
    let outcome = state
        .strategies
        .authenticate(strategy::APPLE, &AuthRequest::Callback { code })
        .await;
    tracing::debug!(?outcome, "Apple Sign In callback");
    Ok(MessageResponse::new("Apple Sign In callback not yet implemented"))
}

/// POST /auth/logout
///
/// Destroys the session and its cookie.
pub async fn logout(session: Session) -> AppResult<Json<MessageResponse>> {
    session.flush().await.map_err(AppError::LogoutFailed)?;
    Ok(MessageResponse::new("Logged out successfully"))
}

/// GET /auth/me
pub async fn me(user: SessionUser) -> Json<UserResponse> {
    Json(UserResponse { user })
}

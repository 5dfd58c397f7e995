use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use nashstash_core::error::CoreError;
use nashstash_core::types::DbId;
use serde::{Deserialize, Serialize};
use tower_sessions::{session, Session};

use crate::error::AppError;

/// Session key holding the authenticated user's id.
pub const SESSION_USER_KEY: &str = "user_id";

/// The identity stored in a session.
///
/// Only the id is persisted; anything else about the user is looked up
/// per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: DbId,
}

/// Record `user` as signed in. The session id is rotated first.
pub async fn serialize_user(session: &Session, user: &SessionUser) -> Result<(), session::Error> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user.user_id).await
}

/// The signed-in user, if any.
pub async fn deserialize_user(session: &Session) -> Result<Option<SessionUser>, session::Error> {
    Ok(session
        .get::<DbId>(SESSION_USER_KEY)
        .await?
        .map(|user_id| SessionUser { user_id }))
}

/// Extractor that requires an authenticated session.
///
/// Rejects with 401 `Not authenticated` when the session carries no user.
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| CoreError::Internal(msg.to_string()))?;

        deserialize_user(&session)
            .await?
            .ok_or_else(|| CoreError::Unauthorized("Not authenticated".into()).into())
    }
}

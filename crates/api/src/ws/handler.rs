use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::header::ORIGIN;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use nashstash_core::error::CoreError;
use nashstash_core::types::DbId;
use tower_sessions::Session;

use crate::auth::session::deserialize_user;
use crate::error::AppError;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// Refuse upgrades from browser origins outside the allow-list. Requests
/// without an `Origin` header (native clients) pass.
pub async fn require_allowed_origin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|origin| state.config.is_allowed_origin(origin));
        if !allowed {
            tracing::warn!(origin = ?origin, "Socket upgrade from disallowed origin");
            return AppError::from(CoreError::Forbidden("Origin not allowed".into()))
                .into_response();
        }
    }
    next.run(request).await
}

/// GET /socket
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Session,
) -> impl IntoResponse {
    let user_id = match deserialize_user(&session).await {
        Ok(user) => user.map(|u| u.user_id),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read session for socket upgrade");
            None
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, user_id))
}

async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, user_id: Option<DbId>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, ?user_id, "Socket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                tracing::debug!(conn_id = %sender_conn_id, "Socket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Socket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Socket disconnected");
}

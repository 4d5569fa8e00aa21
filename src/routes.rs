//! Read-only status endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::store::ProfileStore;

const DEFAULT_MESSAGE_LIMIT: usize = 20;
const MAX_MESSAGE_LIMIT: usize = 200;

/// Shared state for the status routes.
#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<dyn ProfileStore>,
}

#[derive(Debug, Deserialize)]
struct MessagesQuery {
    limit: Option<usize>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/profiles/{chat_id}
///
/// Returns the stored profile, or 404 if the chat has never talked to the bot.
async fn get_profile(
    State(state): State<StatusState>,
    Path(chat_id): Path<String>,
) -> Response {
    match state.store.get_profile(&chat_id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "No profile for this chat"),
        Err(e) => {
            tracing::warn!(chat_id, "Profile lookup failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// GET /api/profiles/{chat_id}/messages?limit=N
///
/// Most recent conversation log entries, newest first.
async fn get_messages(
    State(state): State<StatusState>,
    Path(chat_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGE_LIMIT)
        .min(MAX_MESSAGE_LIMIT);

    match state.store.recent_messages(&chat_id, limit).await {
        Ok(messages) => {
            let items: Vec<serde_json::Value> = messages
                .into_iter()
                .map(|m| {
                    serde_json::json!({
                        "sender": m.sender.as_str(),
                        "message": m.message,
                        "created_at": m.created_at.to_rfc3339(),
                    })
                })
                .collect();
            Json(serde_json::json!({ "chat_id": chat_id, "messages": items })).into_response()
        }
        Err(e) => {
            tracing::warn!(chat_id, "Message lookup failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// Build the status router.
pub fn status_routes(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/profiles/{chat_id}", get(get_profile))
        .route("/api/profiles/{chat_id}/messages", get(get_messages))
        .with_state(state)
}

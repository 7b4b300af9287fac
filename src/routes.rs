use crate::models::Model;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

pub const CHAT_ROUTE: &str = "/api/chat";

const MESSAGES_REQUIRED: &str = "Messages array is required";
const COMPLETION_FAILED: &str = "Failed to get chat completion";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CHAT_ROUTE, post(chat))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Forwards one chat request to the completion backend.
///
/// Unknown or missing models fall back to the default model instead of
/// being rejected. Message entries are forwarded untouched.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Rejecting chat request with invalid JSON: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let Some(messages) = payload.get("messages").and_then(Value::as_array) else {
        log::warn!("Rejecting chat request without a messages array");
        return error_response(StatusCode::BAD_REQUEST, MESSAGES_REQUIRED);
    };

    let requested = payload.get("model").and_then(Value::as_str);
    let model = Model::resolve(requested);
    if let Some(requested) = requested.filter(|r| *r != model.id()) {
        log::warn!("Unknown model '{}', falling back to {}", requested, model);
    }

    match state.api_provider.send_chat_request(model, messages).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({
                "message": reply.content.unwrap_or_default(),
                "usage": reply.usage.unwrap_or(Value::Null),
            })),
        )
            .into_response(),
        Err(e) => {
            log::error!("Chat API error: {:?}", e);
            let message = e.to_string();
            let message = if message.trim().is_empty() { COMPLETION_FAILED } else { message.as_str() };
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

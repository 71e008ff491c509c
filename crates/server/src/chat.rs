//! Chat endpoints.
//!
//! - `POST /api/lucia`        run one conversation turn against the assistant
//! - `POST /api/lucia-simple` echo endpoint used to check the deployment is up

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use lucia_agent::ConversationRuntime;
use lucia_core::domain::conversation::ThreadId;
use lucia_core::errors::{ApplicationError, ErrorClass};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

pub const RUN_FAILED_MESSAGE: &str = "A IA não conseguiu completar a requisição.";
pub const RUN_TIMEOUT_MESSAGE: &str = "A IA não respondeu dentro do prazo.";
pub const CRITICAL_MESSAGE: &str = "Ocorreu um erro crítico.";
pub const MISSING_MESSAGE: &str = "O campo 'message' é obrigatório.";

#[derive(Clone)]
pub struct ChatState {
    conversation: Arc<ConversationRuntime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "threadId", default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    pub timestamp: String,
}

pub fn router(conversation: Arc<ConversationRuntime>) -> Router {
    Router::new()
        .route("/api/lucia", post(chat).fallback(method_not_allowed))
        .route("/api/lucia-simple", post(echo).fallback(method_not_allowed))
        .with_state(ChatState { conversation })
}

pub async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (StatusCode::METHOD_NOT_ALLOWED, Json(json!({ "error": "Method not allowed" })))
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<Value>)> {
    let Json(request) = payload.map_err(|rejection| {
        let body = json!({ "error": CRITICAL_MESSAGE, "message": rejection.body_text() });
        (rejection.status(), Json(body))
    })?;

    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_MESSAGE }))))?;
    let thread_id = request.thread_id.filter(|id| !id.trim().is_empty()).map(ThreadId);

    info!(
        event_name = "http.chat.received",
        thread_id = thread_id.as_ref().map(|id| id.0.as_str()).unwrap_or("new"),
        "chat turn received"
    );

    // The turn runs detached so a dropped connection cannot strand a run mid tool round.
    let conversation = Arc::clone(&state.conversation);
    let turn = tokio::spawn(async move { conversation.handle_turn(&message, thread_id).await });
    let outcome = turn
        .await
        .unwrap_or_else(|error| Err(ApplicationError::TaskAborted(error.to_string())));

    match outcome {
        Ok(turn) => Ok(Json(ChatResponse { response: turn.reply, thread_id: turn.thread_id.0 })),
        Err(failure) => {
            error!(event_name = "http.chat.failed", error = %failure, "chat turn failed");
            Err(failure_response(&failure))
        }
    }
}

/// Maps a failed turn onto the status and body the chat widget expects.
pub fn failure_response(failure: &ApplicationError) -> (StatusCode, Json<Value>) {
    match failure.class() {
        ErrorClass::RunFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": RUN_FAILED_MESSAGE, "details": failure.details() })),
        ),
        ErrorClass::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": RUN_TIMEOUT_MESSAGE, "details": failure.details() })),
        ),
        ErrorClass::Critical => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": CRITICAL_MESSAGE, "message": failure.to_string() })),
        ),
    }
}

pub async fn echo(payload: Result<Json<Value>, JsonRejection>) -> Json<EchoResponse> {
    let body = payload.map(|Json(body)| body).unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or("No message provided");
    let thread_id = body
        .get("threadId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string);

    Json(EchoResponse {
        success: true,
        message: format!("Received: {message}"),
        thread_id,
        timestamp: Utc::now().to_rfc3339(),
    })
}

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, instrument};

use crossbar_core::activity::Activity;
use crossbar_core::error::{CrossbarError, RoutingError};

use crate::router::TurnRouter;

/// Shared state for the transport adapter.
#[derive(Clone)]
pub struct AppState {
    router: Arc<TurnRouter>,
    /// One guard per conversation: turns for the same conversation never
    /// interleave. Turns for different conversations run fully in parallel.
    turn_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AppState {
    pub fn new(router: Arc<TurnRouter>) -> Self {
        Self {
            router,
            turn_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[derive(Debug, Serialize)]
struct TransportErrorBody {
    code: String,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(TransportErrorBody {
            code: code.to_string(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Build the transport adapter's axum Router.
pub fn http_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/messages", post(messages_handler))
        .route(
            "/api/skills/v1/conversations/{skillConversationId}/activities",
            post(skill_callback_handler),
        )
        .with_state(state)
}

async fn healthz_handler() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
}

/// POST /api/messages — inbound user-side activities. The response body is
/// the array of user-bound replies the turn produced.
#[instrument(skip(state, activity), fields(conversation_id = %activity.conversation_id))]
async fn messages_handler(
    State(state): State<AppState>,
    Json(activity): Json<Activity>,
) -> Response {
    let lock = state.conversation_lock(&activity.conversation_id).await;
    let _turn = lock.lock().await;
    let replies = state.router.process_turn(activity).await;
    (StatusCode::OK, Json(replies)).into_response()
}

/// POST /api/skills/v1/conversations/{skillConversationId}/activities — the
/// skill host callback. Stale or forged ids get a 404 and mutate nothing.
#[instrument(skip(state, activity))]
async fn skill_callback_handler(
    State(state): State<AppState>,
    Path(skill_conversation_id): Path<String>,
    Json(activity): Json<Activity>,
) -> Response {
    let reference = match state.router.resolve_callback(&skill_conversation_id).await {
        Ok(reference) => reference,
        Err(CrossbarError::Routing(RoutingError::UnknownMapping { .. })) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "unknown_skill_conversation",
                "skill conversation id is not recognized",
            );
        }
        Err(err) => {
            error!(error = %err, "callback_resolution_failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "failed to resolve skill conversation",
            );
        }
    };

    let lock = state.conversation_lock(&reference.conversation_id).await;
    let _turn = lock.lock().await;
    let replies = state.router.deliver_callback(&reference, activity).await;
    (StatusCode::OK, Json(replies)).into_response()
}

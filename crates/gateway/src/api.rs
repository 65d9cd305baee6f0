//! HTTP routes for chats and interactions.
//!
//! - `GET  /health`             — liveness probe
//! - `POST /chats`              — create a chat
//! - `GET  /chats`              — list chats, most recently updated first
//! - `GET  /chats/{id}`         — a chat with its latest interactions
//! - `POST /chat/interaction`   — run the agent on a user message, streaming
//!   every agent event as a Server-Sent Event

use std::convert::Infallible;
use std::sync::Arc;

use agentflux_agent::{AgentEvent, AgentLoop, RunHandle};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::routing::{get, post};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::store::{
    AgentState, Chat, ChatStore, ChatWithInteractions, DEFAULT_CHAT_TITLE, Interaction,
    InteractionStatus,
};

const DEFAULT_INTERACTION_LIMIT: usize = 5;
const DEFAULT_CHAT_LIST_LIMIT: usize = 50;

/// Shared state for all routes.
pub struct ApiState {
    pub agent: AgentLoop,
    pub store: Arc<dyn ChatStore>,
}

pub type SharedApiState = Arc<ApiState>;

pub fn api_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chats", post(create_chat_handler).get(list_chats_handler))
        .route("/chats/{id}", get(get_chat_handler))
        .route("/chat/interaction", post(interaction_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Health ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ── Chats ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateChatResponse {
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// The body is optional; an empty body creates an untitled chat.
async fn create_chat_handler(
    State(state): State<SharedApiState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateChatResponse>), ApiError> {
    let request: CreateChatRequest = if body.is_empty() {
        CreateChatRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| error(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}")))?
    };

    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CHAT_TITLE.to_string());

    let chat_id = state.store.create_chat(&title).await;
    info!(chat_id = %chat_id, "Chat created");
    Ok((StatusCode::CREATED, Json(CreateChatResponse { chat_id })))
}

async fn list_chats_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Chat>> {
    let limit = query.limit.unwrap_or(DEFAULT_CHAT_LIST_LIMIT);
    Json(state.store.list_chats(limit).await)
}

async fn get_chat_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ChatWithInteractions>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_INTERACTION_LIMIT);
    state
        .store
        .get_chat(&id, limit)
        .await
        .map(Json)
        .map_err(|e| error(StatusCode::NOT_FOUND, e.to_string()))
}

// ── Interactions (SSE) ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InteractionRequest {
    pub chat_id: String,
    pub user_message: String,
}

/// `POST /chat/interaction` — run the agent and stream its events.
///
/// The run resumes from the state saved by the chat's latest interaction.
/// Once it ends, the interaction is stored: `COMPLETED` with the final
/// conversation, or `FAILED` with the events emitted so far and the prior
/// state unchanged. A failure is also reported as an `error` frame.
async fn interaction_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<InteractionRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let prior = state
        .store
        .agent_state(&payload.chat_id, None)
        .await
        .map_err(|e| error(StatusCode::NOT_FOUND, e.to_string()))?
        .unwrap_or_default();

    info!(
        chat_id = %payload.chat_id,
        prior_messages = prior.messages.len(),
        "Starting interaction"
    );

    let handle = state
        .agent
        .run_stream(payload.user_message.clone(), Some(prior.clone().into_conversation()));

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(drive_interaction(state, payload, prior, handle, tx));

    let stream = ReceiverStream::new(rx).map(Ok);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Forward a run's events to the SSE channel, then persist the interaction.
///
/// The run is not cancelled when the client disconnects; it finishes and
/// is stored so the chat can continue from it.
async fn drive_interaction(
    state: SharedApiState,
    request: InteractionRequest,
    prior: AgentState,
    mut handle: RunHandle,
    tx: mpsc::Sender<SseEvent>,
) {
    let mut captured: Vec<AgentEvent> = Vec::new();
    while let Some(event) = handle.events.recv().await {
        // A closed receiver only means the client went away
        let _ = tx.send(to_sse(&event)).await;
        captured.push(event);
    }

    let result = match handle.result.await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("agent task failed: {e}")),
    };

    let interaction = match result {
        Ok(outcome) => Interaction::new(
            &request.chat_id,
            InteractionStatus::Completed,
            &request.user_message,
            outcome.events,
            outcome.conversation.into(),
        ),
        Err(e) => {
            warn!(chat_id = %request.chat_id, error = %e, "Interaction failed");
            let frame = serde_json::json!({ "error": e });
            let _ = tx
                .send(SseEvent::default().event("error").data(frame.to_string()))
                .await;
            Interaction::new(
                &request.chat_id,
                InteractionStatus::Failed,
                &request.user_message,
                captured,
                prior,
            )
        }
    };

    let status = interaction.status;
    match state.store.add_interaction(&request.chat_id, interaction).await {
        Ok(()) => info!(chat_id = %request.chat_id, ?status, "Interaction saved"),
        Err(e) => warn!(chat_id = %request.chat_id, error = %e, "Failed to save interaction"),
    }
}

fn to_sse(event: &AgentEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_default();
    SseEvent::default().event(event.event_type()).data(data)
}

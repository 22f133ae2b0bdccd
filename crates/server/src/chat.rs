use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use innkeep_agent::{ChatRouter, SessionRegistry};
use innkeep_core::ReservationStore;

/// Shared state of the public API router.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ChatRouter>,
    pub sessions: Arc<SessionRegistry>,
    pub store: Arc<dyn ReservationStore>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
    pub kind: &'static str,
}

/// `POST /chat`. A missing session id mints one; the session mutex is
/// held for the whole turn, so concurrent messages for the same guest
/// serialize instead of interleaving the draft.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let session = state.sessions.get_or_create(&session_id).await;
    let mut session = session.lock().await;
    let routed = state.router.route(&mut session, &request.message).await;

    (
        StatusCode::OK,
        Json(ChatResponse { reply: routed.text, session_id, kind: routed.kind.as_str() }),
    )
}

use axum::extract::State;
use axum::Json;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::dispatch::{ChatMessage, DispatchOutcome};

/// Forwarded chat message from the connector.
pub async fn handle_message(
    State(state): State<AppState>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<DispatchOutcome>, ApiError> {
    if message.author_id.as_str().is_empty() {
        return Err(ApiError::BadRequest("author_id is required".to_string()));
    }

    let outcome = state.dispatcher.handle(&message).await;
    Ok(Json(outcome))
}

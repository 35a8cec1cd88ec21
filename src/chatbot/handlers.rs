use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    chatbot::dto::{ChatRequest, ChatResponse},
    error::AppError,
    state::AppState,
};

pub fn chatbot_routes() -> Router<AppState> {
    Router::new().route("/chatbot/chat", post(chat))
}

#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(payload) = body?;
    payload.validate()?;
    let response = state.chat.complete(&payload.history, payload.query.trim()).await?;
    Ok(Json(ChatResponse { response }))
}

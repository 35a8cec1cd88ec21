use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    accounts::dto::PublicAccount,
    auth::{
        dto::{LoginRequest, RegisterRequest, TokenResponse},
        extractors::CurrentUser,
        jwt::JwtKeys,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicAccount>), AppError> {
    let Json(payload) = body?;
    let account = services::register(state.store.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(PublicAccount::from(&account))))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(payload) = body?;
    let keys = JwtKeys::from_ref(&state);
    let issued = services::login(state.store.as_ref(), &keys, payload).await?;
    Ok(Json(issued.into()))
}

#[instrument(skip_all)]
pub async fn me(CurrentUser(account): CurrentUser) -> Json<PublicAccount> {
    Json(PublicAccount::from(&account))
}

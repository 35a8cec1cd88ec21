use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    accounts::repo_types::Account,
    auth::{jwt::JwtKeys, services},
    error::AppError,
    state::AppState,
};

/// The account behind a valid `Authorization: Bearer <token>` header.
pub struct CurrentUser(pub Account);

/// Like [`CurrentUser`] but an absent header yields `None`. A header that is
/// present but invalid is still rejected.
pub struct MaybeUser(pub Option<Account>);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let auth = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    // Expect "Bearer <token>"
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;
    Ok(Some(token))
}

async fn resolve(state: &AppState, token: &str) -> Result<Account, AppError> {
    let keys = JwtKeys::from_ref(state);
    services::authenticate(state.store.as_ref(), &keys, token).await
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
        resolve(state, token).await.map(CurrentUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => resolve(state, token).await.map(|a| MaybeUser(Some(a))),
            None => Ok(MaybeUser(None)),
        }
    }
}

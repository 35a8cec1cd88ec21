use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    accounts::{
        dto::{DeletedResponse, PublicAccount, UpdateAccountRequest},
        repo_types::{Account, AccountPatch},
    },
    auth::{extractors::CurrentUser, services},
    error::AppError,
    repo::{parse_id, Document},
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me).delete(delete_me))
        .route("/users/:id", get(get_account))
}

#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicAccount>, AppError> {
    let id = parse_id(&id, Account::KIND)?;
    let account = Account::find_by_id(state.store.as_ref(), id)
        .await?
        .ok_or(AppError::NotFound(Account::KIND))?;
    Ok(Json(PublicAccount::from(&account)))
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(account): CurrentUser) -> Json<PublicAccount> {
    Json(PublicAccount::from(&account))
}

#[instrument(skip(state, account, body), fields(user_id = %account.id))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
    body: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<Json<PublicAccount>, AppError> {
    let Json(payload) = body?;
    let store = state.store.as_ref();

    let username = match payload.username {
        Some(u) => {
            let u = u.trim().to_string();
            services::validate_username(&u)?;
            if u != account.username && Account::find_by_username(store, &u).await?.is_some() {
                return Err(AppError::DuplicateUsername);
            }
            Some(u)
        }
        None => None,
    };
    let email = match payload.email {
        Some(e) => {
            let e = services::normalize_email(&e);
            services::validate_email(&e)?;
            Some(e)
        }
        None => None,
    };
    let password_hash = match payload.password {
        Some(p) => {
            services::validate_password(&p)?;
            Some(services::hash_password(p).await?)
        }
        None => None,
    };

    let patch = AccountPatch {
        username,
        email,
        password_hash,
        updated_at: OffsetDateTime::now_utc(),
    };
    let updated = Account::update(store, account.id, &patch)
        .await?
        .ok_or(AppError::NotFound(Account::KIND))?;
    info!(user_id = %updated.id, "account updated");
    Ok(Json(PublicAccount::from(&updated)))
}

/// Listings the account owns are left in place.
#[instrument(skip(state, account), fields(user_id = %account.id))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(account): CurrentUser,
) -> Result<Json<DeletedResponse>, AppError> {
    if !Account::delete(state.store.as_ref(), account.id).await? {
        return Err(AppError::NotFound(Account::KIND));
    }
    info!(user_id = %account.id, "account deleted");
    Ok(Json(DeletedResponse::new(Account::KIND)))
}

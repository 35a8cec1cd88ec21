use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{dto::DeletedResponse, repo_types::Account},
    auth::extractors::{CurrentUser, MaybeUser},
    error::AppError,
    repo::{parse_id, Document, Repository},
    roommates::{
        dto::{CreateRoommateRequest, MatchQuery, RoommateMatch, RoommateQuery},
        matching,
        preferences::RoommatePreferences,
        repo_types::RoommateRequest,
    },
    state::AppState,
};

pub fn roommate_routes() -> Router<AppState> {
    Router::new()
        .route("/roommates", get(list_requests).post(create_request))
        .route("/roommates/preferences", get(get_preferences).put(put_preferences))
        .route("/roommates/matches", get(list_matches))
        .route("/roommates/:id", get(get_request).delete(delete_request))
}

#[instrument(skip_all)]
pub async fn create_request(
    State(state): State<AppState>,
    MaybeUser(caller): MaybeUser,
    body: Result<Json<CreateRoommateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoommateRequest>), AppError> {
    let Json(payload) = body?;
    payload.validate()?;

    // Anonymous requests must name a real account, are flagged as such and
    // are not added to that account's `roommates` set.
    let (user_id, linked) = match (&caller, payload.user_id) {
        (Some(account), Some(claimed)) if claimed != account.id => {
            warn!(user_id = %account.id, %claimed, "request filed for another account");
            return Err(AppError::Forbidden);
        }
        (Some(account), _) => (account.id, true),
        (None, Some(claimed)) => (existing_account(&state, claimed).await?, false),
        (None, None) => return Err(AppError::validation("user_id is required without a bearer token")),
    };

    let store = state.store.as_ref();
    let request = Repository::<RoommateRequest>::new(store)
        .create(|id| RoommateRequest::from_request(id, user_id, !linked, payload))
        .await?;

    if linked {
        Account::link_roommate_request(store, user_id, request.id).await?;
    }
    info!(request_id = %request.id, %user_id, linked, "roommate request created");
    Ok((StatusCode::CREATED, Json(request)))
}

async fn existing_account(state: &AppState, id: Uuid) -> Result<Uuid, AppError> {
    match Account::find_by_id(state.store.as_ref(), id).await? {
        Some(account) => Ok(account.id),
        None => {
            warn!(user_id = %id, "anonymous request names an unknown account");
            Err(AppError::validation("user_id does not match an account"))
        }
    }
}

#[instrument(skip(state))]
pub async fn list_requests(
    State(state): State<AppState>,
    query: Result<Query<RoommateQuery>, QueryRejection>,
) -> Result<Json<Vec<RoommateRequest>>, AppError> {
    let Query(q) = query?;
    let requests = Repository::<RoommateRequest>::new(state.store.as_ref())
        .list(q.page()?, &q.filters())
        .await?;
    Ok(Json(requests))
}

#[instrument(skip(state))]
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoommateRequest>, AppError> {
    let id = parse_id(&id, RoommateRequest::KIND)?;
    Repository::<RoommateRequest>::new(state.store.as_ref())
        .get(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(RoommateRequest::KIND))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id = parse_id(&id, RoommateRequest::KIND)?;
    let store = state.store.as_ref();
    let repo = Repository::<RoommateRequest>::new(store);

    let request = repo
        .get(id)
        .await?
        .ok_or(AppError::NotFound(RoommateRequest::KIND))?;
    if request.user_id != user.id {
        warn!(request_id = %id, owner_id = %request.user_id, "not the owner");
        return Err(AppError::Forbidden);
    }

    if !repo.delete(id).await? {
        return Err(AppError::NotFound(RoommateRequest::KIND));
    }
    Account::unlink_roommate_request(store, user.id, id).await?;
    info!(request_id = %id, "roommate request deleted");
    Ok(Json(DeletedResponse::new(RoommateRequest::KIND)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_preferences(
    CurrentUser(user): CurrentUser,
) -> Result<Json<RoommatePreferences>, AppError> {
    user.roommate_preferences
        .map(Json)
        .ok_or(AppError::NotFound("Roommate preferences"))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn put_preferences(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<RoommatePreferences>, JsonRejection>,
) -> Result<Json<RoommatePreferences>, AppError> {
    let Json(payload) = body?;
    let preferences = payload.normalized()?;
    let updated = Account::set_roommate_preferences(state.store.as_ref(), user.id, &preferences)
        .await?
        .ok_or(AppError::NotFound(Account::KIND))?;
    info!("roommate preferences saved");
    Ok(Json(updated.roommate_preferences.unwrap_or(preferences)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_matches(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    query: Result<Query<MatchQuery>, QueryRejection>,
) -> Result<Json<Vec<RoommateMatch>>, AppError> {
    let Query(q) = query?;
    let page = q.page()?;
    let Some(mine) = user.roommate_preferences.clone() else {
        return Err(AppError::validation("Set your roommate preferences first"));
    };

    let candidates = Account::all(state.store.as_ref()).await?;
    let matches: Vec<_> = matching::rank(&user, &mine, candidates)
        .into_iter()
        .skip(page.skip as usize)
        .take(page.limit as usize)
        .collect();
    info!(count = matches.len(), "roommate matches ranked");
    Ok(Json(matches))
}

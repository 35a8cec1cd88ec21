use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{dto::DeletedResponse, repo_types::Account},
    auth::extractors::CurrentUser,
    db::DocumentStore,
    dorms::{
        dto::{CreateDormRequest, DormQuery, SearchDormsRequest, SearchDormsResponse, UpdateDormRequest},
        geo::{check_radius, GeoPoint, DEFAULT_RADIUS_KM},
        repo_types::{DormListing, DormPatch},
        search::{self, DormSearchCriteria, CRITERIA_PROMPT, SEARCH_LIMIT},
    },
    error::AppError,
    repo::{parse_id, Document, Repository},
    state::AppState,
};

pub fn dorm_routes() -> Router<AppState> {
    Router::new()
        .route("/dorms", get(list_dorms).post(create_dorm))
        .route("/dorms/:id", get(get_dorm).put(update_dorm).delete(delete_dorm))
        .route("/dorms/near/:lat/:lng", get(dorms_near))
        .route("/dorms/near/:lat/:lng/:distance", get(dorms_near_within))
        .route("/ai/search-dorms", post(search_dorms))
}

/// Loads the listing and checks that `user` owns it.
async fn owned_dorm(store: &dyn DocumentStore, id: Uuid, user: &Account) -> Result<DormListing, AppError> {
    let dorm = Repository::<DormListing>::new(store)
        .get(id)
        .await?
        .ok_or(AppError::NotFound(DormListing::KIND))?;
    if dorm.owner_id != user.id {
        warn!(dorm_id = %id, user_id = %user.id, owner_id = %dorm.owner_id, "not the owner");
        return Err(AppError::Forbidden);
    }
    Ok(dorm)
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_dorm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<CreateDormRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<DormListing>), AppError> {
    let Json(payload) = body?;
    payload.validate()?;
    let store = state.store.as_ref();
    let dorm = Repository::<DormListing>::new(store)
        .create(|id| DormListing::from_request(id, user.id, payload))
        .await?;
    Account::link_dorm(store, user.id, dorm.id).await?;
    info!(dorm_id = %dorm.id, "dorm created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/dorms/{}", dorm.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(dorm)))
}

#[instrument(skip(state))]
pub async fn list_dorms(
    State(state): State<AppState>,
    query: Result<Query<DormQuery>, QueryRejection>,
) -> Result<Json<Vec<DormListing>>, AppError> {
    let Query(q) = query?;
    let page = q.page()?;
    let filters = q.filters()?;
    let dorms = Repository::<DormListing>::new(state.store.as_ref())
        .list(page, &filters)
        .await?;
    Ok(Json(dorms))
}

#[instrument(skip(state))]
pub async fn get_dorm(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DormListing>, AppError> {
    let id = parse_id(&id, DormListing::KIND)?;
    Repository::<DormListing>::new(state.store.as_ref())
        .get(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound(DormListing::KIND))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_dorm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateDormRequest>, JsonRejection>,
) -> Result<Json<DormListing>, AppError> {
    let id = parse_id(&id, DormListing::KIND)?;
    let store = state.store.as_ref();
    owned_dorm(store, id, &user).await?;
    let Json(payload) = body?;
    payload.validate()?;

    let updated = Repository::<DormListing>::new(store)
        .update(id, &DormPatch::from_request(payload))
        .await?
        .ok_or(AppError::NotFound(DormListing::KIND))?;
    info!(dorm_id = %id, "dorm updated");
    Ok(Json(updated))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_dorm(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let id = parse_id(&id, DormListing::KIND)?;
    let store = state.store.as_ref();
    owned_dorm(store, id, &user).await?;

    if !Repository::<DormListing>::new(store).delete(id).await? {
        return Err(AppError::NotFound(DormListing::KIND));
    }
    Account::unlink_dorm(store, user.id, id).await?;
    info!(dorm_id = %id, "dorm deleted");
    Ok(Json(DeletedResponse::new(DormListing::KIND)))
}

/// Listings with coordinates within `radius_km` of `center`, nearest first,
/// after the usual price filters and paging.
async fn near(
    state: &AppState,
    center: GeoPoint,
    radius_km: f64,
    q: DormQuery,
) -> Result<Vec<DormListing>, AppError> {
    center.validate()?;
    check_radius(radius_km)?;
    let page = q.page()?;
    let filters = q.filters()?;

    let mut hits: Vec<(f64, DormListing)> = Repository::<DormListing>::new(state.store.as_ref())
        .scan(&filters)
        .await?
        .into_iter()
        .filter_map(|d| {
            let km = d.coordinates?.distance_km(&center);
            (km <= radius_km).then_some((km, d))
        })
        .collect();
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(hits
        .into_iter()
        .skip(page.skip as usize)
        .take(page.limit as usize)
        .map(|(_, d)| d)
        .collect())
}

#[instrument(skip(state))]
pub async fn dorms_near(
    State(state): State<AppState>,
    path: Result<Path<(f64, f64)>, PathRejection>,
    query: Result<Query<DormQuery>, QueryRejection>,
) -> Result<Json<Vec<DormListing>>, AppError> {
    let Path((lat, lng)) = path?;
    let Query(q) = query?;
    near(&state, GeoPoint { lat, lng }, DEFAULT_RADIUS_KM, q).await.map(Json)
}

#[instrument(skip(state))]
pub async fn dorms_near_within(
    State(state): State<AppState>,
    path: Result<Path<(f64, f64, f64)>, PathRejection>,
    query: Result<Query<DormQuery>, QueryRejection>,
) -> Result<Json<Vec<DormListing>>, AppError> {
    let Path((lat, lng, distance)) = path?;
    let Query(q) = query?;
    near(&state, GeoPoint { lat, lng }, distance, q).await.map(Json)
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn search_dorms(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<SearchDormsRequest>, JsonRejection>,
) -> Result<Json<SearchDormsResponse>, AppError> {
    let Json(payload) = body?;
    payload.validate()?;
    let query = payload.query.trim();

    let reply = state.chat.complete_with(CRITERIA_PROMPT, &[], query).await?;
    let criteria = DormSearchCriteria::from_reply(&reply);
    let dorms: Vec<DormListing> = Repository::<DormListing>::new(state.store.as_ref())
        .scan(&criteria.filters())
        .await?
        .into_iter()
        .filter(|d| criteria.matches(d))
        .take(SEARCH_LIMIT)
        .collect();
    info!(count = dorms.len(), ?criteria, "dorm search answered");

    let response = state
        .chat
        .complete(&[], &search::summary_prompt(query, &dorms))
        .await?;
    Ok(Json(SearchDormsResponse {
        dorms,
        criteria,
        response,
    }))
}

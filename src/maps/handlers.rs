use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{error::AppError, maps::client::Place, state::AppState};

pub fn maps_routes() -> Router<AppState> {
    Router::new()
        .route("/maps/geocode", get(geocode))
        .route("/maps/places/:place_id", get(place_details))
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    #[serde(default)]
    pub address: String,
}

#[instrument(skip(state))]
pub async fn geocode(
    State(state): State<AppState>,
    query: Result<Query<GeocodeQuery>, QueryRejection>,
) -> Result<Json<Place>, AppError> {
    let Query(q) = query?;
    let address = q.address.trim();
    if address.is_empty() {
        return Err(AppError::validation("address is required"));
    }
    state
        .geocoder
        .geocode(address)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Address"))
}

#[instrument(skip(state))]
pub async fn place_details(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> Result<Json<Place>, AppError> {
    state
        .geocoder
        .place_details(place_id.trim())
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Place"))
}

use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod geo;
pub mod handlers;
pub mod repo_types;
pub mod search;

pub fn router() -> Router<AppState> {
    handlers::dorm_routes()
}

use crate::state::AppState;
use axum::Router;

pub mod cache;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}

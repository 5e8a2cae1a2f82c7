use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{LoginRequest, LoginResponse};
use crate::{
    state::AppState,
    users::{error::error_response, validation::normalize_email},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "login body rejected");
            return error_response(StatusCode::BAD_REQUEST, "invalid request body");
        }
    };

    let email = normalize_email(&payload.email);
    match state.users.login(&email, &payload.password).await {
        Ok(token) => {
            info!(email = %email, "user logged in");
            Json(LoginResponse { token }).into_response()
        }
        Err(e) => e.into_response(),
    }
}

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{ListQuery, ListUsersResponse, MessageResponse, UserPayload},
    error::{error_response, ServiceError},
    validation::{normalize_email, validate_new_user, validate_user_update},
};
use crate::{
    auth::extractors::{AdminUser, AuthUser},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/me", get(get_me))
}

fn body_or_400<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(p)| p).map_err(|e| {
        warn!(error = %e, "request body rejected");
        error_response(StatusCode::BAD_REQUEST, "invalid request body")
    })
}

fn query_or_400<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    query.map(|Query(q)| q).map_err(|e| {
        warn!(error = %e, "query string rejected");
        error_response(StatusCode::BAD_REQUEST, "invalid query parameters")
    })
}

fn id_or_400(id: Result<Path<i64>, PathRejection>) -> Result<i64, Response> {
    id.map(|Path(id)| id)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid user id"))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Response {
    let payload = match body_or_400(payload) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let input = match validate_new_user(payload) {
        Ok(i) => i,
        Err(fields) => return ServiceError::Validation(fields).into_response(),
    };

    match state.users.create(input).await {
        Ok(user) => {
            info!(user_id = user.id, email = %user.email, "user registered");
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let id = match id_or_400(id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match state.users.get_by_id(id).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip(state, caller), fields(user_id = caller.sub))]
pub async fn get_me(State(state): State<AppState>, AuthUser(caller): AuthUser) -> Response {
    match state.users.get_by_id(caller.sub).await {
        Ok(user) => Json(user).into_response(),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let q = match query_or_400(query) {
        Ok(q) => q,
        Err(res) => return res,
    };
    let (page, limit) = q.clamped();
    if let Some(email) = q.email.as_deref() {
        let users = match state.users.get_by_email(&normalize_email(email)).await {
            Ok(user) => vec![user],
            Err(ServiceError::UserNotFound) => Vec::new(),
            Err(e) => return e.into_response(),
        };
        return Json(ListUsersResponse { users, page, limit }).into_response();
    }

    let Some(offset) = ListQuery::offset(page, limit) else {
        return Json(ListUsersResponse {
            users: Vec::new(),
            page,
            limit,
        })
        .into_response();
    };
    match state.users.list(offset, limit).await {
        Ok(users) => Json(ListUsersResponse { users, page, limit }).into_response(),
        Err(e) => e.into_response(),
    }
}

#[instrument(skip(state, admin, payload), fields(admin_id = admin.sub))]
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Response {
    let id = match id_or_400(id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let payload = match body_or_400(payload) {
        Ok(p) => p,
        Err(res) => return res,
    };
    let input = match validate_user_update(payload) {
        Ok(i) => i,
        Err(fields) => return ServiceError::Validation(fields).into_response(),
    };

    match state.users.update(id, input).await {
        Ok(()) => {
            info!(user_id = id, "user updated");
            Json(MessageResponse {
                message: "user updated successfully",
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[instrument(skip(state, admin), fields(admin_id = admin.sub))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Response {
    let id = match id_or_400(id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    match state.users.delete(id).await {
        Ok(()) => {
            info!(user_id = id, "user deleted");
            Json(MessageResponse {
                message: "user deleted successfully",
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}

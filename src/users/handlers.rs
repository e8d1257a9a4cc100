use axum::{
    extract::{rejection::JsonRejection, FromRef, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    auth::jwt::JwtKeys,
    error::{ApiError, ApiResult},
    state::AppState,
    users::{
        dto::{
            AuthResponse, ListQuery, LoginRequest, RefreshRequest, RegisterRequest,
            RegisteredUser, UserListItem,
        },
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", get(list_users))
        .route("/users/register/", post(register))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login/", post(login))
        .route("/users/token/refresh/", post(refresh))
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

/// GET /users/?project_name=<name>
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<(StatusCode, Json<Vec<UserListItem>>)> {
    let users = services::list_users(state.users.as_ref(), q.project_name.as_deref()).await?;
    let items: Vec<UserListItem> = users.iter().map(UserListItem::from).collect();
    let status = if items.is_empty() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::OK
    };
    info!(count = items.len(), "users listed");
    Ok((status, Json(items)))
}

/// POST /users/register/
///
/// Answers 200 rather than 201 on success; clients already depend on it.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<RegisteredUser>> {
    let Json(body) = payload.map_err(bad_json)?;
    let payload = RegisterRequest::from_body(body);
    let user = services::register_user(state.users.as_ref(), &payload).await?;
    Ok(Json(RegisteredUser::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(payload) = payload.map_err(bad_json)?;
    let keys = JwtKeys::from_ref(&state);
    let resp = services::login(
        state.users.as_ref(),
        &keys,
        payload.username.trim(),
        &payload.password,
    )
    .await?;
    Ok(Json(resp))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let Json(payload) = payload.map_err(bad_json)?;
    let keys = JwtKeys::from_ref(&state);
    let resp = services::refresh(state.users.as_ref(), &keys, &payload.refresh_token).await?;
    Ok(Json(resp))
}

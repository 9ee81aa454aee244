use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info, instrument};

use crate::{
    error::AppError,
    state::AppState,
    users::{dto::AddUserRequest, repo_types::User, services},
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/verifyuserexist", get(list_users))
        .route("/adduser", post(add_user))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = services::list_users(state.users.as_ref()).await?;
    debug!(count = users.len(), "users listed");
    Ok(Json(users))
}

#[instrument(skip(state, payload))]
pub async fn add_user(
    State(state): State<AppState>,
    payload: Result<Json<AddUserRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(body) = payload?;
    let user = services::add_user(state.users.as_ref(), &body.name).await?;
    info!(user_id = user.id, "user added");
    Ok(StatusCode::CREATED)
}

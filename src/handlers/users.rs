use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, success_response};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::users::{CreateUserRequest, UpdateUserRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let users = state.services.users.list().await?;
    Ok(success_response(users))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let user = state.services.users.create(payload).await?;
    Ok(created_response(user))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let user = state.services.users.update(user_id, payload).await?;
    Ok(success_response(user))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    if auth.user_id == user_id {
        return Err(ServiceError::Validation(
            "you cannot delete your own account".to_string(),
        ));
    }
    state.services.users.delete(user_id).await?;
    Ok(no_content_response())
}

pub async fn reset_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<i64>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    state
        .services
        .users
        .reset_password(user_id, &payload.new_password)
        .await?;
    Ok(success_response(serde_json::json!({
        "message": "Password reset successfully",
    })))
}

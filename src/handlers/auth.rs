use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::common::{success_response, validate_input};
use crate::auth::{AuthUser, TokenPair};
use crate::errors::ServiceError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    pub tokens: TokenPair,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let (account, tokens) = state.auth.login(&payload.username, &payload.password).await?;
    info!(username = %account.username, "user logged in");

    Ok(success_response(LoginResponse {
        user: UserInfo {
            id: account.id,
            username: account.username,
            role: account.role,
            phone: account.phone,
        },
        tokens,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    state.auth.logout(&payload.refresh_token).await?;
    info!(username = %auth.username, "user logged out");
    Ok(success_response(
        serde_json::json!({ "message": "Logged out successfully" }),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let tokens = state.auth.refresh(&payload.refresh_token).await?;
    Ok(success_response(tokens))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let account = state.services.users.get(auth.user_id).await?;
    Ok(success_response(UserInfo {
        id: account.id,
        username: account.username,
        role: account.role,
        phone: account.phone,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    state
        .services
        .users
        .change_password(auth.user_id, &payload.current_password, &payload.new_password)
        .await?;
    Ok(success_response(
        serde_json::json!({ "message": "Password changed successfully" }),
    ))
}

use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
};
use sea_orm::{EntityTrait, QueryOrder};
use serde::Deserialize;

use super::common::success_response;
use crate::auth::AuthUser;
use crate::entities::sync_log;
use crate::errors::ServiceError;
use crate::services::settings::{UpdateApiConfig, UpdateNotifierConfig};
use crate::AppState;

const SYNC_LOG_PAGE: u64 = 50;

#[derive(Debug, Deserialize)]
pub struct SyncLogQuery {
    pub limit: Option<u64>,
}

/// Manual sync trigger. A run already in flight answers 409 rather than
/// queueing a second one.
pub async fn trigger_sync(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let log = state.services.import.sync(Some(&auth.username)).await?;
    Ok(success_response(log))
}

pub async fn sync_status(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let status = state.services.settings.sync_status().await?;
    Ok(success_response(status))
}

pub async fn sync_logs(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SyncLogQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    use sea_orm::QuerySelect;

    let limit = query.limit.unwrap_or(SYNC_LOG_PAGE).min(500);
    let logs = sync_log::Entity::find()
        .order_by_desc(sync_log::Column::StartedAt)
        .limit(limit)
        .all(&*state.db)
        .await?;
    Ok(success_response(logs))
}

pub async fn get_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let config = state.services.settings.api_config().await?;
    Ok(success_response(config))
}

pub async fn put_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateApiConfig>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let config = state.services.settings.update_api_config(payload).await?;
    Ok(success_response(config))
}

pub async fn get_notifier_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let config = state.services.settings.notifier_config().await?;
    Ok(success_response(config))
}

pub async fn put_notifier_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpdateNotifierConfig>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let config = state
        .services
        .settings
        .update_notifier_config(payload)
        .await?;
    Ok(success_response(config))
}

pub async fn test_email(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let message = state.services.notifications.test_email().await?;
    Ok(success_response(serde_json::json!({ "message": message })))
}

pub async fn test_sms(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_superadmin()?;
    let message = state.services.notifications.test_sms().await?;
    Ok(success_response(serde_json::json!({ "message": message })))
}

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;

use super::common::{parse_query_date, parse_query_date_exclusive, success_response};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::notifications;
use crate::services::stock_exceptions::ExceptionQuery;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExceptionListQuery {
    pub resolved: Option<bool>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub channel: NotificationChannel,
    pub recipients: Option<Vec<String>>,
    pub message: Option<String>,
}

impl ExceptionListQuery {
    fn into_service_query(self) -> Result<ExceptionQuery, ServiceError> {
        Ok(ExceptionQuery {
            resolved: self.resolved,
            from: parse_query_date("from_date", &self.from_date)?,
            to: parse_query_date_exclusive("to_date", &self.to_date)?,
            search: self.search,
            sort_by: self.sort_by,
            order: self.order,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ExceptionListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let exceptions = state
        .services
        .stock_exceptions
        .list(&query.into_service_query()?)
        .await?;
    Ok(success_response(exceptions))
}

pub async fn export(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ExceptionListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let exceptions = state
        .services
        .stock_exceptions
        .list(&query.into_service_query()?)
        .await?;
    let csv = notifications::export_csv(&exceptions);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"stock_exceptions.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn send_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;

    let message = match payload.channel {
        NotificationChannel::Email => {
            state
                .services
                .notifications
                .send_email(payload.recipients, None, payload.message)
                .await?
        }
        NotificationChannel::Sms => {
            state
                .services
                .notifications
                .send_sms(payload.recipients, payload.message)
                .await?
        }
    };

    Ok(success_response(serde_json::json!({ "message": message })))
}

pub async fn resolve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let exception = state
        .services
        .stock_exceptions
        .resolve(id, &auth.username)
        .await?;
    Ok(success_response(exception))
}

pub async fn toggle_ordered(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .stock_exceptions
        .toggle_ordered_from_company(id)
        .await?;
    Ok(success_response(outcome))
}

pub async fn toggle_na_cancel(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.stock_exceptions.toggle_na_cancel(id).await?;
    Ok(success_response(outcome))
}

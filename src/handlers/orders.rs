use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use super::common::{parse_query_date, parse_query_date_exclusive, success_response};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::order_state::{LineBatchAssignment, StateTarget};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PackedQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStateRequest {
    pub state: StateTarget,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub customer_message: Option<String>,
    pub email_sent: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub assignments: Vec<LineBatchAssignment>,
}

pub async fn status_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<StatusQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state
        .services
        .order_state
        .status_overview(query.status.as_deref(), query.search.as_deref())
        .await?;
    Ok(success_response(orders))
}

pub async fn ready_to_pack_list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.order_state.ready_to_pack_detail().await?;
    Ok(success_response(orders))
}

pub async fn packed_list(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<PackedQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let from = parse_query_date("from_date", &query.from_date)?;
    let to = parse_query_date_exclusive("to_date", &query.to_date)?;
    let orders = state
        .services
        .order_state
        .packed_list(from, to, query.search.as_deref())
        .await?;
    Ok(success_response(orders))
}

pub async fn order_detail(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.order_state.order_detail(order_id).await?;
    Ok(success_response(detail))
}

pub async fn mark_packed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .order_state
        .mark_packed(order_id, &auth.username)
        .await?;
    Ok(success_response(outcome))
}

pub async fn revert_to_picking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let order = state.services.order_state.revert_to_picking(order_id).await?;
    Ok(success_response(order))
}

pub async fn change_state(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<i64>,
    Json(payload): Json<ChangeStateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let order = state
        .services
        .order_state
        .change_state(order_id, payload.state, &auth.username)
        .await?;
    Ok(success_response(order))
}

pub async fn update_message(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(order_id): Path<i64>,
    Json(payload): Json<UpdateMessageRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .order_state
        .update_message(order_id, payload.customer_message, payload.email_sent)
        .await?;
    Ok(success_response(serde_json::json!({
        "message": "Order updated successfully",
        "customer_message": order.customer_message,
        "email_sent": order.email_sent,
    })))
}

pub async fn split(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<i64>,
    Json(payload): Json<SplitRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    let order = state
        .services
        .order_state
        .split(order_id, payload.assignments)
        .await?;
    Ok(success_response(serde_json::json!({
        "message": format!("Order split into {} shipments", order.total_shipments),
        "total_shipments": order.total_shipments,
        "current_shipment": order.current_shipment,
    })))
}

pub async fn unsplit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    auth.require_admin()?;
    state.services.order_state.unsplit(order_id).await?;
    Ok(success_response(serde_json::json!({
        "message": "Order split reverted; all lines back in a single shipment",
    })))
}

use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use super::common::{parse_query_date, parse_query_date_exclusive, success_response, validate_input};
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::picking::{PickedItemsQuery, ShortAllocation};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct PickRequest {
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(range(min = 1, message = "qty must be at least 1"))]
    pub qty: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotInStockRequest {
    #[validate(length(min = 1))]
    pub sku: String,
    #[validate(length(min = 1, message = "at least one allocation is required"))]
    pub allocations: Vec<ShortAllocation>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    pub qty: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

pub async fn pick_list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let list = state.services.picking.pick_list().await?;
    Ok(success_response(list))
}

pub async fn pick_list_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.services.picking.pick_list_stats().await?;
    Ok(success_response(stats))
}

pub async fn orders_for_sku(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(sku): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.picking.orders_for_sku(&sku).await?;
    let total_remaining: i32 = orders.iter().map(|o| o.qty_remaining).sum();
    Ok(success_response(serde_json::json!({
        "sku": sku,
        "total_remaining": total_remaining,
        "orders": orders,
    })))
}

pub async fn pick(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<PickRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let outcome = state
        .services
        .picking
        .pick(&payload.sku, payload.qty, &auth.username, payload.notes)
        .await?;
    Ok(success_response(outcome))
}

pub async fn not_in_stock(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NotInStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let outcome = state
        .services
        .picking
        .mark_short(&payload.sku, &payload.allocations, &auth.username, payload.notes)
        .await?;
    Ok(success_response(outcome))
}

pub async fn picked_items(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<PickedItemsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state.services.picking.picked_items(&query).await?;
    Ok(success_response(items))
}

pub async fn revert_picked_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(line_id): Path<i64>,
    payload: Option<Json<RevertRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let qty = payload.and_then(|Json(p)| p.qty);
    let outcome = state
        .services
        .picking
        .revert_picked(line_id, qty, &auth.username)
        .await?;
    Ok(success_response(outcome))
}

pub async fn pick_events(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let from = parse_query_date("from_date", &query.from_date)?;
    let to = parse_query_date_exclusive("to_date", &query.to_date)?;
    let events = state.services.picking.pick_events(from, to).await?;
    Ok(success_response(events))
}

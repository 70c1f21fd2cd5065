use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use std::collections::HashMap;

use crate::db::DbPool;
use crate::entities::{order, order_line, pick_event, product};
use crate::errors::ServiceError;
use crate::services::supports_row_locks;

pub const MAX_SHIPMENT_BATCHES: i32 = 5;

/// Outcome of `mark_packed`: either the order is fully packed or it advanced
/// to the next shipment batch.
#[derive(Debug, Serialize)]
pub struct MarkPackedOutcome {
    pub order_id: i64,
    pub number: String,
    pub packed: bool,
    pub current_shipment: i32,
    pub total_shipments: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineBatchAssignment {
    pub line_id: i64,
    pub batch: i32,
}

/// Target states accepted by the admin `change-state` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTarget {
    Open,
    Picking,
    ReadyToPack,
    Packed,
}

impl StateTarget {
    fn as_status(&self) -> &'static str {
        match self {
            StateTarget::Open => order::STATUS_OPEN,
            StateTarget::Picking => order::STATUS_PICKING,
            StateTarget::ReadyToPack => order::STATUS_READY_TO_PACK,
            StateTarget::Packed => order::STATUS_PACKED,
        }
    }
}

/// Result of the pure derivation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedState {
    pub status: &'static str,
    pub ready_to_pack: bool,
}

/// Recomputes `status` and `ready_to_pack` from the lines of the current
/// shipment batch. Pure; the sole decision point for derived order state.
pub fn compute_state(lines_in_current: &[order_line::Model]) -> DerivedState {
    if lines_in_current.is_empty() {
        return DerivedState {
            status: order::STATUS_OPEN,
            ready_to_pack: false,
        };
    }

    let all_done = lines_in_current.iter().all(|line| line.is_complete());
    if all_done {
        return DerivedState {
            status: order::STATUS_READY_TO_PACK,
            ready_to_pack: true,
        };
    }

    let any_progress = lines_in_current
        .iter()
        .any(|line| line.qty_picked > 0 || line.qty_short > 0);

    DerivedState {
        status: if any_progress {
            order::STATUS_PICKING
        } else {
            order::STATUS_OPEN
        },
        ready_to_pack: false,
    }
}

/// Applies the derivation to one order inside the caller's transaction.
/// Terminal orders are left untouched. Returns the fresh order row.
pub async fn derive<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
) -> Result<order::Model, ServiceError> {
    let current = order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

    if current.is_terminal() {
        return Ok(current);
    }

    let lines = order_line::Entity::find()
        .filter(order_line::Column::OrderId.eq(order_id))
        .filter(order_line::Column::ShipmentBatch.eq(current.current_shipment))
        .all(conn)
        .await?;

    let derived = compute_state(&lines);
    if derived.status == current.status && derived.ready_to_pack == current.ready_to_pack {
        return Ok(current);
    }

    let mut active: order::ActiveModel = current.into();
    active.status = Set(derived.status.to_string());
    active.ready_to_pack = Set(derived.ready_to_pack);
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(conn).await?;

    info!(
        order_id,
        status = %updated.status,
        ready_to_pack = updated.ready_to_pack,
        "order state derived"
    );
    Ok(updated)
}

/// Explicit operator transitions and the order query surface.
#[derive(Clone)]
pub struct OrderStateService {
    db: Arc<DbPool>,
}

impl OrderStateService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    async fn load_locked<C: ConnectionTrait>(
        conn: &C,
        order_id: i64,
    ) -> Result<order::Model, ServiceError> {
        let mut query = order::Entity::find_by_id(order_id);
        if supports_row_locks(conn) {
            query = query.lock_exclusive();
        }
        query
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))
    }

    /// Packs the current shipment. Advances to the next batch when one
    /// remains, otherwise finalizes the order.
    #[instrument(skip(self), fields(order_id = order_id, user = %username))]
    pub async fn mark_packed(
        &self,
        order_id: i64,
        username: &str,
    ) -> Result<MarkPackedOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let current = Self::load_locked(&txn, order_id).await?;

        if !current.ready_to_pack || current.status != order::STATUS_READY_TO_PACK {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} is not ready to pack",
                current.number
            )));
        }

        let number = current.number.clone();
        let total_shipments = current.total_shipments;

        let outcome = if current.current_shipment < current.total_shipments {
            let next_shipment = current.current_shipment + 1;
            let mut active: order::ActiveModel = current.into();
            active.current_shipment = Set(next_shipment);
            active.ready_to_pack = Set(false);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&txn).await?;

            // Re-derive so the next batch lands on picking or open.
            derive(&txn, order_id).await?;

            info!(
                order_id,
                next_shipment, "shipment packed, advanced to next batch"
            );
            MarkPackedOutcome {
                order_id,
                number,
                packed: false,
                current_shipment: next_shipment,
                total_shipments,
            }
        } else {
            let current_shipment = current.current_shipment;
            let mut active: order::ActiveModel = current.into();
            active.status = Set(order::STATUS_PACKED.to_string());
            active.packed_at = Set(Some(Utc::now()));
            active.packed_by = Set(Some(username.to_string()));
            active.updated_at = Set(Some(Utc::now()));
            active.update(&txn).await?;

            info!(order_id, "order fully packed");
            MarkPackedOutcome {
                order_id,
                number,
                packed: true,
                current_shipment,
                total_shipments,
            }
        };

        txn.commit().await?;
        Ok(outcome)
    }

    /// Admin reversal: ready-to-pack (or packed) back to picking. Line
    /// quantities are preserved; individual picks are undone through the
    /// picked-items revert instead.
    #[instrument(skip(self), fields(order_id = order_id))]
    pub async fn revert_to_picking(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let current = Self::load_locked(&txn, order_id).await?;

        if current.status != order::STATUS_READY_TO_PACK && current.status != order::STATUS_PACKED {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} must be ready to pack or packed to revert",
                current.number
            )));
        }

        // Line quantities are preserved; no line changed, so the derivation
        // pass is deliberately not run here or the flag would flip back.
        let mut active: order::ActiveModel = current.into();
        active.status = Set(order::STATUS_PICKING.to_string());
        active.ready_to_pack = Set(false);
        active.packed_at = Set(None);
        active.packed_by = Set(None);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!(order_id, status = %updated.status, "order reverted to picking");
        Ok(updated)
    }

    /// Admin override to an explicit state.
    #[instrument(skip(self), fields(order_id = order_id, user = %username))]
    pub async fn change_state(
        &self,
        order_id: i64,
        target: StateTarget,
        username: &str,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let current = Self::load_locked(&txn, order_id).await?;

        let was_packed = current.status == order::STATUS_PACKED;
        let number = current.number.clone();
        let mut active: order::ActiveModel = current.into();
        active.status = Set(target.as_status().to_string());

        match target {
            StateTarget::ReadyToPack => {
                active.ready_to_pack = Set(true);
                active.packed_at = Set(None);
                active.packed_by = Set(None);
            }
            StateTarget::Packed => {
                active.ready_to_pack = Set(true);
                active.packed_at = Set(Some(Utc::now()));
                active.packed_by = Set(Some(username.to_string()));
            }
            StateTarget::Open | StateTarget::Picking => {
                active.ready_to_pack = Set(false);
                active.packed_at = Set(None);
                active.packed_by = Set(None);
                if was_packed {
                    active.current_shipment = Set(1);
                }
            }
        }

        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(order_id, number = %number, status = %updated.status, "order state changed");
        Ok(updated)
    }

    /// Partitions the order's lines into shipment batches.
    #[instrument(skip(self, assignments), fields(order_id = order_id))]
    pub async fn split(
        &self,
        order_id: i64,
        assignments: Vec<LineBatchAssignment>,
    ) -> Result<order::Model, ServiceError> {
        if assignments.is_empty() {
            return Err(ServiceError::Validation(
                "at least one line assignment is required".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let current = Self::load_locked(&txn, order_id).await?;

        if current.status == order::STATUS_PACKED
            || current.status == order::STATUS_READY_TO_PACK
            || current.ready_to_pack
        {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} cannot be split once ready to pack or packed",
                current.number
            )));
        }
        if current.current_shipment != 1 {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} has already shipped a batch and cannot be re-split",
                current.number
            )));
        }

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        // Apply assignments over the existing batches, then validate the
        // final partition: batches 1..=max contiguous, each non-empty.
        let mut final_batches: Vec<(i64, i32)> =
            lines.iter().map(|l| (l.id, l.shipment_batch)).collect();

        for assignment in &assignments {
            if assignment.batch < 1 || assignment.batch > MAX_SHIPMENT_BATCHES {
                return Err(ServiceError::Validation(format!(
                    "batch {} is out of range 1..={MAX_SHIPMENT_BATCHES}",
                    assignment.batch
                )));
            }
            let slot = final_batches
                .iter_mut()
                .find(|(id, _)| *id == assignment.line_id)
                .ok_or_else(|| {
                    ServiceError::Validation(format!(
                        "line {} does not belong to order {}",
                        assignment.line_id, current.number
                    ))
                })?;
            slot.1 = assignment.batch;
        }

        let max_batch = final_batches.iter().map(|(_, b)| *b).max().unwrap_or(1);
        for batch in 1..=max_batch {
            if !final_batches.iter().any(|(_, b)| *b == batch) {
                return Err(ServiceError::Validation(format!(
                    "batch {batch} has no lines; batches must form a contiguous run from 1"
                )));
            }
        }

        for line in &lines {
            let batch = final_batches
                .iter()
                .find(|(id, _)| *id == line.id)
                .map(|(_, b)| *b)
                .unwrap_or(line.shipment_batch);
            if line.shipment_batch != batch {
                let mut active: order_line::ActiveModel = line.clone().into();
                active.shipment_batch = Set(batch);
                active.updated_at = Set(Some(Utc::now()));
                active.update(&txn).await?;
            }
        }

        let number = current.number.clone();
        let mut active: order::ActiveModel = current.into();
        active.total_shipments = Set(max_batch);
        active.current_shipment = Set(1);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        let updated = derive(&txn, order_id).await?;
        txn.commit().await?;

        info!(order_id, number = %number, total_shipments = max_batch, "order split into shipments");
        Ok(updated)
    }

    /// Collapses every line back into a single shipment.
    #[instrument(skip(self), fields(order_id = order_id))]
    pub async fn unsplit(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let current = Self::load_locked(&txn, order_id).await?;

        if current.status == order::STATUS_PACKED
            || current.status == order::STATUS_READY_TO_PACK
            || current.ready_to_pack
        {
            return Err(ServiceError::InvalidTransition(format!(
                "order {} cannot be unsplit once ready to pack or packed",
                current.number
            )));
        }

        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .filter(order_line::Column::ShipmentBatch.ne(1))
            .all(&txn)
            .await?;
        for line in lines {
            let mut active: order_line::ActiveModel = line.into();
            active.shipment_batch = Set(1);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&txn).await?;
        }

        let mut active: order::ActiveModel = current.into();
        active.total_shipments = Set(1);
        active.current_shipment = Set(1);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        let updated = derive(&txn, order_id).await?;
        txn.commit().await?;

        info!(order_id, "order unsplit to a single shipment");
        Ok(updated)
    }

    /// Updates the customer message / email-sent flags on an order.
    pub async fn update_message(
        &self,
        order_id: i64,
        customer_message: Option<String>,
        email_sent: Option<bool>,
    ) -> Result<order::Model, ServiceError> {
        let current = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))?;

        let mut active: order::ActiveModel = current.into();
        if let Some(message) = customer_message {
            active.customer_message = Set(Some(message));
        }
        if let Some(sent) = email_sent {
            active.email_sent = Set(sent);
        }
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }

    pub async fn get_order(&self, order_id: i64) -> Result<order::Model, ServiceError> {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id} not found")))
    }

    pub async fn get_order_lines(
        &self,
        order_id: i64,
    ) -> Result<Vec<order_line::Model>, ServiceError> {
        Ok(order_line::Entity::find()
            .filter(order_line::Column::OrderId.eq(order_id))
            .order_by_asc(order_line::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Orders whose current shipment is complete, oldest first.
    pub async fn ready_to_pack_list(&self) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::ReadyToPack.eq(true))
            .filter(order::Column::Status.eq(order::STATUS_READY_TO_PACK))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Packed orders, newest pack first, with optional date-range and search.
    pub async fn packed_list(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        search: Option<&str>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut query = order::Entity::find()
            .filter(order::Column::Status.eq(order::STATUS_PACKED))
            .order_by_desc(order::Column::PackedAt);

        if let Some(from) = from {
            query = query.filter(order::Column::PackedAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(order::Column::PackedAt.lt(to));
        }
        if let Some(needle) = search.filter(|s| !s.is_empty()) {
            let pattern = format!("%{needle}%");
            query = query.filter(
                Condition::any()
                    .add(order::Column::Number.like(pattern.clone()))
                    .add(order::Column::ExternalId.like(pattern.clone()))
                    .add(order::Column::CustomerName.like(pattern)),
            );
        }

        Ok(query.all(&*self.db).await?)
    }

    /// In-progress orders (default), any status, or one specific status.
    pub async fn status_list(
        &self,
        status_filter: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let mut query = order::Entity::find().order_by_asc(order::Column::CreatedAt);

        match status_filter {
            None | Some("in_progress") => {
                query = query
                    .filter(
                        order::Column::Status
                            .is_in([order::STATUS_OPEN, order::STATUS_PICKING]),
                    )
                    .filter(order::Column::ReadyToPack.eq(false));
            }
            Some("all") => {}
            Some(status) => {
                query = query.filter(order::Column::Status.eq(status));
            }
        }

        if let Some(needle) = search.filter(|s| !s.is_empty()) {
            let pattern = format!("%{needle}%");
            query = query.filter(
                Condition::any()
                    .add(order::Column::Number.like(pattern.clone()))
                    .add(order::Column::CustomerName.like(pattern)),
            );
        }

        Ok(query.all(&*self.db).await?)
    }
}

/// One line in the detailed order view, with pick attribution.
#[derive(Debug, Serialize)]
pub struct OrderLineDetail {
    pub id: i64,
    pub sku: String,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub vendor_name: Option<String>,
    pub variation_details: Option<String>,
    pub image_url: Option<String>,
    pub qty_ordered: i32,
    pub qty_picked: i32,
    pub qty_short: i32,
    pub qty_remaining: i32,
    pub shipment_batch: i32,
    pub picked_by: Option<String>,
    pub picked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OrderProgress {
    pub total_lines: usize,
    pub lines_with_picks: usize,
    pub lines_with_shorts: usize,
    pub fully_picked_lines: usize,
    pub completion_percent: u32,
}

/// Full order view: header, lines and picking progress.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub id: i64,
    pub external_id: String,
    pub number: String,
    pub customer_name: String,
    pub status: String,
    pub ready_to_pack: bool,
    pub total_shipments: i32,
    pub current_shipment: i32,
    pub customer_message: Option<String>,
    pub email_sent: bool,
    pub packed_at: Option<DateTime<Utc>>,
    pub packed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub lines: Vec<OrderLineDetail>,
    pub progress: OrderProgress,
}

impl OrderStateService {
    pub async fn order_detail(&self, order_id: i64) -> Result<OrderDetail, ServiceError> {
        let header = self.get_order(order_id).await?;
        let mut details = self.build_details(vec![header]).await?;
        Ok(details.remove(0))
    }

    /// Detailed view of the orders returned by `status_list`.
    pub async fn status_overview(
        &self,
        status_filter: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<OrderDetail>, ServiceError> {
        let headers = self.status_list(status_filter, search).await?;
        self.build_details(headers).await
    }

    /// Detailed view of the ready-to-pack queue.
    pub async fn ready_to_pack_detail(&self) -> Result<Vec<OrderDetail>, ServiceError> {
        let headers = self.ready_to_pack_list().await?;
        self.build_details(headers).await
    }

    async fn build_details(
        &self,
        headers: Vec<order::Model>,
    ) -> Result<Vec<OrderDetail>, ServiceError> {
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = headers.iter().map(|o| o.id).collect();
        let lines = order_line::Entity::find()
            .filter(order_line::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_line::Column::Id)
            .all(&*self.db)
            .await?;

        let product_ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
        let products: HashMap<i64, product::Model> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let line_ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let mut latest_events: HashMap<i64, pick_event::Model> = HashMap::new();
        if !line_ids.is_empty() {
            let events = pick_event::Entity::find()
                .filter(pick_event::Column::OrderLineId.is_in(line_ids))
                .order_by_asc(pick_event::Column::Timestamp)
                .all(&*self.db)
                .await?;
            for event in events {
                latest_events.insert(event.order_line_id, event);
            }
        }

        let mut lines_by_order: HashMap<i64, Vec<order_line::Model>> = HashMap::new();
        for line in lines {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        let details = headers
            .into_iter()
            .map(|header| {
                let order_lines = lines_by_order.remove(&header.id).unwrap_or_default();

                let total_lines = order_lines.len();
                let lines_with_picks =
                    order_lines.iter().filter(|l| l.qty_picked > 0).count();
                let lines_with_shorts =
                    order_lines.iter().filter(|l| l.qty_short > 0).count();
                let fully_picked_lines = order_lines
                    .iter()
                    .filter(|l| l.qty_picked >= l.qty_ordered)
                    .count();
                let completion_percent = if total_lines == 0 {
                    0
                } else {
                    (fully_picked_lines * 100 / total_lines) as u32
                };

                let line_details = order_lines
                    .into_iter()
                    .map(|line| {
                        let latest = latest_events.get(&line.id);
                        let item = products.get(&line.product_id);
                        OrderLineDetail {
                            id: line.id,
                            sku: line.sku.clone(),
                            title: line.title.clone(),
                            category: line.category.clone(),
                            subcategory: item.and_then(|p| p.subcategory.clone()),
                            vendor_name: item.and_then(|p| p.vendor_name.clone()),
                            variation_details: item.and_then(|p| p.variation_details.clone()),
                            image_url: line.image_url.clone(),
                            qty_ordered: line.qty_ordered,
                            qty_picked: line.qty_picked,
                            qty_short: line.qty_short,
                            qty_remaining: line.qty_remaining(),
                            shipment_batch: line.shipment_batch,
                            picked_by: latest.map(|e| e.username.clone()),
                            picked_at: latest.map(|e| e.timestamp),
                        }
                    })
                    .collect();

                OrderDetail {
                    id: header.id,
                    external_id: header.external_id,
                    number: header.number,
                    customer_name: header.customer_name,
                    status: header.status,
                    ready_to_pack: header.ready_to_pack,
                    total_shipments: header.total_shipments,
                    current_shipment: header.current_shipment,
                    customer_message: header.customer_message,
                    email_sent: header.email_sent,
                    packed_at: header.packed_at,
                    packed_by: header.packed_by,
                    created_at: header.created_at,
                    updated_at: header.updated_at,
                    lines: line_details,
                    progress: OrderProgress {
                        total_lines,
                        lines_with_picks,
                        lines_with_shorts,
                        fully_picked_lines,
                        completion_percent,
                    },
                }
            })
            .collect();

        Ok(details)
    }
}

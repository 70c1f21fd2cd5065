use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::{order, order_line, pick_event, product};
use crate::errors::ServiceError;
use crate::services::order_state;
use crate::services::stock_exceptions;
use crate::services::supports_row_locks;

/// One row of the aggregated pick list: outstanding demand for a SKU across
/// the current shipment batches of all active orders.
#[derive(Debug, Clone, Serialize)]
pub struct PickRow {
    pub sku: String,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub vendor_name: Option<String>,
    pub variation_details: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
    pub store_quantity_available: i32,
    pub needed: i32,
    pub picked: i32,
    pub short: i32,
    pub remaining: i32,
}

#[derive(Debug, Serialize)]
pub struct PickListStats {
    pub total_skus: usize,
    pub total_items_needed: i32,
    pub total_items_picked: i32,
    pub total_items_remaining: i32,
    pub total_orders: u64,
    pub categories_count: usize,
}

/// Open demand for one SKU on one order, shown in the not-in-stock dialog.
#[derive(Debug, Serialize)]
pub struct SkuOrderRow {
    pub order_id: i64,
    pub order_number: String,
    pub customer_name: String,
    pub qty_ordered: i32,
    pub qty_picked: i32,
    pub qty_short: i32,
    pub qty_remaining: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PickOutcome {
    pub sku: String,
    pub qty: i32,
    pub affected_order_ids: Vec<i64>,
    pub orders_ready: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShortAllocation {
    pub order_id: i64,
    pub qty_short: i32,
}

#[derive(Debug, Serialize)]
pub struct ShortOutcome {
    pub sku: String,
    pub total_short: i32,
    pub exception_id: i64,
    pub affected_order_ids: Vec<i64>,
    pub orders_ready: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RevertOutcome {
    pub line_id: i64,
    pub order_id: i64,
    pub qty_reverted: i32,
    pub order_status: String,
}

/// A picked line joined with its latest pick event, for the picked-items view.
#[derive(Debug, Serialize)]
pub struct PickedItemRow {
    pub line_id: i64,
    pub order_id: i64,
    pub order_number: String,
    pub customer_name: String,
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
    pub picked_by: Option<String>,
    pub picked_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PickedItemsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// FIFO pick allocation across order lines.
#[derive(Clone)]
pub struct PickService {
    db: Arc<DbPool>,
}

impl PickService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Aggregated outstanding demand per SKU, restricted to lines of the
    /// current shipment batch of active orders. Fully-covered SKUs drop out.
    #[instrument(skip(self))]
    pub async fn pick_list(&self) -> Result<Vec<PickRow>, ServiceError> {
        let rows = active_batch_lines(&*self.db, None).await?;

        let product_ids: Vec<i64> = rows.iter().map(|(line, _)| line.product_id).collect();
        let products = load_products(&*self.db, &product_ids).await?;

        let mut by_sku: BTreeMap<String, PickRow> = BTreeMap::new();
        for (line, _) in &rows {
            let entry = by_sku.entry(line.sku.clone()).or_insert_with(|| {
                let product = products.get(&line.product_id);
                PickRow {
                    sku: line.sku.clone(),
                    title: line.title.clone(),
                    category: line.category.clone(),
                    subcategory: product.and_then(|p| p.subcategory.clone()),
                    vendor_name: product.and_then(|p| p.vendor_name.clone()),
                    variation_details: product.and_then(|p| p.variation_details.clone()),
                    image_url: line.image_url.clone(),
                    price: product.and_then(|p| p.price),
                    store_quantity_available: product
                        .map(|p| p.store_quantity_available)
                        .unwrap_or(0),
                    needed: 0,
                    picked: 0,
                    short: 0,
                    remaining: 0,
                }
            });
            entry.needed += line.qty_ordered;
            entry.picked += line.qty_picked;
            entry.short += line.qty_short;
            entry.remaining += line.qty_remaining();
        }

        let mut list: Vec<PickRow> = by_sku
            .into_values()
            .filter(|row| row.remaining > 0)
            .collect();
        list.sort_by(|a, b| (&a.category, &a.sku).cmp(&(&b.category, &b.sku)));
        Ok(list)
    }

    #[instrument(skip(self))]
    pub async fn pick_list_stats(&self) -> Result<PickListStats, ServiceError> {
        use sea_orm::PaginatorTrait;

        let list = self.pick_list().await?;
        let categories: std::collections::BTreeSet<&str> =
            list.iter().map(|row| row.category.as_str()).collect();

        let total_orders = order::Entity::find()
            .filter(order::Column::Status.is_in([order::STATUS_OPEN, order::STATUS_PICKING]))
            .filter(order::Column::ReadyToPack.eq(false))
            .count(&*self.db)
            .await?;

        Ok(PickListStats {
            total_skus: list.len(),
            total_items_needed: list.iter().map(|r| r.needed).sum(),
            total_items_picked: list.iter().map(|r| r.picked).sum(),
            total_items_remaining: list.iter().map(|r| r.remaining).sum(),
            total_orders,
            categories_count: categories.len(),
        })
    }

    /// FIFO-ordered open demand for one SKU, for the not-in-stock dialog.
    #[instrument(skip(self))]
    pub async fn orders_for_sku(&self, sku: &str) -> Result<Vec<SkuOrderRow>, ServiceError> {
        let rows = active_batch_lines(&*self.db, Some(sku)).await?;

        let result: Vec<SkuOrderRow> = rows
            .into_iter()
            .filter(|(line, _)| line.qty_remaining() > 0)
            .map(|(line, order)| SkuOrderRow {
                order_id: order.id,
                order_number: order.number,
                customer_name: order.customer_name,
                qty_ordered: line.qty_ordered,
                qty_picked: line.qty_picked,
                qty_short: line.qty_short,
                qty_remaining: line.qty_remaining(),
                created_at: order.created_at,
            })
            .collect();

        if result.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "no open demand for SKU {sku}"
            )));
        }
        Ok(result)
    }

    /// Distributes `qty` picked units of `sku` across order lines in strict
    /// FIFO order (`order.created_at`, then `order.id`). Either the whole
    /// quantity is applied or nothing is.
    #[instrument(skip(self, notes), fields(sku = %sku, qty = qty, user = %username))]
    pub async fn pick(
        &self,
        sku: &str,
        qty: i32,
        username: &str,
        notes: Option<String>,
    ) -> Result<PickOutcome, ServiceError> {
        if qty <= 0 {
            return Err(ServiceError::Validation(
                "pick quantity must be greater than zero".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        // Candidate lines in FIFO order. The subsequent per-row locks are
        // acquired in this same order, which is the fixed lock order shared
        // by every pick/short/revert mutation.
        let candidates = active_batch_lines(&txn, Some(sku)).await?;
        let candidate_ids: Vec<i64> = candidates
            .iter()
            .filter(|(line, _)| line.qty_remaining() > 0)
            .map(|(line, _)| line.id)
            .collect();

        if candidate_ids.is_empty() {
            return Err(ServiceError::InsufficientRemaining(format!(
                "no outstanding demand for SKU {sku}"
            )));
        }

        let mut locked: Vec<order_line::Model> = Vec::with_capacity(candidate_ids.len());
        for line_id in candidate_ids {
            if let Some(line) = lock_line(&txn, line_id).await? {
                if line.qty_remaining() > 0 {
                    locked.push(line);
                }
            }
        }

        let total_remaining: i32 = locked.iter().map(|l| l.qty_remaining()).sum();
        if qty > total_remaining {
            return Err(ServiceError::InsufficientRemaining(format!(
                "cannot pick {qty} units of {sku}: only {total_remaining} remaining"
            )));
        }

        let mut left = qty;
        let mut affected_order_ids: Vec<i64> = Vec::new();
        for line in locked {
            if left == 0 {
                break;
            }
            let take = left.min(line.qty_remaining());
            let line_id = line.id;
            let order_id = line.order_id;
            let new_picked = line.qty_picked + take;

            let mut active: order_line::ActiveModel = line.into();
            active.qty_picked = Set(new_picked);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&txn).await?;

            append_event(&txn, line_id, take, pick_event::KIND_PICK, username, &notes).await?;

            if !affected_order_ids.contains(&order_id) {
                affected_order_ids.push(order_id);
            }
            left -= take;
        }

        let mut orders_ready = Vec::new();
        for order_id in &affected_order_ids {
            let updated = order_state::derive(&txn, *order_id).await?;
            if updated.ready_to_pack {
                orders_ready.push(updated.number);
            }
        }

        txn.commit().await?;
        info!(sku = %sku, qty, ready = orders_ready.len(), "pick applied");

        Ok(PickOutcome {
            sku: sku.to_string(),
            qty,
            affected_order_ids,
            orders_ready,
        })
    }

    /// Records operator-allocated shortages against specific orders and
    /// snapshots one stock exception for the whole call. All-or-nothing: an
    /// allocation exceeding the line's remaining quantity rejects the call.
    #[instrument(skip(self, allocations, notes), fields(sku = %sku, user = %username))]
    pub async fn mark_short(
        &self,
        sku: &str,
        allocations: &[ShortAllocation],
        username: &str,
        notes: Option<String>,
    ) -> Result<ShortOutcome, ServiceError> {
        if allocations.is_empty() {
            return Err(ServiceError::Validation(
                "at least one allocation is required".to_string(),
            ));
        }
        for allocation in allocations {
            if allocation.qty_short <= 0 {
                return Err(ServiceError::Validation(format!(
                    "short quantity must be positive for order {}",
                    allocation.order_id
                )));
            }
        }

        let txn = self.db.begin().await?;

        // Resolve each allocation to its line, then sort FIFO so locks are
        // taken in the same order as pick().
        let mut targets: Vec<(order_line::Model, order::Model, i32)> = Vec::new();
        for allocation in allocations {
            let found = order_line::Entity::find()
                .find_also_related(order::Entity)
                .filter(order_line::Column::OrderId.eq(allocation.order_id))
                .filter(order_line::Column::Sku.eq(sku))
                .one(&txn)
                .await?;

            let (line, header) = match found {
                Some((line, Some(header))) => (line, header),
                _ => {
                    return Err(ServiceError::NotFound(format!(
                        "order {} has no line for SKU {sku}",
                        allocation.order_id
                    )))
                }
            };

            if header.is_terminal() {
                return Err(ServiceError::InvalidTransition(format!(
                    "order {} is already {}",
                    header.number, header.status
                )));
            }

            targets.push((line, header, allocation.qty_short));
        }
        targets.sort_by_key(|(_, header, _)| (header.created_at, header.id));

        let mut total_short = 0;
        let mut affected_order_ids: Vec<i64> = Vec::new();
        let mut order_numbers: Vec<String> = Vec::new();
        let mut snapshot: Option<(String, String)> = None;

        for (candidate, header, qty_short) in targets {
            let line = lock_line(&txn, candidate.id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("line {} vanished", candidate.id)))?;

            if qty_short > line.qty_remaining() {
                return Err(ServiceError::Validation(format!(
                    "cannot mark {qty_short} short for order {}: only {} remaining",
                    header.number,
                    line.qty_remaining()
                )));
            }

            if snapshot.is_none() {
                snapshot = Some((line.title.clone(), line.category.clone()));
            }

            let line_id = line.id;
            let new_short = line.qty_short + qty_short;
            let mut active: order_line::ActiveModel = line.into();
            active.qty_short = Set(new_short);
            active.updated_at = Set(Some(Utc::now()));
            active.update(&txn).await?;

            append_event(&txn, line_id, qty_short, pick_event::KIND_SHORT, username, &notes)
                .await?;

            total_short += qty_short;
            if !affected_order_ids.contains(&header.id) {
                affected_order_ids.push(header.id);
                order_numbers.push(header.number.clone());
            }
        }

        let (product_title, category) = snapshot.unwrap_or((sku.to_string(), "Unknown".into()));
        let vendor_name = product::Entity::find()
            .filter(product::Column::Sku.eq(sku))
            .one(&txn)
            .await?
            .and_then(|p| p.vendor_name);

        let exception = stock_exceptions::record_shortage(
            &txn,
            stock_exceptions::ShortageSnapshot {
                sku: sku.to_string(),
                product_title,
                category,
                vendor_name,
                qty_short: total_short,
                order_numbers: order_numbers.clone(),
                reported_by: username.to_string(),
                notes: notes.clone().unwrap_or_default(),
            },
        )
        .await?;

        let mut orders_ready = Vec::new();
        for order_id in &affected_order_ids {
            let updated = order_state::derive(&txn, *order_id).await?;
            if updated.ready_to_pack {
                orders_ready.push(updated.number);
            }
        }

        txn.commit().await?;
        info!(sku = %sku, total_short, exception_id = exception.id, "shortage recorded");

        Ok(ShortOutcome {
            sku: sku.to_string(),
            total_short,
            exception_id: exception.id,
            affected_order_ids,
            orders_ready,
        })
    }

    /// Lines with picks on orders that are not yet ready to pack, joined with
    /// their latest pick event.
    #[instrument(skip(self, query))]
    pub async fn picked_items(
        &self,
        query: &PickedItemsQuery,
    ) -> Result<Vec<PickedItemRow>, ServiceError> {
        let rows = order_line::Entity::find()
            .find_also_related(order::Entity)
            .filter(order_line::Column::QtyPicked.gt(0))
            .filter(order::Column::ReadyToPack.eq(false))
            .filter(order::Column::Status.is_in([order::STATUS_OPEN, order::STATUS_PICKING]))
            .all(&*self.db)
            .await?;

        let rows: Vec<(order_line::Model, order::Model)> = rows
            .into_iter()
            .filter_map(|(line, header)| header.map(|h| (line, h)))
            .collect();

        let line_ids: Vec<i64> = rows.iter().map(|(line, _)| line.id).collect();
        let latest_events = latest_pick_events(&*self.db, &line_ids).await?;

        let product_ids: Vec<i64> = rows.iter().map(|(line, _)| line.product_id).collect();
        let products = load_products(&*self.db, &product_ids).await?;

        let mut items: Vec<PickedItemRow> = rows
            .into_iter()
            .map(|(line, header)| {
                let latest = latest_events.get(&line.id);
                let product = products.get(&line.product_id);
                PickedItemRow {
                    line_id: line.id,
                    order_id: header.id,
                    order_number: header.number.clone(),
                    customer_name: header.customer_name.clone(),
                    sku: line.sku.clone(),
                    title: line.title.clone(),
                    category: line.category.clone(),
                    subcategory: product.and_then(|p| p.subcategory.clone()),
                    vendor_name: product.and_then(|p| p.vendor_name.clone()),
                    variation_details: product.and_then(|p| p.variation_details.clone()),
                    image_url: line.image_url.clone(),
                    qty_ordered: line.qty_ordered,
                    qty_picked: line.qty_picked,
                    qty_short: line.qty_short,
                    qty_remaining: line.qty_remaining(),
                    picked_by: latest.map(|e| e.username.clone()),
                    picked_at: latest
                        .map(|e| e.timestamp)
                        .or(line.updated_at)
                        .unwrap_or(line.created_at),
                    created_at: line.created_at,
                }
            })
            .collect();

        if let Some(needle) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            items.retain(|item| {
                item.sku.to_lowercase().contains(&needle)
                    || item.title.to_lowercase().contains(&needle)
                    || item.order_number.to_lowercase().contains(&needle)
            });
        }
        if let Some(category) = query.category.as_deref().filter(|s| !s.is_empty()) {
            items.retain(|item| item.category == category);
        }
        if let Some(subcategory) = query.subcategory.as_deref().filter(|s| !s.is_empty()) {
            items.retain(|item| item.subcategory.as_deref() == Some(subcategory));
        }

        let descending = query.order.as_deref() != Some("asc");
        match query.sort_by.as_deref() {
            Some("sku") => items.sort_by(|a, b| a.sku.cmp(&b.sku)),
            Some("order_number") => items.sort_by(|a, b| a.order_number.cmp(&b.order_number)),
            Some("category") => items.sort_by(|a, b| a.category.cmp(&b.category)),
            _ => items.sort_by_key(|item| item.picked_at),
        }
        if descending {
            items.reverse();
        }

        Ok(items)
    }

    /// Operator undo of picked units on one line. Defaults to the full
    /// picked quantity; the owning order may regress from ready-to-pack.
    #[instrument(skip(self), fields(line_id = line_id, user = %username))]
    pub async fn revert_picked(
        &self,
        line_id: i64,
        qty: Option<i32>,
        username: &str,
    ) -> Result<RevertOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let line = lock_line(&txn, line_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order line {line_id} not found")))?;

        let qty = qty.unwrap_or(line.qty_picked);
        if qty <= 0 {
            return Err(ServiceError::Validation(
                "revert quantity must be greater than zero".to_string(),
            ));
        }
        if qty > line.qty_picked {
            return Err(ServiceError::Validation(format!(
                "cannot revert {qty} units: only {} picked",
                line.qty_picked
            )));
        }

        let order_id = line.order_id;
        let new_picked = line.qty_picked - qty;
        let mut active: order_line::ActiveModel = line.into();
        active.qty_picked = Set(new_picked);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        append_event(&txn, line_id, -qty, pick_event::KIND_REVERT, username, &None).await?;

        let updated_order = order_state::derive(&txn, order_id).await?;
        let order_status = updated_order.status.clone();

        txn.commit().await?;
        info!(line_id, qty, order_id, "pick reverted");

        Ok(RevertOutcome {
            line_id,
            order_id,
            qty_reverted: qty,
            order_status,
        })
    }

    /// Read-only pick-event audit trail, newest first.
    pub async fn pick_events(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<pick_event::Model>, ServiceError> {
        let mut query = pick_event::Entity::find().order_by_desc(pick_event::Column::Timestamp);
        if let Some(from) = from {
            query = query.filter(pick_event::Column::Timestamp.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(pick_event::Column::Timestamp.lt(to));
        }
        Ok(query.all(&*self.db).await?)
    }
}

/// Lines of active orders restricted to the current shipment batch, joined
/// with their order headers, in FIFO order. Optionally narrowed to one SKU.
async fn active_batch_lines<C: ConnectionTrait>(
    conn: &C,
    sku: Option<&str>,
) -> Result<Vec<(order_line::Model, order::Model)>, ServiceError> {
    let mut query = order_line::Entity::find()
        .find_also_related(order::Entity)
        .filter(order::Column::Status.is_in([order::STATUS_OPEN, order::STATUS_PICKING]))
        .filter(order::Column::ReadyToPack.eq(false))
        .filter(
            Expr::col((order_line::Entity, order_line::Column::ShipmentBatch))
                .equals((order::Entity, order::Column::CurrentShipment)),
        )
        .order_by_asc(order::Column::CreatedAt)
        .order_by_asc(order::Column::Id)
        .order_by_asc(order_line::Column::Id);

    if let Some(sku) = sku {
        query = query.filter(order_line::Column::Sku.eq(sku));
    }

    let rows = query.all(conn).await?;
    Ok(rows
        .into_iter()
        .filter_map(|(line, header)| header.map(|h| (line, h)))
        .collect())
}

/// Re-reads one line under a row lock (Postgres) or plainly (SQLite tests).
async fn lock_line<C: ConnectionTrait>(
    conn: &C,
    line_id: i64,
) -> Result<Option<order_line::Model>, ServiceError> {
    let mut query = order_line::Entity::find_by_id(line_id);
    if supports_row_locks(conn) {
        query = query.lock_exclusive();
    }
    Ok(query.one(conn).await?)
}

async fn append_event<C: ConnectionTrait>(
    conn: &C,
    line_id: i64,
    delta: i32,
    kind: &str,
    username: &str,
    notes: &Option<String>,
) -> Result<(), ServiceError> {
    let event = pick_event::ActiveModel {
        order_line_id: Set(line_id),
        delta_qty: Set(delta),
        kind: Set(kind.to_string()),
        username: Set(username.to_string()),
        timestamp: Set(Utc::now()),
        notes: Set(notes.clone().filter(|n| !n.is_empty())),
        ..Default::default()
    };
    event.insert(conn).await?;
    Ok(())
}

async fn load_products<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i64],
) -> Result<HashMap<i64, product::Model>, ServiceError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids.to_vec()))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|p| (p.id, p)).collect())
}

/// Latest pick event per line, for attribution in the picked-items view.
async fn latest_pick_events<C: ConnectionTrait>(
    conn: &C,
    line_ids: &[i64],
) -> Result<HashMap<i64, pick_event::Model>, ServiceError> {
    if line_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let events = pick_event::Entity::find()
        .filter(pick_event::Column::OrderLineId.is_in(line_ids.to_vec()))
        .order_by_asc(pick_event::Column::Timestamp)
        .all(conn)
        .await?;

    let mut latest: HashMap<i64, pick_event::Model> = HashMap::new();
    for event in events {
        latest.insert(event.order_line_id, event);
    }
    Ok(latest)
}

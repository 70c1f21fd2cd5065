use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::{order, stock_exception};
use crate::errors::ServiceError;
use crate::services::order_state;

/// Snapshot captured when a shortage is reported. Everything is copied at
/// reporting time; the row never follows later product or order edits.
#[derive(Debug, Clone)]
pub struct ShortageSnapshot {
    pub sku: String,
    pub product_title: String,
    pub category: String,
    pub vendor_name: Option<String>,
    pub qty_short: i32,
    pub order_numbers: Vec<String>,
    pub reported_by: String,
    pub notes: String,
}

/// Creates one exception row inside the caller's transaction. Called by the
/// pick engine as part of `mark_short`.
pub async fn record_shortage<C: ConnectionTrait>(
    conn: &C,
    snapshot: ShortageSnapshot,
) -> Result<stock_exception::Model, ServiceError> {
    let row = stock_exception::ActiveModel {
        sku: Set(snapshot.sku),
        product_title: Set(snapshot.product_title),
        category: Set(snapshot.category),
        vendor_name: Set(snapshot.vendor_name),
        qty_short: Set(snapshot.qty_short),
        order_numbers: Set(json!(snapshot.order_numbers)),
        reported_by: Set(snapshot.reported_by),
        timestamp: Set(Utc::now()),
        resolved: Set(false),
        ordered_from_company: Set(false),
        na_cancel: Set(false),
        notes: Set(snapshot.notes),
        ..Default::default()
    };
    Ok(row.insert(conn).await?)
}

#[derive(Debug, Default, Deserialize)]
pub struct ExceptionQuery {
    pub resolved: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Aggregated unresolved shortages for one SKU, used by the notifier report.
#[derive(Debug, Serialize)]
pub struct AggregatedException {
    pub sku: String,
    pub product_title: String,
    pub category: String,
    pub total_qty_short: i32,
    pub order_numbers: Vec<String>,
    pub exception_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ToggleOutcome {
    pub id: i64,
    pub value: bool,
    pub orders_made_ready: Vec<String>,
}

#[derive(Clone)]
pub struct StockExceptionService {
    db: Arc<DbPool>,
}

impl StockExceptionService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Lists exceptions with the operator-facing filters and sorts.
    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        query: &ExceptionQuery,
    ) -> Result<Vec<stock_exception::Model>, ServiceError> {
        let mut select = stock_exception::Entity::find();

        if let Some(resolved) = query.resolved {
            select = select.filter(stock_exception::Column::Resolved.eq(resolved));
        }
        if let Some(from) = query.from {
            select = select.filter(stock_exception::Column::Timestamp.gte(from));
        }
        if let Some(to) = query.to {
            select = select.filter(stock_exception::Column::Timestamp.lt(to));
        }
        if let Some(needle) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{needle}%");
            select = select.filter(
                Condition::any()
                    .add(stock_exception::Column::Sku.like(pattern.clone()))
                    .add(stock_exception::Column::ProductTitle.like(pattern.clone()))
                    .add(stock_exception::Column::VendorName.like(pattern.clone()))
                    // order_numbers is a JSON list; match it as text.
                    .add(
                        Expr::col((
                            stock_exception::Entity,
                            stock_exception::Column::OrderNumbers,
                        ))
                        .cast_as(Alias::new("text"))
                        .like(pattern),
                    ),
            );
        }

        let ascending = query.order.as_deref() == Some("asc");
        select = match (query.sort_by.as_deref(), ascending) {
            (Some("sku"), true) => select.order_by_asc(stock_exception::Column::Sku),
            (Some("sku"), false) => select.order_by_desc(stock_exception::Column::Sku),
            (Some("qty_short"), true) => select.order_by_asc(stock_exception::Column::QtyShort),
            (Some("qty_short"), false) => select.order_by_desc(stock_exception::Column::QtyShort),
            (Some("vendor"), true) => select.order_by_asc(stock_exception::Column::VendorName),
            (Some("vendor"), false) => select.order_by_desc(stock_exception::Column::VendorName),
            (_, true) => select.order_by_asc(stock_exception::Column::Timestamp),
            (_, false) => select.order_by_desc(stock_exception::Column::Timestamp),
        };

        Ok(select.all(&*self.db).await?)
    }

    pub async fn unresolved(&self) -> Result<Vec<stock_exception::Model>, ServiceError> {
        Ok(stock_exception::Entity::find()
            .filter(stock_exception::Column::Resolved.eq(false))
            .order_by_desc(stock_exception::Column::Timestamp)
            .all(&*self.db)
            .await?)
    }

    /// Marks an exception resolved. Idempotent.
    #[instrument(skip(self), fields(exception_id = id, user = %username))]
    pub async fn resolve(
        &self,
        id: i64,
        username: &str,
    ) -> Result<stock_exception::Model, ServiceError> {
        let row = self.find(id).await?;
        if row.resolved {
            return Ok(row);
        }

        let note = if row.notes.is_empty() {
            format!("Resolved by {username}")
        } else {
            format!("{}\nResolved by {username}", row.notes)
        };

        let mut active: stock_exception::ActiveModel = row.into();
        active.resolved = Set(true);
        active.notes = Set(note);
        let updated = active.update(&*self.db).await?;
        info!(exception_id = id, "stock exception resolved");
        Ok(updated)
    }

    #[instrument(skip(self), fields(exception_id = id))]
    pub async fn toggle_ordered_from_company(&self, id: i64) -> Result<ToggleOutcome, ServiceError> {
        let row = self.find(id).await?;
        let value = !row.ordered_from_company;

        let mut active: stock_exception::ActiveModel = row.into();
        active.ordered_from_company = Set(value);
        active.update(&*self.db).await?;

        Ok(ToggleOutcome {
            id,
            value,
            orders_made_ready: Vec::new(),
        })
    }

    /// Toggles the not-available/cancel flag. When switched on, the affected
    /// orders are re-derived: cancelling the shortage can be the last thing
    /// an order was waiting on.
    #[instrument(skip(self), fields(exception_id = id))]
    pub async fn toggle_na_cancel(&self, id: i64) -> Result<ToggleOutcome, ServiceError> {
        let row = self.find(id).await?;
        let value = !row.na_cancel;
        let order_numbers = row.order_number_list();

        let mut active: stock_exception::ActiveModel = row.into();
        active.na_cancel = Set(value);
        active.update(&*self.db).await?;

        let mut orders_made_ready = Vec::new();
        if value {
            let txn = self.db.begin().await?;
            let affected = order::Entity::find()
                .filter(order::Column::Number.is_in(order_numbers))
                .filter(order::Column::ReadyToPack.eq(false))
                .filter(order::Column::Status.is_in([order::STATUS_OPEN, order::STATUS_PICKING]))
                .all(&txn)
                .await?;

            for header in affected {
                let updated = order_state::derive(&txn, header.id).await?;
                if updated.ready_to_pack {
                    orders_made_ready.push(updated.number);
                }
            }
            txn.commit().await?;
        }

        Ok(ToggleOutcome {
            id,
            value,
            orders_made_ready,
        })
    }

    /// Unresolved shortages grouped by SKU, largest first.
    pub async fn aggregated(&self) -> Result<Vec<AggregatedException>, ServiceError> {
        let rows = self.unresolved().await?;

        let mut by_sku: BTreeMap<String, AggregatedException> = BTreeMap::new();
        for row in rows {
            let numbers = row.order_number_list();
            let entry = by_sku
                .entry(row.sku.clone())
                .or_insert_with(|| AggregatedException {
                    sku: row.sku.clone(),
                    product_title: row.product_title.clone(),
                    category: row.category.clone(),
                    total_qty_short: 0,
                    order_numbers: Vec::new(),
                    exception_count: 0,
                });
            entry.total_qty_short += row.qty_short;
            entry.exception_count += 1;
            for number in numbers {
                if !entry.order_numbers.contains(&number) {
                    entry.order_numbers.push(number);
                }
            }
        }

        let mut result: Vec<AggregatedException> = by_sku.into_values().collect();
        for entry in &mut result {
            entry.order_numbers.sort();
        }
        result.sort_by(|a, b| b.total_qty_short.cmp(&a.total_qty_short));
        Ok(result)
    }

    async fn find(&self, id: i64) -> Result<stock_exception::Model, ServiceError> {
        stock_exception::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("stock exception {id} not found")))
    }
}

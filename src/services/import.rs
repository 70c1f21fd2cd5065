use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::db::DbPool;
use crate::entities::{api_config, order, order_line, product, sync_log};
use crate::errors::ServiceError;
use crate::services::order_state;
use crate::services::settings::SettingsService;
use crate::upstream::{self, Document, Feed, UpstreamClient, UpstreamError};

/// A sync that has shown no progress for this long is treated as crashed and
/// no longer blocks new runs.
const STALE_SYNC_MINUTES: i64 = 30;

#[derive(Debug, Default)]
struct Counters {
    orders_created: i32,
    orders_updated: i32,
    orders_auto_packed: i32,
    products_created: i32,
    products_updated: i32,
    items_created: i32,
    items_updated: i32,
    warnings: Vec<String>,
}

/// Imports the upstream document into the normalized model. One sync at a
/// time; progress and counters land in `sync_logs`.
#[derive(Clone)]
pub struct ImportService {
    db: Arc<DbPool>,
    client: UpstreamClient,
    settings: SettingsService,
}

impl ImportService {
    pub fn new(db: Arc<DbPool>, client: UpstreamClient, settings: SettingsService) -> Self {
        Self {
            db,
            client,
            settings,
        }
    }

    /// Full sync: fetch the upstream document and reconcile it.
    #[instrument(skip(self))]
    pub async fn sync(&self, triggered_by: Option<&str>) -> Result<sync_log::Model, ServiceError> {
        self.ensure_not_busy().await?;
        let log = self.create_log(triggered_by).await?;

        let config = self.settings.api_config().await?;
        let document = match self.client.fetch(&config.api_base_url, &config.api_key).await {
            Ok(document) => document,
            Err(err) => {
                let message = err.to_string();
                error!(error = %message, "upstream fetch failed");
                self.fail_log(log, &message).await?;
                self.settings
                    .stamp_sync_result(api_config::SYNC_STATUS_ERROR, &message)
                    .await?;
                return Err(match err {
                    UpstreamError::Unavailable(m) => ServiceError::UpstreamUnavailable(m),
                    UpstreamError::Malformed(m) => ServiceError::UpstreamMalformed(m),
                });
            }
        };

        self.apply_to_log(&document, log).await
    }

    /// Reconciles an already-fetched document. Runs the same path as
    /// [`sync`] minus the network call.
    pub async fn apply_document(
        &self,
        document: &Document,
        triggered_by: Option<&str>,
    ) -> Result<sync_log::Model, ServiceError> {
        self.ensure_not_busy().await?;
        let log = self.create_log(triggered_by).await?;
        self.apply_to_log(document, log).await
    }

    async fn ensure_not_busy(&self) -> Result<(), ServiceError> {
        let stale_before = Utc::now() - ChronoDuration::minutes(STALE_SYNC_MINUTES);
        let in_flight = sync_log::Entity::find()
            .filter(sync_log::Column::Status.eq(sync_log::STATUS_IN_PROGRESS))
            .filter(sync_log::Column::StartedAt.gt(stale_before))
            .order_by_desc(sync_log::Column::StartedAt)
            .one(&*self.db)
            .await?;

        if in_flight.is_some() {
            return Err(ServiceError::SyncBusy);
        }
        Ok(())
    }

    // Committed immediately so concurrent observers see the in-flight sync.
    async fn create_log(&self, triggered_by: Option<&str>) -> Result<sync_log::Model, ServiceError> {
        let log = sync_log::ActiveModel {
            started_at: Set(Utc::now()),
            status: Set(sync_log::STATUS_IN_PROGRESS.to_string()),
            detailed_errors: Set(json!([])),
            triggered_by: Set(triggered_by.map(str::to_string)),
            ..Default::default()
        };
        Ok(log.insert(&*self.db).await?)
    }

    async fn fail_log(
        &self,
        log: sync_log::Model,
        message: &str,
    ) -> Result<sync_log::Model, ServiceError> {
        let mut active: sync_log::ActiveModel = log.into();
        active.status = Set(sync_log::STATUS_ERROR.to_string());
        active.completed_at = Set(Some(Utc::now()));
        active.error_message = Set(Some(message.to_string()));
        Ok(active.update(&*self.db).await?)
    }

    async fn apply_to_log(
        &self,
        document: &Document,
        log: sync_log::Model,
    ) -> Result<sync_log::Model, ServiceError> {
        let feed = upstream::flatten(document);
        let orders_fetched = feed.orders.len() as i32;

        let counters = match self.reconcile(&feed).await {
            Ok(counters) => counters,
            Err(err) => {
                let message = err.to_string();
                self.fail_log(log, &message).await?;
                self.settings
                    .stamp_sync_result(api_config::SYNC_STATUS_ERROR, &message)
                    .await?;
                return Err(err);
            }
        };

        let mut message = format!("Synced {orders_fetched} orders");
        if counters.orders_auto_packed > 0 {
            message.push_str(&format!(", {} auto-packed", counters.orders_auto_packed));
        }

        let mut active: sync_log::ActiveModel = log.into();
        active.status = Set(sync_log::STATUS_SUCCESS.to_string());
        active.completed_at = Set(Some(Utc::now()));
        active.orders_fetched = Set(orders_fetched);
        active.orders_created = Set(counters.orders_created);
        active.orders_updated = Set(counters.orders_updated);
        active.orders_auto_packed = Set(counters.orders_auto_packed);
        active.products_created = Set(counters.products_created);
        active.products_updated = Set(counters.products_updated);
        active.items_created = Set(counters.items_created);
        active.items_updated = Set(counters.items_updated);
        active.warnings = Set(counters.warnings.len() as i32);
        active.detailed_errors = Set(json!(counters.warnings));
        let finished = active.update(&*self.db).await?;

        self.settings
            .stamp_sync_result(api_config::SYNC_STATUS_SUCCESS, &message)
            .await?;

        info!(
            orders_fetched,
            orders_created = finished.orders_created,
            orders_updated = finished.orders_updated,
            orders_auto_packed = finished.orders_auto_packed,
            warnings = finished.warnings,
            "sync completed"
        );
        Ok(finished)
    }

    // The whole reconciliation is one unit of work: upserts, auto-pack and
    // the derivation pass commit together.
    async fn reconcile(&self, feed: &Feed) -> Result<Counters, ServiceError> {
        let mut counters = Counters {
            warnings: feed.warnings.clone(),
            ..Default::default()
        };

        let txn = self.db.begin().await?;

        let products_by_sku = self.upsert_products(&txn, feed, &mut counters).await?;
        let orders_by_external = self.upsert_orders(&txn, feed, &mut counters).await?;
        let touched_orders = self
            .upsert_lines(&txn, feed, &products_by_sku, &orders_by_external, &mut counters)
            .await?;

        self.auto_pack_vanished(&txn, &orders_by_external, &mut counters)
            .await?;

        for order_id in touched_orders {
            order_state::derive(&txn, order_id).await?;
        }

        txn.commit().await?;
        Ok(counters)
    }

    async fn upsert_products<C: ConnectionTrait>(
        &self,
        conn: &C,
        feed: &Feed,
        counters: &mut Counters,
    ) -> Result<HashMap<String, product::Model>, ServiceError> {
        let skus: Vec<String> = feed.products.iter().map(|p| p.sku.clone()).collect();
        let existing = product::Entity::find()
            .filter(product::Column::Sku.is_in(skus))
            .all(conn)
            .await?;
        let mut by_sku: HashMap<String, product::Model> = existing
            .into_iter()
            .map(|p| (p.sku.clone(), p))
            .collect();

        for feed_product in &feed.products {
            match by_sku.get(&feed_product.sku).cloned() {
                None => {
                    let created = product::ActiveModel {
                        sku: Set(feed_product.sku.clone()),
                        title: Set(feed_product.title.clone()),
                        category: Set(feed_product.category.clone()),
                        subcategory: Set(feed_product.subcategory.clone()),
                        vendor_name: Set(feed_product.vendor_name.clone()),
                        variation_details: Set(feed_product.variation_details.clone()),
                        image_url: Set(feed_product.image_url.clone()),
                        price: Set(feed_product.price),
                        weight: Set(feed_product.weight.clone()),
                        item_type: Set(feed_product.item_type.clone()),
                        store_quantity_available: Set(feed_product.store_quantity_available),
                        ..Default::default()
                    }
                    .insert(conn)
                    .await?;
                    counters.products_created += 1;
                    by_sku.insert(created.sku.clone(), created);
                }
                Some(current) => {
                    let changed = current.title != feed_product.title
                        || current.category != feed_product.category
                        || current.subcategory != feed_product.subcategory
                        || current.vendor_name != feed_product.vendor_name
                        || current.variation_details != feed_product.variation_details
                        || current.image_url != feed_product.image_url
                        || current.price != feed_product.price
                        || current.weight != feed_product.weight
                        || current.item_type != feed_product.item_type
                        || current.store_quantity_available
                            != feed_product.store_quantity_available;

                    if changed {
                        let mut active: product::ActiveModel = current.into();
                        active.title = Set(feed_product.title.clone());
                        active.category = Set(feed_product.category.clone());
                        active.subcategory = Set(feed_product.subcategory.clone());
                        active.vendor_name = Set(feed_product.vendor_name.clone());
                        active.variation_details = Set(feed_product.variation_details.clone());
                        active.image_url = Set(feed_product.image_url.clone());
                        active.price = Set(feed_product.price);
                        active.weight = Set(feed_product.weight.clone());
                        active.item_type = Set(feed_product.item_type.clone());
                        active.store_quantity_available =
                            Set(feed_product.store_quantity_available);
                        active.updated_at = Set(Some(Utc::now()));
                        let updated = active.update(conn).await?;
                        counters.products_updated += 1;
                        by_sku.insert(updated.sku.clone(), updated);
                    }
                }
            }
        }

        Ok(by_sku)
    }

    // Locally authored fields (status, readiness, packing metadata, customer
    // message, shipment counters) survive re-sync untouched.
    async fn upsert_orders<C: ConnectionTrait>(
        &self,
        conn: &C,
        feed: &Feed,
        counters: &mut Counters,
    ) -> Result<HashMap<String, order::Model>, ServiceError> {
        let external_ids: Vec<String> = feed.orders.iter().map(|o| o.external_id.clone()).collect();
        let existing = order::Entity::find()
            .filter(order::Column::ExternalId.is_in(external_ids))
            .all(conn)
            .await?;
        let mut by_external: HashMap<String, order::Model> = existing
            .into_iter()
            .map(|o| (o.external_id.clone(), o))
            .collect();

        for feed_order in &feed.orders {
            match by_external.get(&feed_order.external_id).cloned() {
                None => {
                    let created = order::ActiveModel {
                        external_id: Set(feed_order.external_id.clone()),
                        number: Set(feed_order.number.clone()),
                        customer_name: Set(feed_order.customer_name.clone()),
                        status: Set(order::STATUS_OPEN.to_string()),
                        ready_to_pack: Set(false),
                        total_shipments: Set(1),
                        current_shipment: Set(1),
                        customer_message: Set(None),
                        email_sent: Set(false),
                        packed_at: Set(None),
                        packed_by: Set(None),
                        created_at: Set(feed_order.created_at.unwrap_or_else(Utc::now)),
                        ..Default::default()
                    }
                    .insert(conn)
                    .await?;
                    counters.orders_created += 1;
                    by_external.insert(created.external_id.clone(), created);
                }
                Some(current) => {
                    if current.is_terminal() {
                        continue;
                    }
                    let changed = current.number != feed_order.number
                        || current.customer_name != feed_order.customer_name;
                    if changed {
                        let mut active: order::ActiveModel = current.into();
                        active.number = Set(feed_order.number.clone());
                        active.customer_name = Set(feed_order.customer_name.clone());
                        active.updated_at = Set(Some(Utc::now()));
                        let updated = active.update(conn).await?;
                        counters.orders_updated += 1;
                        by_external.insert(updated.external_id.clone(), updated);
                    }
                }
            }
        }

        Ok(by_external)
    }

    async fn upsert_lines<C: ConnectionTrait>(
        &self,
        conn: &C,
        feed: &Feed,
        products_by_sku: &HashMap<String, product::Model>,
        orders_by_external: &HashMap<String, order::Model>,
        counters: &mut Counters,
    ) -> Result<Vec<i64>, ServiceError> {
        let order_ids: Vec<i64> = orders_by_external.values().map(|o| o.id).collect();
        let existing = order_line::Entity::find()
            .filter(order_line::Column::OrderId.is_in(order_ids))
            .all(conn)
            .await?;
        let mut by_key: HashMap<(i64, i64), order_line::Model> = existing
            .into_iter()
            .map(|line| ((line.order_id, line.product_id), line))
            .collect();

        let mut touched: Vec<i64> = Vec::new();

        for feed_line in &feed.lines {
            let Some(header) = orders_by_external.get(&feed_line.external_id) else {
                counters.warnings.push(format!(
                    "line for unknown order {}",
                    feed_line.external_id
                ));
                continue;
            };
            if header.is_terminal() {
                continue;
            }
            let Some(item) = products_by_sku.get(&feed_line.sku) else {
                counters
                    .warnings
                    .push(format!("line for unknown SKU {}", feed_line.sku));
                continue;
            };

            match by_key.get(&(header.id, item.id)).cloned() {
                None => {
                    order_line::ActiveModel {
                        order_id: Set(header.id),
                        product_id: Set(item.id),
                        sku: Set(item.sku.clone()),
                        title: Set(item.title.clone()),
                        category: Set(item.category.clone()),
                        image_url: Set(item.image_url.clone()),
                        qty_ordered: Set(feed_line.qty),
                        qty_picked: Set(0),
                        qty_short: Set(0),
                        shipment_batch: Set(1),
                        ..Default::default()
                    }
                    .insert(conn)
                    .await?;
                    counters.items_created += 1;
                    if !touched.contains(&header.id) {
                        touched.push(header.id);
                    }
                }
                Some(current) => {
                    if current.qty_ordered != feed_line.qty {
                        if current.qty_picked + current.qty_short <= feed_line.qty {
                            let mut active: order_line::ActiveModel = current.into();
                            active.qty_ordered = Set(feed_line.qty);
                            active.updated_at = Set(Some(Utc::now()));
                            let updated = active.update(conn).await?;
                            counters.items_updated += 1;
                            by_key.insert((updated.order_id, updated.product_id), updated);
                            if !touched.contains(&header.id) {
                                touched.push(header.id);
                            }
                        } else {
                            // Local progress exceeds the new upstream
                            // quantity; the line is left alone for an
                            // operator to untangle.
                            warn!(
                                order = %header.number,
                                sku = %feed_line.sku,
                                new_qty = feed_line.qty,
                                picked = current.qty_picked,
                                short = current.qty_short,
                                "upstream quantity below local progress"
                            );
                            counters.warnings.push(format!(
                                "order {} SKU {}: upstream qty {} below local progress {}",
                                header.number,
                                feed_line.sku,
                                feed_line.qty,
                                current.qty_picked + current.qty_short
                            ));
                        }
                    }
                }
            }
        }

        Ok(touched)
    }

    // Upstream drops an order from the feed once it is fulfilled externally;
    // local state follows by packing it.
    async fn auto_pack_vanished<C: ConnectionTrait>(
        &self,
        conn: &C,
        orders_by_external: &HashMap<String, order::Model>,
        counters: &mut Counters,
    ) -> Result<(), ServiceError> {
        let candidates = order::Entity::find()
            .filter(order::Column::Status.is_in([
                order::STATUS_OPEN,
                order::STATUS_PICKING,
                order::STATUS_READY_TO_PACK,
            ]))
            .all(conn)
            .await?;

        for header in candidates {
            if orders_by_external.contains_key(&header.external_id) {
                continue;
            }

            let number = header.number.clone();
            let mut active: order::ActiveModel = header.into();
            active.status = Set(order::STATUS_PACKED.to_string());
            active.ready_to_pack = Set(false);
            active.packed_at = Set(Some(Utc::now()));
            active.packed_by = Set(Some(order::PACKED_BY_SYSTEM.to_string()));
            active.updated_at = Set(Some(Utc::now()));
            active.update(conn).await?;

            counters.orders_auto_packed += 1;
            info!(order = %number, "auto-packed order absent from upstream feed");
        }

        Ok(())
    }
}

//! Client for the upstream catalog/orders API.
//!
//! The upstream document is a four-level tree (categories → subcategories →
//! items → orders). The same external order id appears once per product it
//! contains; the client never deduplicates — [`flatten`] handles the fan-in
//! into distinct product, order and line streams for the import engine.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream malformed: {0}")]
    Malformed(String),
}

/// Top-level upstream response document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub items_by_category: Vec<Category>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    #[serde(default = "uncategorized")]
    pub category_name: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn uncategorized() -> String {
    "Uncategorized".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subcategory {
    #[serde(default)]
    pub subcategory_name: String,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One product node. SKU may arrive as a string or a bare number, or be
/// missing entirely; normalization happens during flattening.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub sku: Option<Value>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub variation_details: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub store_quantity_available: Option<i32>,
    #[serde(default)]
    pub orders: Vec<ItemOrder>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One order leaf under an item.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemOrder {
    pub order_id: Value,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default = "unknown_customer")]
    pub customer_name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn unknown_customer() -> String {
    "Unknown".to_string()
}

fn default_quantity() -> i32 {
    1
}

/// Flattened product stream entry, deduped by SKU.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedProduct {
    pub sku: String,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub vendor_name: Option<String>,
    pub variation_details: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
    pub weight: Option<String>,
    pub item_type: String,
    pub store_quantity_available: i32,
}

/// Flattened order stream entry, deduped by external id.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedOrder {
    pub external_id: String,
    pub number: String,
    pub customer_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Flattened line entry keyed `(external_id, sku)`; quantities summed over
/// duplicate appearances of the same pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedLine {
    pub external_id: String,
    pub sku: String,
    pub qty: i32,
}

/// The three streams the import engine consumes.
#[derive(Debug, Default)]
pub struct Feed {
    pub products: Vec<FeedProduct>,
    pub orders: Vec<FeedOrder>,
    pub lines: Vec<FeedLine>,
    /// Per-item problems encountered while flattening (counted as sync
    /// warnings, never fatal).
    pub warnings: Vec<String>,
}

/// Flattens the nested document into the importer's three streams.
pub fn flatten(document: &Document) -> Feed {
    let mut products: BTreeMap<String, FeedProduct> = BTreeMap::new();
    let mut orders: BTreeMap<String, FeedOrder> = BTreeMap::new();
    let mut lines: BTreeMap<(String, String), i32> = BTreeMap::new();
    let mut warnings = Vec::new();

    for category in &document.items_by_category {
        if !category.extra.is_empty() {
            debug!(
                category = %category.category_name,
                keys = ?category.extra.keys().collect::<Vec<_>>(),
                "dropping unknown category fields"
            );
        }

        for subcategory in &category.subcategories {
            for item in &subcategory.items {
                let sku = match normalize_sku(item) {
                    Ok(sku) => sku,
                    Err(problem) => {
                        warnings.push(problem);
                        continue;
                    }
                };

                let subcat = if subcategory.subcategory_name.is_empty() {
                    None
                } else {
                    Some(subcategory.subcategory_name.clone())
                };

                products.entry(sku.clone()).or_insert_with(|| FeedProduct {
                    sku: sku.clone(),
                    title: item.title.clone(),
                    category: category.category_name.clone(),
                    subcategory: subcat,
                    vendor_name: item.vendor_name.clone().filter(|v| !v.is_empty()),
                    variation_details: item.variation_details.clone().filter(|v| !v.is_empty()),
                    image_url: item.image_url.clone(),
                    price: item.price,
                    weight: item.weight.as_ref().map(value_to_string),
                    item_type: item
                        .item_type
                        .clone()
                        .unwrap_or_else(|| "product".to_string()),
                    store_quantity_available: item.store_quantity_available.unwrap_or(0),
                });

                for order in &item.orders {
                    let external_id = value_to_string(&order.order_id);
                    if external_id.is_empty() {
                        warnings.push(format!("order with empty id under SKU {sku}"));
                        continue;
                    }
                    if order.quantity <= 0 {
                        warnings.push(format!(
                            "non-positive quantity {} for order {} SKU {}",
                            order.quantity, external_id, sku
                        ));
                        continue;
                    }

                    orders
                        .entry(external_id.clone())
                        .or_insert_with(|| FeedOrder {
                            external_id: external_id.clone(),
                            number: order
                                .number
                                .clone()
                                .filter(|n| !n.is_empty())
                                .unwrap_or_else(|| external_id.clone()),
                            customer_name: order.customer_name.clone(),
                            created_at: order.created_at,
                        });

                    *lines.entry((external_id, sku.clone())).or_insert(0) += order.quantity;
                }
            }
        }
    }

    Feed {
        products: products.into_values().collect(),
        orders: orders.into_values().collect(),
        lines: lines
            .into_iter()
            .map(|((external_id, sku), qty)| FeedLine {
                external_id,
                sku,
                qty,
            })
            .collect(),
        warnings,
    }
}

// SKU may be a string, a number, or missing. A missing SKU is synthesized
// from the title so the line is not silently dropped.
fn normalize_sku(item: &Item) -> Result<String, String> {
    let raw = item.sku.as_ref().map(value_to_string).unwrap_or_default();
    if !raw.is_empty() {
        return Ok(raw);
    }

    if item.title.is_empty() {
        return Err("item with neither SKU nor title".to_string());
    }

    let synthesized: String = item
        .title
        .chars()
        .take(20)
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    warn!(title = %item.title, sku = %synthesized, "item missing SKU, synthesized from title");
    Ok(format!("NO_SKU_{synthesized}"))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// HTTP client for the upstream API. No retries here; the scheduler owns
/// retry cadence.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to build client: {e}")))?;
        Ok(Self::with_client(client))
    }

    /// Build from an existing client (useful for testing).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetches and validates the upstream document in one shot.
    #[instrument(skip(self, api_key))]
    pub async fn fetch(&self, base_url: &str, api_key: &str) -> Result<Document, UpstreamError> {
        if base_url.is_empty() {
            return Err(UpstreamError::Unavailable(
                "upstream base URL is not configured".to_string(),
            ));
        }

        let mut request = self.client.get(base_url);
        if !api_key.is_empty() {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "upstream returned {status}"
            )));
        }

        let document: Document = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        if !document.success {
            return Err(UpstreamError::Malformed(
                "upstream response indicates failure".to_string(),
            ));
        }

        if !document.extra.is_empty() {
            debug!(keys = ?document.extra.keys().collect::<Vec<_>>(), "dropping unknown document fields");
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Document {
        serde_json::from_value(value).expect("document should parse")
    }

    #[test]
    fn flatten_fans_in_duplicate_orders() {
        let doc = parse(json!({
            "success": true,
            "items_by_category": [{
                "category_name": "Pantry",
                "subcategories": [{
                    "subcategory_name": "Snacks",
                    "items": [
                        {
                            "sku": "SKU-1",
                            "title": "Crackers",
                            "orders": [
                                {"order_id": "A", "customer_name": "Ada", "quantity": 2},
                                {"order_id": "B", "customer_name": "Bo", "quantity": 1}
                            ]
                        },
                        {
                            "sku": "SKU-2",
                            "title": "Olives",
                            "orders": [
                                {"order_id": "A", "customer_name": "Ada", "quantity": 3}
                            ]
                        }
                    ]
                }]
            }]
        }));

        let feed = flatten(&doc);
        assert_eq!(feed.products.len(), 2);
        // Order A appears under both items but is one distinct order.
        assert_eq!(feed.orders.len(), 2);
        assert_eq!(feed.lines.len(), 3);
        assert!(feed.warnings.is_empty());
    }

    #[test]
    fn flatten_sums_duplicate_line_appearances() {
        let doc = parse(json!({
            "success": true,
            "items_by_category": [{
                "category_name": "Pantry",
                "subcategories": [{
                    "subcategory_name": "",
                    "items": [{
                        "sku": "SKU-1",
                        "title": "Crackers",
                        "orders": [
                            {"order_id": "A", "customer_name": "Ada", "quantity": 2},
                            {"order_id": "A", "customer_name": "Ada", "quantity": 3}
                        ]
                    }]
                }]
            }]
        }));

        let feed = flatten(&doc);
        assert_eq!(feed.lines.len(), 1);
        assert_eq!(feed.lines[0].qty, 5);
    }

    #[test]
    fn flatten_normalizes_numeric_skus_and_order_ids() {
        let doc = parse(json!({
            "success": true,
            "items_by_category": [{
                "category_name": "Pantry",
                "subcategories": [{
                    "subcategory_name": "",
                    "items": [{
                        "sku": 1042,
                        "title": "Crackers",
                        "orders": [{"order_id": 77, "customer_name": "Ada", "quantity": 1}]
                    }]
                }]
            }]
        }));

        let feed = flatten(&doc);
        assert_eq!(feed.products[0].sku, "1042");
        assert_eq!(feed.orders[0].external_id, "77");
        assert_eq!(feed.orders[0].number, "77");
    }

    #[test]
    fn flatten_synthesizes_missing_sku_and_warns_on_bad_quantity() {
        let doc = parse(json!({
            "success": true,
            "items_by_category": [{
                "category_name": "Pantry",
                "subcategories": [{
                    "subcategory_name": "",
                    "items": [{
                        "title": "Mystery Item",
                        "orders": [
                            {"order_id": "A", "customer_name": "Ada", "quantity": 0}
                        ]
                    }]
                }]
            }]
        }));

        let feed = flatten(&doc);
        assert_eq!(feed.products.len(), 1);
        assert!(feed.products[0].sku.starts_with("NO_SKU_"));
        // zero quantity is a warning, not a line
        assert!(feed.lines.is_empty());
        assert_eq!(feed.warnings.len(), 1);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let doc = parse(json!({
            "success": true,
            "generated_at": "2024-06-01T00:00:00Z",
            "items_by_category": [{
                "category_name": "Pantry",
                "color": "blue",
                "subcategories": []
            }]
        }));
        assert_eq!(doc.extra.len(), 1);
        let feed = flatten(&doc);
        assert!(feed.products.is_empty());
    }
}

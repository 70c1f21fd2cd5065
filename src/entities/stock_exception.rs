use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Shortage report: one row per `mark_short` call, snapshotting product
/// title/category and the affected order numbers at reporting time.
/// `order_numbers` is a denormalized JSON list, not a foreign-key relation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_exceptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub sku: String,
    pub product_title: String,
    pub category: String,
    pub vendor_name: Option<String>,
    pub qty_short: i32,

    #[sea_orm(column_type = "Json")]
    pub order_numbers: Json,

    pub reported_by: String,
    pub timestamp: DateTime<Utc>,

    pub resolved: bool,
    pub ordered_from_company: bool,
    pub na_cancel: bool,

    pub notes: String,
}

impl Model {
    /// Order numbers as strings, tolerating a malformed JSON payload.
    pub fn order_number_list(&self) -> Vec<String> {
        self.order_numbers
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if insert {
            if let ActiveValue::NotSet = active_model.timestamp {
                active_model.timestamp = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

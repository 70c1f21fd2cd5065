use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// One row per sync run. The `in_progress` row doubles as the advisory
/// single-flight check for concurrent sync triggers.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,

    pub orders_fetched: i32,
    pub orders_created: i32,
    pub orders_updated: i32,
    pub orders_auto_packed: i32,
    pub products_created: i32,
    pub products_updated: i32,
    pub items_created: i32,
    pub items_updated: i32,
    pub warnings: i32,

    pub error_message: Option<String>,

    #[sea_orm(column_type = "Json")]
    pub detailed_errors: Json,

    pub triggered_by: Option<String>,
}

impl Model {
    pub fn duration_secs(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_seconds())
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
            if let ActiveValue::NotSet = active_model.started_at {
                active_model.started_at = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

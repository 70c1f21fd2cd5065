use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

// Order lifecycle states. `status` is stored as one of these strings.
pub const STATUS_OPEN: &str = "open";
pub const STATUS_PICKING: &str = "picking";
pub const STATUS_READY_TO_PACK: &str = "ready_to_pack";
pub const STATUS_PACKED: &str = "packed";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Attribution recorded on `packed_by` when the importer auto-packs an order
/// that disappeared from the upstream feed.
pub const PACKED_BY_SYSTEM: &str = "system";

/// Order header. `ready_to_pack` is a derived cache of "current shipment
/// batch complete" and is only written by the state derivation or explicit
/// operator transitions.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
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
}

impl Model {
    /// Terminal orders are never touched by pick allocation or re-sync.
    pub fn is_terminal(&self) -> bool {
        self.status == STATUS_PACKED || self.status == STATUS_CANCELLED
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line::Entity")]
    OrderLine,
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLine.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub const KIND_PICK: &str = "pick";
pub const KIND_SHORT: &str = "short";
pub const KIND_REVERT: &str = "revert";

/// Append-only audit row for every pick, short and revert action.
/// `delta_qty` is signed: positive for pick/short, negative for revert.
/// Rows are never mutated or deleted; the FK to order_lines is RESTRICT so
/// the trail survives accidental order deletes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pick_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub order_line_id: i64,
    pub delta_qty: i32,
    pub kind: String,
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_line::Entity",
        from = "Column::OrderLineId",
        to = "super::order_line::Column::Id",
        on_delete = "Restrict"
    )]
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
        if insert {
            if let ActiveValue::NotSet = active_model.timestamp {
                active_model.timestamp = Set(Utc::now());
            }
        }
        Ok(active_model)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

pub const SINGLETON_ID: i64 = 1;

/// SMTP and SMS credentials for the out-of-stock notifier. Single row with
/// `id = 1`; superadmin-only read/write.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifier_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    pub email_enabled: bool,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_use_tls: bool,
    pub smtp_use_ssl: bool,
    pub smtp_username: String,
    #[serde(skip_serializing)]
    pub smtp_password: String,
    pub from_email: String,

    #[sea_orm(column_type = "Json")]
    pub email_recipients: Json,

    pub sms_enabled: bool,
    pub twilio_account_sid: String,
    #[serde(skip_serializing)]
    pub twilio_auth_token: String,
    pub twilio_from_number: String,

    #[sea_orm(column_type = "Json")]
    pub sms_recipients: Json,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn email_recipient_list(&self) -> Vec<String> {
        json_string_list(&self.email_recipients)
    }

    pub fn sms_recipient_list(&self) -> Vec<String> {
        json_string_list(&self.sms_recipients)
    }
}

fn json_string_list(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
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

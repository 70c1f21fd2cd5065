use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::db::DbPool;
use crate::entities::{api_config, notifier_config};
use crate::errors::ServiceError;
use crate::services::supports_row_locks;

const DEFAULT_SYNC_INTERVAL_MINUTES: i32 = 10;

/// Partial update for the upstream API settings. `None` leaves a field as is.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApiConfig {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub sync_interval_minutes: Option<i32>,
    pub auto_sync_enabled: Option<bool>,
}

/// Partial update for the notifier settings.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateNotifierConfig {
    pub email_enabled: Option<bool>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_use_tls: Option<bool>,
    pub smtp_use_ssl: Option<bool>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,
    pub email_recipients: Option<Vec<String>>,
    pub sms_enabled: Option<bool>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    pub sms_recipients: Option<Vec<String>>,
}

/// Sync status view returned by `/admin/sync-status`.
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: String,
    pub last_sync_message: String,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: i32,
}

/// Access to the two one-row configuration tables. Rows are created with
/// defaults on first read; writes take an exclusive row lock.
#[derive(Clone)]
pub struct SettingsService {
    db: Arc<DbPool>,
}

impl SettingsService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn api_config(&self) -> Result<api_config::Model, ServiceError> {
        if let Some(existing) = api_config::Entity::find_by_id(api_config::SINGLETON_ID)
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        // First boot: seed from the environment where provided.
        let seeded = api_config::ActiveModel {
            id: Set(api_config::SINGLETON_ID),
            api_base_url: Set(std::env::var("UPSTREAM_API_URL").unwrap_or_default()),
            api_key: Set(std::env::var("UPSTREAM_API_KEY").unwrap_or_default()),
            sync_interval_minutes: Set(DEFAULT_SYNC_INTERVAL_MINUTES),
            auto_sync_enabled: Set(true),
            last_sync_at: Set(None),
            last_sync_status: Set(api_config::SYNC_STATUS_NEVER.to_string()),
            last_sync_message: Set(String::new()),
            created_at: Set(Utc::now()),
            updated_at: Set(Some(Utc::now())),
        };
        let created = seeded.insert(&*self.db).await?;
        info!("api configuration initialized with defaults");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update_api_config(
        &self,
        update: UpdateApiConfig,
    ) -> Result<api_config::Model, ServiceError> {
        if let Some(interval) = update.sync_interval_minutes {
            if interval < 1 {
                return Err(ServiceError::Validation(
                    "sync interval must be at least one minute".to_string(),
                ));
            }
        }

        // Ensure the row exists before locking it.
        self.api_config().await?;

        let txn = self.db.begin().await?;
        let current = lock_singleton::<api_config::Entity, _>(&txn, api_config::SINGLETON_ID)
            .await?
            .ok_or_else(|| ServiceError::Internal("api configuration row missing".to_string()))?;

        let mut active: api_config::ActiveModel = current.into();
        if let Some(url) = update.api_base_url {
            active.api_base_url = Set(url);
        }
        if let Some(key) = update.api_key {
            active.api_key = Set(key);
        }
        if let Some(interval) = update.sync_interval_minutes {
            active.sync_interval_minutes = Set(interval);
        }
        if let Some(enabled) = update.auto_sync_enabled {
            active.auto_sync_enabled = Set(enabled);
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!("api configuration updated");
        Ok(updated)
    }

    pub async fn notifier_config(&self) -> Result<notifier_config::Model, ServiceError> {
        if let Some(existing) = notifier_config::Entity::find_by_id(notifier_config::SINGLETON_ID)
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let seeded = notifier_config::ActiveModel {
            id: Set(notifier_config::SINGLETON_ID),
            email_enabled: Set(false),
            smtp_host: Set(String::new()),
            smtp_port: Set(587),
            smtp_use_tls: Set(true),
            smtp_use_ssl: Set(false),
            smtp_username: Set(String::new()),
            smtp_password: Set(std::env::var("SMTP_PASSWORD").unwrap_or_default()),
            from_email: Set(String::new()),
            email_recipients: Set(json!([])),
            sms_enabled: Set(false),
            twilio_account_sid: Set(String::new()),
            twilio_auth_token: Set(std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default()),
            twilio_from_number: Set(String::new()),
            sms_recipients: Set(json!([])),
            created_at: Set(Utc::now()),
            updated_at: Set(Some(Utc::now())),
        };
        let created = seeded.insert(&*self.db).await?;
        info!("notifier configuration initialized with defaults");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update_notifier_config(
        &self,
        update: UpdateNotifierConfig,
    ) -> Result<notifier_config::Model, ServiceError> {
        self.notifier_config().await?;

        let txn = self.db.begin().await?;
        let current =
            lock_singleton::<notifier_config::Entity, _>(&txn, notifier_config::SINGLETON_ID)
                .await?
                .ok_or_else(|| {
                    ServiceError::Internal("notifier configuration row missing".to_string())
                })?;

        let mut active: notifier_config::ActiveModel = current.into();
        if let Some(v) = update.email_enabled {
            active.email_enabled = Set(v);
        }
        if let Some(v) = update.smtp_host {
            active.smtp_host = Set(v);
        }
        if let Some(v) = update.smtp_port {
            active.smtp_port = Set(v);
        }
        if let Some(v) = update.smtp_use_tls {
            active.smtp_use_tls = Set(v);
        }
        if let Some(v) = update.smtp_use_ssl {
            active.smtp_use_ssl = Set(v);
        }
        if let Some(v) = update.smtp_username {
            active.smtp_username = Set(v);
        }
        if let Some(v) = update.smtp_password {
            active.smtp_password = Set(v);
        }
        if let Some(v) = update.from_email {
            active.from_email = Set(v);
        }
        if let Some(v) = update.email_recipients {
            active.email_recipients = Set(json!(v));
        }
        if let Some(v) = update.sms_enabled {
            active.sms_enabled = Set(v);
        }
        if let Some(v) = update.twilio_account_sid {
            active.twilio_account_sid = Set(v);
        }
        if let Some(v) = update.twilio_auth_token {
            active.twilio_auth_token = Set(v);
        }
        if let Some(v) = update.twilio_from_number {
            active.twilio_from_number = Set(v);
        }
        if let Some(v) = update.sms_recipients {
            active.sms_recipients = Set(json!(v));
        }
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!("notifier configuration updated");
        Ok(updated)
    }

    pub async fn sync_status(&self) -> Result<SyncStatus, ServiceError> {
        let config = self.api_config().await?;
        Ok(SyncStatus {
            last_sync_at: config.last_sync_at,
            last_sync_status: config.last_sync_status,
            last_sync_message: config.last_sync_message,
            auto_sync_enabled: config.auto_sync_enabled,
            sync_interval_minutes: config.sync_interval_minutes,
        })
    }

    /// Stamps the last-sync metadata. Called by the import engine on both
    /// success and failure.
    pub async fn stamp_sync_result(
        &self,
        status: &str,
        message: &str,
    ) -> Result<(), ServiceError> {
        let current = self.api_config().await?;
        let mut active: api_config::ActiveModel = current.into();
        active.last_sync_at = Set(Some(Utc::now()));
        active.last_sync_status = Set(status.to_string());
        active.last_sync_message = Set(message.to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;
        Ok(())
    }
}

async fn lock_singleton<E, C>(conn: &C, id: i64) -> Result<Option<E::Model>, ServiceError>
where
    E: EntityTrait,
    E::PrimaryKey: sea_orm::PrimaryKeyTrait<ValueType = i64>,
    C: ConnectionTrait,
{
    let mut query = E::find_by_id(id);
    if supports_row_locks(conn) {
        query = query.lock_exclusive();
    }
    Ok(query.one(conn).await?)
}

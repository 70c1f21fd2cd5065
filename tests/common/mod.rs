#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};

use pickhouse_api::auth::{self, user, Role};
use pickhouse_api::config::AppConfig;
use pickhouse_api::db::{self, DbConfig, DbPool};
use pickhouse_api::entities::{order, order_line, product};
use pickhouse_api::upstream::Document;
use pickhouse_api::AppState;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Test harness: real service stack over a private in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = test_config();

        // One connection keeps the in-memory database alive and private to
        // this TestApp.
        let db_config = DbConfig {
            url: config.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), config).expect("failed to build app state");
        Self { state }
    }

    pub fn db(&self) -> &Arc<DbPool> {
        &self.state.db
    }

    pub async fn seed_user(&self, username: &str, role: Role) -> user::Model {
        let now = Utc::now();
        user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(auth::hash_password(TEST_PASSWORD).unwrap()),
            role: Set(role.as_str().to_string()),
            phone: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&**self.db())
        .await
        .expect("failed to seed user")
    }

    pub async fn seed_product(&self, sku: &str, title: &str, category: &str) -> product::Model {
        product::ActiveModel {
            sku: Set(sku.to_string()),
            title: Set(title.to_string()),
            category: Set(category.to_string()),
            subcategory: Set(None),
            vendor_name: Set(None),
            variation_details: Set(None),
            image_url: Set(None),
            price: Set(None),
            weight: Set(None),
            item_type: Set("product".to_string()),
            store_quantity_available: Set(0),
            ..Default::default()
        }
        .insert(&**self.db())
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_order(
        &self,
        external_id: &str,
        number: &str,
        created_at: DateTime<Utc>,
    ) -> order::Model {
        order::ActiveModel {
            external_id: Set(external_id.to_string()),
            number: Set(number.to_string()),
            customer_name: Set(format!("Customer {number}")),
            status: Set(order::STATUS_OPEN.to_string()),
            ready_to_pack: Set(false),
            total_shipments: Set(1),
            current_shipment: Set(1),
            customer_message: Set(None),
            email_sent: Set(false),
            packed_at: Set(None),
            packed_by: Set(None),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(&**self.db())
        .await
        .expect("failed to seed order")
    }

    pub async fn seed_line(
        &self,
        header: &order::Model,
        item: &product::Model,
        qty_ordered: i32,
    ) -> order_line::Model {
        order_line::ActiveModel {
            order_id: Set(header.id),
            product_id: Set(item.id),
            sku: Set(item.sku.clone()),
            title: Set(item.title.clone()),
            category: Set(item.category.clone()),
            image_url: Set(None),
            qty_ordered: Set(qty_ordered),
            qty_picked: Set(0),
            qty_short: Set(0),
            shipment_batch: Set(1),
            ..Default::default()
        }
        .insert(&**self.db())
        .await
        .expect("failed to seed order line")
    }

    pub async fn reload_order(&self, id: i64) -> order::Model {
        use sea_orm::EntityTrait;
        order::Entity::find_by_id(id)
            .one(&**self.db())
            .await
            .unwrap()
            .expect("order should exist")
    }

    pub async fn reload_line(&self, id: i64) -> order_line::Model {
        use sea_orm::EntityTrait;
        order_line::Entity::find_by_id(id)
            .one(&**self.db())
            .await
            .unwrap()
            .expect("order line should exist")
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        jwt_secret: "test_secret_key_for_testing_purposes_32".to_string(),
        jwt_expiration_secs: 3600,
        refresh_token_expiration_secs: 86_400,
        request_timeout_secs: 10,
        upstream_timeout_secs: 30,
        log_level: "info".to_string(),
        auto_migrate: true,
        bootstrap_admin_username: None,
        bootstrap_admin_password: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
    }
}

/// Builds an upstream document from raw JSON.
pub fn document(value: serde_json::Value) -> Document {
    serde_json::from_value(value).expect("test document should deserialize")
}

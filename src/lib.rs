//! Warehouse order-picking coordinator.
//!
//! Pulls outstanding commerce orders from an upstream catalog API, aggregates
//! them into a SKU-oriented pick list, distributes pick and shortage actions
//! across order lines in FIFO order, and drives each order through
//! `open → picking → ready_to_pack → packed` with shipment-batch sub-states.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod scheduler;
pub mod services;
pub mod upstream;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, patch, post, put};
use axum::Router;

use crate::auth::{AuthService, TokenVerifier};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub services: AppServices,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> Result<Self, ServiceError> {
        let services = AppServices::new(
            db.clone(),
            std::time::Duration::from_secs(config.upstream_timeout_secs),
        )?;
        let auth = AuthService::new(
            db.clone(),
            &config.jwt_secret,
            config.jwt_expiration_secs,
            config.refresh_token_expiration_secs,
        );
        Ok(Self {
            db,
            config,
            services,
            auth,
        })
    }
}

// Lets the AuthUser extractor pull the verifier out of any handler's state.
impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.auth.verifier()
    }
}

/// The full `/api` surface.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Authentication
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/change-password", post(handlers::auth::change_password))
        // Pick list
        .route("/picklist", get(handlers::picklist::pick_list))
        .route("/picklist/stats", get(handlers::picklist::pick_list_stats))
        .route("/picklist/{sku}/orders", get(handlers::picklist::orders_for_sku))
        .route("/pick", post(handlers::picklist::pick))
        .route("/not-in-stock", post(handlers::picklist::not_in_stock))
        .route("/picked-items", get(handlers::picklist::picked_items))
        .route(
            "/picked-items/{id}/revert",
            post(handlers::picklist::revert_picked_item),
        )
        .route("/pick-events", get(handlers::picklist::pick_events))
        // Orders
        .route("/orders/status", get(handlers::orders::status_list))
        .route("/orders/ready-to-pack", get(handlers::orders::ready_to_pack_list))
        .route("/orders/packed", get(handlers::orders::packed_list))
        .route("/orders/{id}", get(handlers::orders::order_detail))
        .route("/orders/{id}/mark-packed", post(handlers::orders::mark_packed))
        .route(
            "/orders/{id}/revert-to-picking",
            post(handlers::orders::revert_to_picking),
        )
        .route("/orders/{id}/change-state", post(handlers::orders::change_state))
        .route(
            "/orders/{id}/update-message",
            patch(handlers::orders::update_message),
        )
        .route("/orders/{id}/split", post(handlers::orders::split))
        .route("/orders/{id}/unsplit", post(handlers::orders::unsplit))
        // Out of stock
        .route("/out-of-stock", get(handlers::stock::list))
        .route("/out-of-stock/export", get(handlers::stock::export))
        .route("/out-of-stock/send", post(handlers::stock::send_notification))
        .route("/out-of-stock/{id}/resolve", post(handlers::stock::resolve))
        .route(
            "/out-of-stock/{id}/toggle-ordered",
            post(handlers::stock::toggle_ordered),
        )
        .route(
            "/out-of-stock/{id}/toggle-na-cancel",
            post(handlers::stock::toggle_na_cancel),
        )
        // Admin
        .route("/admin/sync", post(handlers::admin::trigger_sync))
        .route("/admin/sync-status", get(handlers::admin::sync_status))
        .route("/sync-logs", get(handlers::admin::sync_logs))
        .route(
            "/admin/settings",
            get(handlers::admin::get_settings).put(handlers::admin::put_settings),
        )
        .route(
            "/admin/email-sms-settings",
            get(handlers::admin::get_notifier_settings)
                .put(handlers::admin::put_notifier_settings),
        )
        .route("/admin/test-email", post(handlers::admin::test_email))
        .route("/admin/test-sms", post(handlers::admin::test_sms))
        // Users
        .route(
            "/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/users/{id}",
            put(handlers::users::update).delete(handlers::users::delete),
        )
        .route(
            "/users/{id}/reset-password",
            post(handlers::users::reset_password),
        )
}

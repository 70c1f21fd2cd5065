pub mod admin;
pub mod auth;
pub mod common;
pub mod orders;
pub mod picklist;
pub mod stock;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::services::import::ImportService;
use crate::services::notifications::NotificationService;
use crate::services::order_state::OrderStateService;
use crate::services::picking::PickService;
use crate::services::settings::SettingsService;
use crate::services::stock_exceptions::StockExceptionService;
use crate::services::users::UserService;
use crate::upstream::UpstreamClient;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub picking: Arc<PickService>,
    pub order_state: Arc<OrderStateService>,
    pub stock_exceptions: Arc<StockExceptionService>,
    pub import: Arc<ImportService>,
    pub settings: Arc<SettingsService>,
    pub notifications: Arc<NotificationService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, upstream_timeout: Duration) -> Result<Self, ServiceError> {
        let settings = SettingsService::new(db.clone());
        let stock_exceptions = StockExceptionService::new(db.clone());
        let upstream_client = UpstreamClient::new(upstream_timeout)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(Self {
            picking: Arc::new(PickService::new(db.clone())),
            order_state: Arc::new(OrderStateService::new(db.clone())),
            stock_exceptions: Arc::new(stock_exceptions.clone()),
            import: Arc::new(ImportService::new(
                db.clone(),
                upstream_client,
                settings.clone(),
            )),
            settings: Arc::new(settings.clone()),
            notifications: Arc::new(NotificationService::new(settings, stock_exceptions)),
            users: Arc::new(UserService::new(db)),
        })
    }
}

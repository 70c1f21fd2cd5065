use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::auth::{self, user, Role};
use crate::db::DbPool;
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 64, message = "username must be 2-64 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

/// Operator account management.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Username)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: i64) -> Result<user::Model, ServiceError> {
        user::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id} not found")))
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;

        let role: Role = request.role.as_deref().unwrap_or("staff").parse()?;

        let exists = user::Entity::find()
            .filter(user::Column::Username.eq(request.username.clone()))
            .one(&*self.db)
            .await?;
        if exists.is_some() {
            return Err(ServiceError::Conflict(format!(
                "username {} is already taken",
                request.username
            )));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            username: Set(request.username.clone()),
            password_hash: Set(auth::hash_password(&request.password)?),
            role: Set(role.as_str().to_string()),
            phone: Set(request.phone),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = created.id, "user created");
        Ok(created)
    }

    #[instrument(skip(self, request), fields(user_id = id))]
    pub async fn update(
        &self,
        id: i64,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        let current = self.get(id).await?;

        let mut active: user::ActiveModel = current.into();
        if let Some(role) = request.role {
            let role: Role = role.parse()?;
            active.role = Set(role.as_str().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(user_id = id))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let current = self.get(id).await?;
        current.delete(&*self.db).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Admin reset of another user's password.
    #[instrument(skip(self, new_password), fields(user_id = id))]
    pub async fn reset_password(&self, id: i64, new_password: &str) -> Result<(), ServiceError> {
        if new_password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let current = self.get(id).await?;
        let mut active: user::ActiveModel = current.into();
        active.password_hash = Set(auth::hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(user_id = id, "password reset");
        Ok(())
    }

    /// Self-service password change; requires the current password.
    #[instrument(skip(self, current_password, new_password), fields(user_id = id))]
    pub async fn change_password(
        &self,
        id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.len() < 8 {
            return Err(ServiceError::Validation(
                "password must be at least 8 characters".to_string(),
            ));
        }

        let current = self.get(id).await?;
        if !auth::verify_password(current_password, &current.password_hash)? {
            return Err(ServiceError::Validation(
                "current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = current.into();
        active.password_hash = Set(auth::hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(user_id = id, "password changed");
        Ok(())
    }

    /// Creates the bootstrap superadmin when the users table is empty.
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(), ServiceError> {
        let existing = user::Entity::find().one(&*self.db).await?;
        if existing.is_some() {
            return Ok(());
        }

        let now = Utc::now();
        user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(auth::hash_password(password)?),
            role: Set(Role::Superadmin.as_str().to_string()),
            phone: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(username = %username, "bootstrap superadmin created");
        Ok(())
    }
}

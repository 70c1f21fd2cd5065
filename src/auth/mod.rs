/*!
 * Authentication and authorization.
 *
 * Bearer JWT access tokens plus persisted, hashed refresh tokens with
 * rotation. Role-based gates follow the three-tier operator model:
 * `staff < admin < superadmin`.
 */

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::ServiceError;

pub mod refresh_token;
pub mod user;

const REFRESH_TOKEN_BYTES: usize = 48;

/// Operator role lattice. Ordering is meaningful: a higher role implies every
/// capability of the roles below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(ServiceError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// Claim structure for access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated operator extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn has_at_least(&self, role: Role) -> bool {
        self.role >= role
    }

    /// Gate for admin-and-above capabilities (order-state reversals,
    /// split/unsplit, user management).
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.has_at_least(Role::Admin) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "admin role required".to_string(),
            ))
        }
    }

    /// Gate for superadmin-only capabilities (settings, sync trigger).
    pub fn require_superadmin(&self) -> Result<(), ServiceError> {
        if self.has_at_least(Role::Superadmin) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "superadmin role required".to_string(),
            ))
        }
    }
}

/// Stateless token verifier handed to the request extractor.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

        let user_id: i64 = data
            .claims
            .sub
            .parse()
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".to_string()))?;
        let role: Role = data.claims.role.parse().map_err(|_| {
            ServiceError::Unauthorized("invalid role claim".to_string())
        })?;

        Ok(AuthUser {
            user_id,
            username: data.claims.username,
            role,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenVerifier: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = TokenVerifier::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing authorization header".to_string())
            })?;

        let token = header_value.strip_prefix("Bearer ").ok_or_else(|| {
            ServiceError::Unauthorized("authorization header must be a bearer token".to_string())
        })?;

        verifier.verify(token)
    }
}

/// Token pair returned by login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: &'static str,
}

/// Issues and rotates tokens, verifies credentials.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DbPool>,
    encoding_key: Arc<EncodingKey>,
    verifier: TokenVerifier,
    access_token_ttl_secs: i64,
    refresh_token_ttl_secs: i64,
}

impl AuthService {
    pub fn new(
        db: Arc<DbPool>,
        jwt_secret: &str,
        access_token_ttl_secs: u64,
        refresh_token_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            encoding_key: Arc::new(EncodingKey::from_secret(jwt_secret.as_bytes())),
            verifier: TokenVerifier::new(jwt_secret),
            access_token_ttl_secs: access_token_ttl_secs as i64,
            refresh_token_ttl_secs: refresh_token_ttl_secs as i64,
        }
    }

    pub fn verifier(&self) -> TokenVerifier {
        self.verifier.clone()
    }

    /// Verifies credentials and issues a token pair.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(user::Model, TokenPair), ServiceError> {
        let account = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("invalid credentials".to_string()))?;

        if !account.active {
            warn!(username = %username, "login attempt for inactive account");
            return Err(ServiceError::Unauthorized("invalid credentials".to_string()));
        }

        if !verify_password(password, &account.password_hash)? {
            return Err(ServiceError::Unauthorized("invalid credentials".to_string()));
        }

        let pair = self.issue_tokens(&account).await?;
        Ok((account, pair))
    }

    /// Rotates a refresh token: revokes the presented one, issues a new pair.
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, ServiceError> {
        let hash = hash_refresh_token(presented);

        let stored = refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenHash.eq(hash.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("unknown refresh token".to_string()))?;

        if stored.revoked || stored.expires_at < Utc::now() {
            return Err(ServiceError::Unauthorized(
                "refresh token expired or revoked".to_string(),
            ));
        }

        let account = user::Entity::find_by_id(stored.user_id)
            .one(&*self.db)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| ServiceError::Unauthorized("account disabled".to_string()))?;

        let mut revoke: refresh_token::ActiveModel = stored.into();
        revoke.revoked = Set(true);
        revoke.update(&*self.db).await?;

        self.issue_tokens(&account).await
    }

    /// Revokes a refresh token. Idempotent; an unknown token is a no-op.
    pub async fn logout(&self, presented: &str) -> Result<(), ServiceError> {
        let hash = hash_refresh_token(presented);

        if let Some(stored) = refresh_token::Entity::find()
            .filter(refresh_token::Column::TokenHash.eq(hash))
            .one(&*self.db)
            .await?
        {
            let mut active: refresh_token::ActiveModel = stored.into();
            active.revoked = Set(true);
            active.update(&*self.db).await?;
        } else {
            debug!("logout with unknown refresh token");
        }

        Ok(())
    }

    async fn issue_tokens(&self, account: &user::Model) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            role: account.role.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ChronoDuration::seconds(self.access_token_ttl_secs)).timestamp(),
        };

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {e}")))?;

        let refresh_plain: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFRESH_TOKEN_BYTES)
            .map(char::from)
            .collect();

        let stored = refresh_token::ActiveModel {
            user_id: Set(account.id),
            token_hash: Set(hash_refresh_token(&refresh_plain)),
            created_at: Set(now),
            expires_at: Set(now + ChronoDuration::seconds(self.refresh_token_ttl_secs)),
            revoked: Set(false),
            ..Default::default()
        };
        stored.insert(&*self.db).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_plain,
            expires_in: self.access_token_ttl_secs,
            token_type: "bearer",
        })
    }
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::Internal(format!("failed to hash password: {e}")))
}

/// Verifies a password against a stored Argon2 hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ServiceError::Internal(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

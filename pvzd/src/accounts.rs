//! Accounts and authentication.
//!
//! Handles dummy login, registration, password login, token validation and
//! the per-operation role check.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pvz_domain::{Email, Operation, User, UserRole};
use pvz_store::{Store, StoreError};

use crate::config::AuthConfig;
use crate::error::{PvzError, PvzResult};

// =============================================================================
// Tokens
// =============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// User email
    pub email: String,
    /// User role
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &User) -> PvzResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| PvzError::Auth(format!("Failed to generate token: {}", e)))
    }

    /// Validate signature and expiry, and decode the claims.
    pub fn validate(&self, token: &str) -> PvzResult<Claims> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| PvzError::Unauthorized(format!("invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> PvzResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PvzError::Auth(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a PHC string. An empty or malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Account service
// =============================================================================

/// Account operations over the user repository.
pub struct AccountService {
    store: Arc<dyn Store>,
    jwt: JwtManager,
}

impl AccountService {
    /// Create a new account service.
    pub fn new(store: Arc<dyn Store>, config: &AuthConfig) -> Self {
        Self {
            store,
            jwt: JwtManager::new(&config.jwt_secret, config.token_ttl_secs),
        }
    }

    /// Get a token for the shared account of a role, creating it on first use.
    pub async fn dummy_login(&self, role: &str) -> PvzResult<String> {
        let role: UserRole = role.parse()?;
        let email = Email::parse(&format!("dummy.{}@example.com", role))?;

        let user = match self.store.users().find_by_email(email.as_str()).await? {
            Some(user) => user,
            None => {
                let user = User::new(email.clone(), String::new(), role);
                match self.store.users().create(&user).await {
                    Ok(()) => {
                        info!(user_id = %user.id, %role, "Dummy user created");
                        user
                    },
                    // Lost the race to a concurrent dummy login
                    Err(StoreError::Duplicate { .. }) => self
                        .store
                        .users()
                        .find_by_email(email.as_str())
                        .await?
                        .ok_or_else(|| PvzError::Internal("dummy user vanished".to_string()))?,
                    Err(e) => return Err(e.into()),
                }
            },
        };

        self.jwt.issue(&user)
    }

    /// Register a new user and issue a token.
    ///
    /// # Errors
    /// - `InvalidEmail`, `InvalidRole` for malformed input
    /// - `UserExists` if the email is taken
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: &str,
    ) -> PvzResult<(User, String)> {
        let email = Email::parse(email)?;
        let role: UserRole = role.parse()?;
        if password.is_empty() {
            return Err(PvzError::InvalidRequest("password must not be empty".to_string()));
        }

        let user = User::new(email, hash_password(password)?, role);
        match self.store.users().create(&user).await {
            Ok(()) => {},
            Err(StoreError::Duplicate { .. }) => {
                return Err(PvzError::UserExists(user.email.to_string()));
            },
            Err(e) => return Err(e.into()),
        }

        info!(user_id = %user.id, %role, "User registered");
        let token = self.jwt.issue(&user)?;
        Ok((user, token))
    }

    /// Exchange email and password for a token.
    ///
    /// # Errors
    /// - `InvalidCredentials` on unknown email or wrong password
    pub async fn login(&self, email: &str, password: &str) -> PvzResult<String> {
        let user = self
            .store
            .users()
            .find_by_email(email.trim())
            .await?
            .ok_or(PvzError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "Login failed");
            return Err(PvzError::InvalidCredentials);
        }

        debug!(user_id = %user.id, "Login succeeded");
        self.jwt.issue(&user)
    }

    /// Resolve a token to its user.
    ///
    /// # Errors
    /// - `Unauthorized` for a bad or expired token, or an unknown subject
    pub async fn authenticate(&self, token: &str) -> PvzResult<User> {
        let claims = self.jwt.validate(token)?;
        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| PvzError::Unauthorized("invalid token subject".to_string()))?;

        self.store
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PvzError::Unauthorized("unknown user".to_string()))
    }

    /// Check that the bearer of `token` may perform `operation`.
    ///
    /// Public operations pass without a token and yield `None`.
    pub async fn authorize(
        &self,
        token: Option<&str>,
        operation: Operation,
    ) -> PvzResult<Option<User>> {
        if operation.is_public() {
            return Ok(None);
        }

        let token =
            token.ok_or_else(|| PvzError::Unauthorized("no authentication token found".to_string()))?;
        let user = self.authenticate(token).await?;

        if !operation.permits(user.role) {
            return Err(PvzError::Forbidden {
                operation,
                role: user.role,
            });
        }

        Ok(Some(user))
    }
}

// =============================================================================
// Tests
// =============================================================================

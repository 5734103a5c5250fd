use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Argon2, PasswordHasher as _,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Role, UserId};

pub const DEFAULT_JWT_EXPIRY_HOURS: u64 = 168;
pub const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("Cryptographic operation failed: {0}")]
    CryptographicFailure(String),
}

/// Identity attached to every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub jwt_expiry_hours: u64,
}

impl AuthConfig {
    pub fn new(jwt_secret: SecretString, jwt_expiry_hours: u64) -> Result<Self, SecurityError> {
        if jwt_secret.expose_secret().is_empty() {
            return Err(SecurityError::KeyDerivation(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }
        if jwt_secret.expose_secret().len() < MIN_RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                min_len = MIN_RECOMMENDED_SECRET_LEN,
                "JWT_SECRET is shorter than recommended"
            );
        }
        Ok(Self {
            jwt_secret,
            jwt_expiry_hours,
        })
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.expose_secret()
    }
}

/// Argon2id password hashing with a random salt per hash.
#[derive(Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, password: &str) -> Result<String, SecurityError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, SecurityError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| SecurityError::CryptographicFailure(e.to_string()))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: UserId,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 token issuer and validator.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry: Duration::hours(config.jwt_expiry_hours as i64),
        }
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, SecurityError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SecurityError::TokenGeneration(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, SecurityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| SecurityError::InvalidToken)
    }
}

/// Security event logging
#[derive(Debug, Clone)]
pub enum SecurityEvent {
    AuthenticationFailure {
        email: String,
        ip_address: String,
        reason: String,
    },
    AuthenticationSuccess {
        user_id: UserId,
        ip_address: String,
        method: String,
    },
    PermissionDenied {
        user_id: UserId,
        resource: String,
    },
    RateLimited {
        limiter: String,
        key: String,
    },
    HarmfulContentDetected {
        user_id: UserId,
        entry_id: i64,
        phrases: Vec<String>,
    },
}

pub struct SecurityLogger;

impl SecurityLogger {
    pub fn log_event(event: SecurityEvent) {
        use tracing::{info, warn};

        match event {
            SecurityEvent::AuthenticationFailure {
                email,
                ip_address,
                reason,
            } => {
                warn!(
                    email = %email,
                    ip_address = %ip_address,
                    reason = %reason,
                    "Authentication failure"
                );
            }
            SecurityEvent::AuthenticationSuccess {
                user_id,
                ip_address,
                method,
            } => {
                info!(
                    user_id = %user_id,
                    ip_address = %ip_address,
                    method = %method,
                    "Authentication success"
                );
            }
            SecurityEvent::PermissionDenied { user_id, resource } => {
                warn!(user_id = %user_id, resource = %resource, "Permission denied");
            }
            SecurityEvent::RateLimited { limiter, key } => {
                warn!(limiter = %limiter, key = %key, "Rate limit exceeded");
            }
            SecurityEvent::HarmfulContentDetected {
                user_id,
                entry_id,
                phrases,
            } => {
                warn!(
                    user_id = %user_id,
                    entry_id = %entry_id,
                    phrases = ?phrases,
                    "Harmful content detected in journal entry"
                );
            }
        }
    }
}

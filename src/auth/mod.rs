//! Token issuing/validation and password hashing.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

/// Access level carried by platform operator tokens
pub const ROOT_ACCESS: &str = "root";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id (nil for root tokens)
    pub sub: Uuid,
    pub tenant: String,
    pub database: String,
    pub access: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: Uuid, tenant: String, database: String, access: String, email: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;

        Self {
            sub,
            tenant,
            database,
            access,
            email,
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }

    pub fn root(operator: &str) -> Self {
        Self::new(
            Uuid::nil(),
            String::new(),
            String::new(),
            ROOT_ACCESS.to_string(),
            operator.to_string(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.access == ROOT_ACCESS
    }

    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret is not configured")]
    InvalidSecret,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token is too old to refresh")]
    RefreshWindowElapsed,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

fn secret() -> Result<&'static str, AuthError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(secret)
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

pub fn decode_token(token: &str, secret: &str, allow_expired: bool) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let mut validation = Validation::default();
    validation.leeway = 0;
    if allow_expired {
        validation.validate_exp = false;
    }

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::InvalidToken(e.to_string()),
        })
}

/// Sign claims with the configured secret
pub fn issue_token(claims: &Claims) -> Result<String, AuthError> {
    encode_token(claims, secret()?)
}

/// Validate a bearer token with the configured secret
pub fn validate_token(token: &str) -> Result<Claims, AuthError> {
    decode_token(token, secret()?, false)
}

/// Re-issue a correctly signed token that is at most `refresh_window_hours` past expiry
pub fn refresh_token(token: &str) -> Result<(String, Claims), AuthError> {
    let security = &config::config().security;
    let old = decode_token(token, secret()?, true)?;
    refresh_claims(&old, security.refresh_window_hours, Utc::now().timestamp())?;

    let claims = Claims::new(old.sub, old.tenant, old.database, old.access, old.email);
    Ok((issue_token(&claims)?, claims))
}

fn refresh_claims(old: &Claims, window_hours: u64, now: i64) -> Result<(), AuthError> {
    let deadline = old.exp + (window_hours as i64) * 3600;
    if now > deadline {
        return Err(AuthError::RefreshWindowElapsed);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(password_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Stands in for the stored hash when no account matches, so both login paths cost one argon2 verify
static DUMMY_PASSWORD_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("folio-unknown-account").ok());

/// Check a login attempt. Unknown accounts still pay for a full verify before failing.
pub fn verify_login(password: &str, password_hash: Option<&str>) -> Result<(), AuthError> {
    match password_hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Some(dummy) = DUMMY_PASSWORD_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    fn claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: Uuid::new_v4(),
            tenant: "acme".to_string(),
            database: "tenant_0123456789abcdef".to_string(),
            access: "reader".to_string(),
            email: "reader@acme.test".to_string(),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn token_round_trip() {
        let original = claims(3600);
        let token = encode_token(&original, SECRET).unwrap();
        let decoded = decode_token(&token, SECRET, false).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_token(&claims(3600), SECRET).unwrap();
        assert!(matches!(decode_token(&token, "other", false), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_only_decodes_when_allowed() {
        let token = encode_token(&claims(-60), SECRET).unwrap();
        assert!(matches!(decode_token(&token, SECRET, false), Err(AuthError::Expired)));
        assert!(decode_token(&token, SECRET, true).is_ok());
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(matches!(encode_token(&claims(60), ""), Err(AuthError::InvalidSecret)));
    }

    #[test]
    fn refresh_window() {
        let expired = claims(-3600);
        let now = Utc::now().timestamp();
        assert!(refresh_claims(&expired, 24, now).is_ok());
        assert!(matches!(refresh_claims(&expired, 0, now), Err(AuthError::RefreshWindowElapsed)));
    }

    #[test]
    fn password_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert_ne!(hash, hash_password("correct horse battery staple").unwrap());
    }

    #[test]
    fn unknown_account_fails_after_verifying() {
        assert!(DUMMY_PASSWORD_HASH.as_deref().is_some_and(|h| h.starts_with("$argon2")));
        assert!(matches!(
            verify_login("folio-unknown-account", None),
            Err(AuthError::InvalidCredentials)
        ));

        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_login("correct horse battery staple", Some(&hash)).is_ok());
        assert!(matches!(verify_login("wrong", Some(&hash)), Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn root_claims() {
        let root = Claims::root("ops@folio.test");
        assert!(root.is_root());
        assert!(root.database.is_empty());
    }
}

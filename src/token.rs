use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Claims
///
/// Payload embedded in every issued session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): id of the credential record.
    pub sub: Uuid,
    pub username: String,
    /// Issuance instant in milliseconds since the epoch.
    pub timestamp: i64,
    /// Issued At (iat), seconds.
    pub iat: i64,
    /// Expiration Time (exp), seconds. Tokens past this instant are rejected on verify.
    pub exp: i64,
}

impl Claims {
    pub fn new(sub: Uuid, username: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        Self {
            sub,
            username: username.into(),
            timestamp: now.timestamp_millis(),
            iat,
            exp: iat + ttl.as_secs() as i64,
        }
    }
}

/// TokenIssuer
///
/// Signing and verification capability used by login and by the `AuthUser` extractor.
pub trait TokenIssuer: Send + Sync {
    fn sign(&self, claims: &Claims) -> AppResult<String>;
    fn verify(&self, token: &str) -> AppResult<Claims>;
}

pub type TokenIssuerState = Arc<dyn TokenIssuer>;

/// JwtIssuer
///
/// HS256 JWTs signed with the configured secret.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Service(format!("token signing failed: {e}")))
    }

    fn verify(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Expiry is exact; the cached session shares the same lifetime.
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                    _ => tracing::debug!(error = %e, "rejected invalid token"),
                }
                Err(AppError::Unauthenticated)
            }
        }
    }
}

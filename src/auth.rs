use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    cache::CacheState,
    credentials::CredentialHasherState,
    error::{AppError, AppResult, ConflictKind},
    models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, RegisterResponse},
    repository::UserRepositoryState,
    token::{Claims, TokenIssuerState},
};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const LOGGED_OUT: &str = "logged out";

static MOBILE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^1[3-9]\d{9}$").expect("mobile number pattern is a valid regex")
});

/// Deterministic cache key holding a user's current session token.
pub fn session_key(username: &str) -> String {
    format!("user:{username}")
}

/// validate_registration
///
/// Plain input checks run before any collaborator is touched.
pub fn validate_registration(req: &RegisterRequest) -> AppResult<()> {
    if req.username.trim().is_empty() {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !req.email.contains('@') {
        return Err(AppError::Validation("email address is invalid".to_string()));
    }
    if let Some(mobile) = req.mobile_number.as_deref() {
        if !MOBILE_NUMBER.is_match(mobile) {
            return Err(AppError::Validation("mobile number is invalid".to_string()));
        }
    }
    Ok(())
}

/// AuthService
///
/// Sequences the credential, token and cache collaborators for login, registration and logout.
/// Holds no state of its own beyond the handles it was built with.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepositoryState,
    cache: CacheState,
    hasher: CredentialHasherState,
    tokens: TokenIssuerState,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: UserRepositoryState,
        cache: CacheState,
        hasher: CredentialHasherState,
        tokens: TokenIssuerState,
        token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            cache,
            hasher,
            tokens,
            token_ttl,
        }
    }

    /// login
    ///
    /// Verifies the password, issues a token and records it as the user's session in the cache
    /// with a TTL equal to the token lifetime. A wrong password never reaches the cache.
    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let user = self
            .users
            .find_by_username(&req.username)
            .await?
            .ok_or_else(|| AppError::NotFound("user does not exist".to_string()))?;

        if !self.hasher.verify(&req.password, &user.password) {
            return Err(AppError::Auth("incorrect username or password".to_string()));
        }

        let claims = Claims::new(user.id, &user.username, self.token_ttl);
        let token = self.tokens.sign(&claims)?;

        let key = session_key(&user.username);
        if !self.cache.set(&key, &token, Some(self.token_ttl)).await {
            return Err(AppError::Cache(format!("failed to store session under {key}")));
        }

        tracing::info!(username = %user.username, "user logged in");
        Ok(LoginResponse {
            username: user.username,
            token,
        })
    }

    /// register
    ///
    /// Validates the input, rejects taken usernames, hashes the password and persists the record.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<RegisterResponse> {
        validate_registration(&req)?;

        if self.users.find_by_username(&req.username).await?.is_some() {
            return Err(AppError::Conflict(ConflictKind::Username));
        }

        let password_digest = self.hasher.hash(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                username: req.username,
                password_digest,
                email: req.email,
                mobile_number: req.mobile_number,
            })
            .await?;

        tracing::info!(username = %user.username, "user registered");
        Ok(RegisterResponse {
            username: user.username,
        })
    }

    /// logout
    ///
    /// Drops the cached session so the token stops authenticating before it expires.
    pub async fn logout(&self, username: &str) -> AppResult<&'static str> {
        let key = session_key(username);
        if !self.cache.delete(&key).await {
            return Err(AppError::Cache(format!("failed to delete session under {key}")));
        }
        tracing::info!(username, "user logged out");
        Ok(LOGGED_OUT)
    }

    /// authenticate
    ///
    /// Resolves a bearer token to its session. The token must verify and must still be the
    /// token cached for its user; a later login or a logout invalidates it.
    pub async fn authenticate(&self, token: &str) -> AppResult<AuthUser> {
        let claims = self.tokens.verify(token)?;
        match self.cache.get(&session_key(&claims.username)).await {
            Some(cached) if cached == token => Ok(AuthUser {
                id: claims.sub,
                username: claims.username,
            }),
            _ => Err(AppError::Unauthenticated),
        }
    }
}

/// AuthUser
///
/// Resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument: reads `Authorization: Bearer <token>` and
/// delegates to `AuthService::authenticate`. Rejections are faults, so they leave the service
/// in the same envelope as every other outcome.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthService::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthenticated)?;

        auth.authenticate(token).await
    }
}

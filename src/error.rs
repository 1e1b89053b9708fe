use thiserror::Error;

/// Result type shared by the hierarchy store, the auth orchestrator and their collaborators.
pub type AppResult<T> = Result<T, AppError>;

/// Code used when a fault carries no structured payload.
pub const GENERIC_FAULT_CODE: i32 = 9000;
/// Message used when a fault carries no structured payload.
pub const GENERIC_FAULT_MESSAGE: &str = "service error";

/// ConflictKind
///
/// Distinguishes which uniqueness rule (or parent reference) an operation collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Id,
    Path,
    Label,
    ParentNotFound,
    Username,
}

impl ConflictKind {
    pub fn code(self) -> i32 {
        match self {
            ConflictKind::Id => 2001,
            ConflictKind::Path => 2002,
            ConflictKind::Label => 2003,
            ConflictKind::ParentNotFound => 2004,
            ConflictKind::Username => 2005,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ConflictKind::Id => "menu id already exists",
            ConflictKind::Path => "menu path already exists",
            ConflictKind::Label => "menu label already exists",
            ConflictKind::ParentNotFound => "parent not found",
            ConflictKind::Username => "username already exists",
        }
    }
}

/// AppError
///
/// The fault taxonomy. Every operation reports failure through one of these variants;
/// the envelope normalizer is the only place that turns them into wire responses.
///
/// Collaborator variants (`Storage`, `Persistence`, `Cache`) and `Service` hold internal
/// diagnostics that are logged but never sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Malformed or missing input. Always client-caused.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Uniqueness violation or a missing referenced parent.
    #[error("conflict: {}", .0.message())]
    Conflict(ConflictKind),

    /// Referenced entity absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credential mismatch.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// No valid session was presented on a protected route.
    #[error("authentication required")]
    Unauthenticated,

    /// Datastore I/O failure while reading or committing.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Failure persisting a credential record.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Cache collaborator reported a failure.
    #[error("cache failure: {0}")]
    Cache(String),

    /// Unexpected fault. Carries no structured payload.
    #[error("service failure: {0}")]
    Service(String),
}

impl AppError {
    /// Structured `(code, message)` payload for the wire, or `None` when the fault
    /// has nothing that may be shown to a caller.
    pub fn payload(&self) -> Option<(i32, String)> {
        match self {
            AppError::Validation(msg) => Some((1001, msg.clone())),
            AppError::Conflict(kind) => Some((kind.code(), kind.message().to_string())),
            AppError::NotFound(msg) => Some((3001, msg.clone())),
            AppError::Auth(msg) => Some((4001, msg.clone())),
            AppError::Unauthenticated => Some((4002, "authentication required".to_string())),
            AppError::Storage(_) | AppError::Persistence(_) => {
                Some((9001, "database operation failed".to_string()))
            }
            AppError::Cache(_) => Some((9002, "cache operation failed".to_string())),
            AppError::Service(_) => None,
        }
    }

    /// Application faults are caused by the request; everything else is an
    /// infrastructure or programming failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::Conflict(_)
                | AppError::NotFound(_)
                | AppError::Auth(_)
                | AppError::Unauthenticated
        )
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

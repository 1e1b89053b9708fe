use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// CredentialHasher
///
/// Opaque hashing capability: the orchestrator never inspects digests itself.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> AppResult<String>;
    /// `false` for a mismatch or an unparsable digest.
    fn verify(&self, plain: &str, digest: &str) -> bool;
}

pub type CredentialHasherState = Arc<dyn CredentialHasher>;

/// Argon2Hasher
///
/// Argon2id with a fresh random salt per digest, encoded in PHC string format.
#[derive(Default, Clone)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Service(format!("password hashing failed: {e}")))
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "stored password digest is not a valid PHC string");
                false
            }
        }
    }
}

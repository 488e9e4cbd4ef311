//! Password hashing with Argon2id.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// The plaintext does not match the stored hash.
    #[error("password does not match")]
    Mismatch,

    /// Hashing failed, or the stored hash could not be parsed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Computes and checks password credentials.
///
/// Both calls are CPU-bound; async callers run them on the blocking pool.
pub trait CredentialHasher: Send + Sync {
    /// Hashes `plaintext` into a self-describing PHC string.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Checks `plaintext` against a PHC string produced by [`hash`](Self::hash).
    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), HashError>;
}

/// Argon2id hasher with a random per-password salt.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Builds a hasher with explicit cost parameters.
    ///
    /// `memory_kib`, `iterations` and `parallelism` follow
    /// [`argon2::Params::new`]. Verification reads the parameters back from
    /// the stored hash, so hashes made with other costs still verify.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, HashError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| HashError::Hash(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| HashError::Hash(e.to_string()))
    }

    fn verify(&self, hash: &str, plaintext: &str) -> Result<(), HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| HashError::Hash(e.to_string()))?;
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .map_err(|e| match e {
                argon2::password_hash::Error::Password => HashError::Mismatch,
                other => HashError::Hash(other.to_string()),
            })
    }
}

//! Password hashing and verification using Argon2id.
//!
//! Hashes are PHC strings, so verification reads the cost parameters
//! back from the stored hash. An optional pepper (server-side secret) is
//! prepended to the plaintext on both paths.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier, Version};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Argon2id hasher with configured cost parameters.
///
/// Cheap to clone; the async variants move a clone onto the blocking
/// pool.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    pepper: Option<String>,
}

impl PasswordHasher {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let params = Params::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(format!("invalid argon2 parameters: {e}")))?;

        Ok(Self {
            params,
            pepper: config.pepper.clone(),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a plaintext password with a fresh random salt.
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered: String;
        let input = match self.pepper.as_deref() {
            Some(p) => {
                peppered = format!("{p}{password}");
                peppered.as_bytes()
            }
            None => password.as_bytes(),
        };

        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(input, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(format!("hash error: {e}")))
    }

    /// Verify a plaintext password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch and `Err(AuthError::Hashing)` only
    /// if the stored hash is malformed.
    pub fn verify(&self, hash: &str, password: &str) -> AuthResult<bool> {
        let peppered: String;
        let input = match self.pepper.as_deref() {
            Some(p) => {
                peppered = format!("{p}{password}");
                peppered.as_bytes()
            }
            None => password.as_bytes(),
        };

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Hashing(format!("invalid hash format: {e}")))?;

        match self.argon2().verify_password(input, &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Hashing(format!("verify error: {e}"))),
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool.
    pub async fn hash_blocking(&self, password: String) -> AuthResult<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool.
    pub async fn verify_blocking(&self, hash: String, password: String) -> AuthResult<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))?
    }
}

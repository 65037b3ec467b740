//! JWT access token issuance/verification and opaque refresh token
//! generation.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    /// User id.
    pub id: i64,
    /// Resolved role name.
    pub role: String,
    /// Issuer.
    pub iss: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// Signs and verifies HS256 access tokens.
///
/// Built once from an [`AuthConfig`]; keys and validation rules are shared
/// behind `Arc`s so clones are cheap.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    issuer: Arc<str>,
    lifetime_secs: u64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(AuthError::Issuance("JWT secret is not configured".into()));
        }
        if i64::try_from(config.access_token_lifetime_secs).is_err() {
            return Err(AuthError::Issuance(format!(
                "access token lifetime {}s is out of range",
                config.access_token_lifetime_secs
            )));
        }
        if config.jwt_secret.len() < 32 {
            warn!("JWT secret is shorter than recommended (32 bytes)");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.jwt_issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);
        validation.leeway = config.leeway_secs;
        validation.validate_aud = false;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(config.jwt_secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.jwt_secret.as_bytes())),
            validation: Arc::new(validation),
            issuer: Arc::from(config.jwt_issuer.as_str()),
            lifetime_secs: config.access_token_lifetime_secs,
        })
    }

    /// Access token lifetime in seconds.
    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    /// Issue a signed access token for `user_id` carrying `role`.
    pub fn issue_access_token(&self, user_id: i64, role: &str) -> AuthResult<String> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.lifetime_secs)
            .ok()
            .and_then(|lifetime| now.checked_add(lifetime))
            .ok_or_else(|| AuthError::Issuance("access token expiry overflows".into()))?;
        let claims = AuthClaims {
            id: user_id,
            role: role.to_string(),
            iss: self.issuer.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    /// Sign arbitrary claims with the configured key.
    pub fn sign(&self, claims: &AuthClaims) -> AuthResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Issuance(format!("JWT encode: {e}")))
    }

    /// Verify signature, structure, issuer and expiry.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AuthClaims> {
        jsonwebtoken::decode::<AuthClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Generate a cryptographically random opaque refresh token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_refresh_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// This is the value stored as `refresh_token.token_hash`.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

//! JSON Web Token issuance.
//!
//! [`JwtSettings`] holds the key material loaded (or generated) at startup and
//! turns a [`User`] into a compact signed token. Signing failures are returned
//! as [`CryptoError`] so the caller decides whether to fail the request.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::JWTConfig;
use crate::models::User;

/// Length in bytes of a generated HMAC secret.
pub const GENERATED_SECRET_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("failed to verify token: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),

    #[error("invalid key material: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("could not read key file '{path}': {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not generate signing key: {0}")]
    KeyGeneration(#[source] rand::Error),

    #[error("unsupported JWT algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("algorithm {0:?} requires {1}")]
    MissingKey(Algorithm, &'static str),
}

/// Claims carried by every issued token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    // Registered claims
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    // Private claims
    pub username: String,
    pub realm: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Claims {
    pub fn for_user(user: &User, issuer: &str, issued_at: i64, expires_at: Option<i64>) -> Self {
        Claims {
            sub: user.subject(),
            iss: issuer.to_string(),
            iat: issued_at,
            exp: expires_at,
            username: user.username.clone(),
            realm: user.realm.clone(),
            roles: user.roles.clone(),
            attributes: user.attributes.clone(),
        }
    }

    /// Rebuild the user these claims were issued for.
    pub fn user(&self) -> User {
        User::new(
            self.realm.clone(),
            self.username.clone(),
            Some(self.roles.clone()),
            Some(self.attributes.clone()),
        )
    }
}

/// A compact JWS, ready for an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key material and defaults used to sign and verify tokens.
#[derive(Clone)]
pub struct JwtSettings {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    default_ttl: Option<Duration>,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}

fn read_key_file(path: Option<&str>, algorithm: Algorithm, field: &'static str) -> Result<Vec<u8>, CryptoError> {
    let path = path.ok_or(CryptoError::MissingKey(algorithm, field))?;
    fs::read(path).map_err(|source| CryptoError::KeyFile {
        path: path.to_string(),
        source,
    })
}

impl JwtSettings {
    /// Pair already-built keys with an algorithm. No check is made that the
    /// keys fit the algorithm; a mismatch surfaces when signing.
    pub fn from_keys(
        algorithm: Algorithm,
        encoding_key: EncodingKey,
        decoding_key: DecodingKey,
        issuer: impl Into<String>,
    ) -> Self {
        JwtSettings {
            algorithm,
            encoding_key,
            decoding_key,
            issuer: issuer.into(),
            default_ttl: None,
        }
    }

    /// Shared-secret settings for one of the HMAC algorithms.
    pub fn from_secret(
        secret: &[u8],
        algorithm: Algorithm,
        issuer: impl Into<String>,
    ) -> Result<Self, CryptoError> {
        if !is_hmac(algorithm) {
            return Err(CryptoError::MissingKey(algorithm, "PEM key files"));
        }
        if secret.is_empty() {
            return Err(CryptoError::MissingKey(algorithm, "a non-empty secret"));
        }
        Ok(Self::from_keys(
            algorithm,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
            issuer,
        ))
    }

    /// Fresh random HMAC secret from the operating system RNG.
    pub fn generate(algorithm: Algorithm, issuer: impl Into<String>) -> Result<Self, CryptoError> {
        let mut secret = [0u8; GENERATED_SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(CryptoError::KeyGeneration)?;
        Self::from_secret(&secret, algorithm, issuer)
    }

    /// Build settings from configuration, loading PEM files or generating a
    /// secret as needed.
    pub fn from_config(config: &JWTConfig) -> Result<Self, CryptoError> {
        let algorithm = Algorithm::from_str(config.algorithm.trim())
            .map_err(|_| CryptoError::UnsupportedAlgorithm(config.algorithm.clone()))?;

        let settings = if is_hmac(algorithm) {
            match &config.secret {
                Some(secret) => Self::from_secret(secret.as_bytes(), algorithm, &config.iss)?,
                None => {
                    warn!("No JWT secret configured; generating one. Tokens will not survive a restart.");
                    Self::generate(algorithm, &config.iss)?
                }
            }
        } else {
            let private = read_key_file(
                config.private_key_path.as_deref(),
                algorithm,
                "private_key_path",
            )?;
            let public = read_key_file(
                config.public_key_path.as_deref(),
                algorithm,
                "public_key_path",
            )?;
            let (encoding_key, decoding_key) = match algorithm {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => (
                    EncodingKey::from_rsa_pem(&private),
                    DecodingKey::from_rsa_pem(&public),
                ),
                Algorithm::ES256 | Algorithm::ES384 => (
                    EncodingKey::from_ec_pem(&private),
                    DecodingKey::from_ec_pem(&public),
                ),
                _ => (
                    EncodingKey::from_ed_pem(&private),
                    DecodingKey::from_ed_pem(&public),
                ),
            };
            Self::from_keys(
                algorithm,
                encoding_key.map_err(CryptoError::InvalidKey)?,
                decoding_key.map_err(CryptoError::InvalidKey)?,
                &config.iss,
            )
        };

        info!(
            "JWT issuer '{}' ready with algorithm {:?}",
            config.iss, algorithm
        );
        Ok(settings.with_default_ttl(config.default_ttl_secs.map(Duration::seconds)))
    }

    /// Lifetime applied when `issue` is called without an expiry.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign `user` into a token. `expiry` wins over the default lifetime; with
    /// neither, the token carries no `exp` claim.
    pub fn issue(
        &self,
        user: &User,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<SignedToken, CryptoError> {
        let now = Utc::now().timestamp();
        let exp = expiry
            .map(|at| at.timestamp())
            .or_else(|| self.default_ttl.map(|ttl| now + ttl.num_seconds()));
        let claims = Claims::for_user(user, &self.issuer, now, exp);

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map(SignedToken)
            .map_err(CryptoError::Signing)
    }

    /// Check the signature, issuer and (when present) expiry of `token`.
    pub fn verify(&self, token: &str) -> Result<Claims, CryptoError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(CryptoError::Verification)
    }
}

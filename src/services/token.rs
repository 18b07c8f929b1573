//! Signed, time-bound session tokens (HS256 JWT).
//!
//! A token is a snapshot of `{id, username, is_admin}` at issuance with an
//! absolute expiry. There is no server-side lookup or revocation: validity
//! is signature + `now < exp` and nothing else.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::domain::{Identity, UserId};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 8;

/// The only failure a verifier reports. Expired, forged, truncated and
/// garbage tokens are indistinguishable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid token")]
pub struct InvalidToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per RFC 7519
    pub sub: String,
    pub username: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Result<Identity, InvalidToken> {
        let id: i32 = self.sub.parse().map_err(|_| InvalidToken)?;
        Ok(Identity {
            user_id: UserId::new(id),
            username: self.username.clone(),
            is_admin: self.is_admin,
        })
    }
}

/// Signing key and lifetime, fixed for the life of the process.
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Builds the config from `[auth]`. Returns `true` alongside when the
    /// secret had to be generated because none was configured.
    #[must_use]
    pub fn from_auth_config(config: &AuthConfig) -> (Self, bool) {
        let ttl = Duration::hours(i64::from(config.token_ttl_hours));

        if config.token_secret.is_empty() {
            (Self::new(generate_secret(), ttl), true)
        } else {
            (Self::new(config.token_secret.as_bytes(), ttl), false)
        }
    }
}

fn generate_secret() -> Vec<u8> {
    use rand::Rng;

    let bytes: [u8; 32] = rand::rng().random();
    bytes.to_vec()
}

/// Issues and verifies session tokens. Holds no mutable state, so one
/// instance is shared freely across request handlers.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock below, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(&config.secret),
            decoding: DecodingKey::from_secret(&config.secret),
            validation,
            ttl: config.ttl,
        }
    }

    /// Issues a token for `identity` with the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        self.issue_at(identity, self.ttl, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let issued_at = now.timestamp();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            username: identity.username.clone(),
            is_admin: identity.is_admin,
            iat: issued_at,
            exp: issued_at + ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign session token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, InvalidToken> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(|_| InvalidToken)?;

        if now.timestamp() >= data.claims.exp {
            return Err(InvalidToken);
        }

        Ok(data.claims)
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

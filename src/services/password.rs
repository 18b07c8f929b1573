//! One-way password hashing.
//!
//! Produces self-describing Argon2id PHC strings (salt and parameters are
//! embedded). Callers treat the output as opaque: nothing outside this module
//! parses a stored hash.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tokio::task;
use tracing::error;

use crate::config::SecurityConfig;

/// Argon2id hasher configured from `[security]`.
///
/// Hashing and verification are CPU-bound, so the async entry points run
/// them on the blocking pool.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Verified against when the username is unknown, so the reply takes as
    /// long as a real mismatch.
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        let dummy_hash = hash_with(&params, "keyward-dummy-password")?;

        Ok(Self {
            params,
            dummy_hash: dummy_hash.into(),
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub async fn hash(&self, secret: &str) -> Result<String> {
        let params = self.params.clone();
        let secret = secret.to_string();

        task::spawn_blocking(move || hash_with(&params, &secret))
            .await
            .context("Password hashing task panicked")?
    }

    /// Constant-time comparison against a stored hash. A malformed hash is a
    /// mismatch, never an error.
    pub async fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        let argon2 = self.argon2();
        let secret = secret.to_string();
        let stored_hash = stored_hash.to_string();

        match task::spawn_blocking(move || verify_with(&argon2, &secret, &stored_hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                error!("Password verification task failed: {e}");
                false
            }
        }
    }

    /// Burns the same work as a real verification and always fails.
    pub async fn verify_dummy(&self, secret: &str) -> bool {
        let dummy = self.dummy_hash.clone();
        let _ = self.verify(secret, &dummy).await;
        false
    }

    /// True when `stored_hash` is not Argon2id with the configured params.
    #[must_use]
    pub fn needs_rehash(&self, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return true;
        };

        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }

        !Params::try_from(&parsed).is_ok_and(|p| {
            p.m_cost() == self.params.m_cost()
                && p.t_cost() == self.params.t_cost()
                && p.p_cost() == self.params.p_cost()
        })
    }
}

fn hash_with(params: &Params, secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());

    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

fn verify_with(argon2: &Argon2<'_>, secret: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .is_ok_and(|parsed| argon2.verify_password(secret.as_bytes(), &parsed).is_ok())
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that overrides `auth.token_secret`.
pub const TOKEN_SECRET_ENV: &str = "KEYWARD_TOKEN_SECRET";

/// Minimum accepted length (bytes) of a configured signing secret.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub auth: AuthConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/keyward.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cors_allowed_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Empty means "take it from the environment, or
    /// generate an ephemeral one at startup".
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_secret: String,

    pub token_ttl_hours: u32,

    pub bootstrap_username: String,

    pub bootstrap_password: String,

    /// Force the bootstrap admin through a password change on first login.
    pub bootstrap_must_reset: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_hours: 8,
            bootstrap_username: "admin".to_string(),
            bootstrap_password: "admin123".to_string(),
            bootstrap_must_reset: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 19456 = 19MB, the argon2 crate default)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    /// Re-hash stored passwords with the current params after a successful login
    pub rehash_on_login: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            rehash_on_login: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("keyward").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".keyward").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Picks up `KEYWARD_TOKEN_SECRET` when the file leaves the secret empty.
    pub fn apply_env_overrides(&mut self) {
        if self.auth.token_secret.is_empty()
            && let Ok(secret) = std::env::var(TOKEN_SECRET_ENV)
        {
            self.auth.token_secret = secret;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_path.is_empty() {
            anyhow::bail!("general.database_path cannot be empty");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!("general.min_db_connections cannot exceed max_db_connections");
        }

        if self.auth.token_ttl_hours == 0 {
            anyhow::bail!("auth.token_ttl_hours must be > 0");
        }

        if !self.auth.token_secret.is_empty()
            && self.auth.token_secret.len() < MIN_TOKEN_SECRET_LEN
        {
            anyhow::bail!("auth.token_secret must be at least {MIN_TOKEN_SECRET_LEN} bytes");
        }

        if self.auth.bootstrap_username.trim().is_empty()
            || self.auth.bootstrap_password.is_empty()
        {
            anyhow::bail!("auth.bootstrap_username and auth.bootstrap_password are required");
        }

        crate::services::validation::validate_username(&self.auth.bootstrap_username)
            .map_err(|e| anyhow::anyhow!("auth.bootstrap_username: {e}"))?;

        if !matches!(self.general.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("general.log_format must be \"pretty\" or \"json\"");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.auth.token_ttl_hours, 8);
        assert_eq!(config.auth.bootstrap_username, "admin");
        assert!(config.security.rehash_on_login);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[auth]"));
        assert!(toml_str.contains("[security]"));
        assert!(!toml_str.contains("token_secret"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            token_ttl_hours = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.token_ttl_hours, 1);
        assert_eq!(config.auth.bootstrap_password, "admin123");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = Config::default();
        config.auth.token_secret = "short".to_string();
        assert!(config.validate().is_err());

        config.auth.token_secret = "x".repeat(MIN_TOKEN_SECRET_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = Config::default();
        config.auth.token_ttl_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unusable_bootstrap_username() {
        let mut config = Config::default();
        config.auth.bootstrap_username = "ad min".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("auth.bootstrap_username"));

        config.auth.bootstrap_username = "a".repeat(500);
        assert!(config.validate().is_err());
    }
}

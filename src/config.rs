//! Configuration loading.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `PETTYLEDGER_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `PETTYLEDGER_DATABASE__PATH`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::storage::StoreOptions;

/// Used when no signing secret is configured. Fine for local use only.
const DEV_SECRET: &str = "pettyledger-development-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Config file not found: {0}")]
    Missing(PathBuf),

    #[error("auth.require_token is set but no auth.secret is configured")]
    DefaultSecret,
}

/// Database settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "pettyledger.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_connections: self.max_connections.max(1),
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
            create_if_missing: false,
        }
    }
}

/// Blob store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Directory that receives uploaded images
    pub root: PathBuf,
    /// Folder for cheque and receipt images inside the root
    pub image_folder: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("uploads"),
            image_folder: "petty-cash".to_string(),
        }
    }
}

/// Token signing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: SecretString,
    pub expires_in_secs: i64,
    pub issuer: String,
    /// Refuse commands that are not accompanied by a valid token
    pub require_token: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: SecretString::new(DEV_SECRET.to_string()),
            expires_in_secs: 3600,
            issuer: "pettyledger".to_string(),
            require_token: false,
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.secret.expose_secret() == DEV_SECRET
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub blob: BlobConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
    /// Upper bound for a single command; 0 disables the limit
    pub operation_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Self = figment
            .merge(Env::prefixed("PETTYLEDGER_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Tokens signed with the built-in secret can be forged by anyone, so
    /// they cannot guard commands.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.require_token && self.auth.uses_default_secret() {
            return Err(ConfigError::DefaultSecret);
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "pettyledger.db");
        assert_eq!(config.database.url(), "sqlite:pettyledger.db");
        assert_eq!(config.blob.image_folder, "petty-cash");
        assert_eq!(config.auth.expires_in_secs, 3600);
        assert!(config.operation_timeout().is_none());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pettyledger.toml");
        std::fs::write(
            &path,
            r#"
operation_timeout_secs = 30

[database]
path = "/var/lib/pettyledger/ledger.db"
busy_timeout_ms = 250

[auth]
secret = "s3cret"
issuer = "finance"

[telemetry]
json = true
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.database.path, "/var/lib/pettyledger/ledger.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(
            config.database.store_options().busy_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.auth.secret.expose_secret(), "s3cret");
        assert_eq!(config.auth.issuer, "finance");
        assert!(config.telemetry.json);
        assert_eq!(config.telemetry.log_level, "warn");
        assert_eq!(config.operation_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/pettyledger.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_secret_is_redacted_in_debug_output() {
        let config = AppConfig::default();
        assert!(!format!("{:?}", config).contains(DEV_SECRET));
    }

    #[test]
    fn test_required_tokens_need_a_real_secret() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pettyledger.toml");

        std::fs::write(&path, "[auth]\nrequire_token = true\n").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultSecret));

        std::fs::write(&path, "[auth]\nrequire_token = true\nsecret = \"s3cret\"\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.auth.require_token);
        assert!(!config.auth.uses_default_secret());

        // The built-in secret stays usable when tokens are optional
        assert!(AppConfig::default().validate().is_ok());
        assert!(AppConfig::default().auth.uses_default_secret());
    }
}

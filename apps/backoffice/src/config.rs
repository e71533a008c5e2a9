//! # Backoffice Configuration
//!
//! Configuration is resolved once at startup and passed down explicitly.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/srv/tally/tally.db                                  │
//! │     TALLY_DEBUG_DB=1                                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-backoffice/config.toml (Linux)                     │
//! │     ~/Library/Application Support/com.tally.backoffice/config.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     <data_dir>/tally.db, USD orders, DZD products                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! debug_db = false
//!
//! [database]
//! path = "/srv/tally/tally.db"
//! max_connections = 5
//! migrations_dir = "/srv/tally/migrations"
//!
//! [defaults]
//! order_currency = "USD"
//! product_currency = "DZD"
//! page_size = 20
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::{DEFAULT_ORDER_CURRENCY, DEFAULT_PAGE_SIZE, DEFAULT_PRODUCT_CURRENCY};
use tally_db::DbConfig;

// =============================================================================
// Errors
// =============================================================================

/// Failures while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine a data directory for the database")]
    NoDataDir,
}

// =============================================================================
// Sections
// =============================================================================

/// Top-level backoffice configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Verbose SQL logging (`debug,sqlx=info` filter).
    #[serde(default)]
    pub debug_db: bool,
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    /// Database file. `None` resolves to `<data_dir>/tally.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Extra `*.up.sql` scripts applied after the embedded ones.
    #[serde(default)]
    pub migrations_dir: Option<PathBuf>,
}

/// `[defaults]` section, handed to every service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Currency for order lines that arrive without one.
    #[serde(default = "default_order_currency")]
    pub order_currency: String,

    /// Currency for products created without one.
    #[serde(default = "default_product_currency")]
    pub product_currency: String,

    /// Page size used when a list call passes no limit.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_order_currency() -> String {
    DEFAULT_ORDER_CURRENCY.to_string()
}

fn default_product_currency() -> String {
    DEFAULT_PRODUCT_CURRENCY.to_string()
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for DatabaseSection {
    fn default() -> Self {
        DatabaseSection {
            path: None,
            max_connections: default_max_connections(),
            migrations_dir: None,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            order_currency: default_order_currency(),
            product_currency: default_product_currency(),
            page_size: default_page_size(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database: DatabaseSection::default(),
            defaults: DefaultsConfig::default(),
            debug_db: false,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl AppConfig {
    /// Loads configuration from file and environment.
    ///
    /// Uses `config_path` if given, else the platform config dir's
    /// `config.toml` when it exists, else defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading backoffice config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document; missing sections take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Checks the values a service relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }

        if self.defaults.order_currency.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "defaults.order_currency must not be empty".into(),
            ));
        }

        if self.defaults.product_currency.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "defaults.product_currency must not be empty".into(),
            ));
        }

        if self.defaults.page_size <= 0 {
            return Err(ConfigError::Invalid(
                "defaults.page_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("TALLY_MIGRATIONS_DIR") {
            debug!(dir = %dir, "Overriding migrations dir from environment");
            self.database.migrations_dir = Some(PathBuf::from(dir));
        }

        if let Ok(flag) = std::env::var("TALLY_DEBUG_DB") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.debug_db = true,
                "0" | "false" | "no" | "off" => self.debug_db = false,
                _ => warn!(value = %flag, "Unknown TALLY_DEBUG_DB value in environment"),
            }
        }

        if let Ok(currency) = std::env::var("TALLY_ORDER_CURRENCY") {
            debug!(currency = %currency, "Overriding order currency from environment");
            self.defaults.order_currency = currency;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "backoffice")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    // =========================================================================
    // Derived Settings
    // =========================================================================

    /// Resolves the database file path.
    ///
    /// ## Platform-Specific Defaults
    /// - **macOS**: `~/Library/Application Support/com.tally.backoffice/tally.db`
    /// - **Windows**: `%APPDATA%\tally\backoffice\data\tally.db`
    /// - **Linux**: `~/.local/share/backoffice/tally.db`
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        directories::ProjectDirs::from("com", "tally", "backoffice")
            .map(|dirs| dirs.data_dir().join("tally.db"))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Builds the pool configuration.
    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        let mut db = DbConfig::new(self.database_path()?)
            .max_connections(self.database.max_connections);

        if let Some(dir) = &self.database.migrations_dir {
            db = db.migrations_dir(dir.clone());
        }

        Ok(db)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.defaults.order_currency, "USD");
        assert_eq!(config.defaults.product_currency, "DZD");
        assert_eq!(config.defaults.page_size, 20);
        assert_eq!(config.database.max_connections, 5);
        assert!(!config.debug_db);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            debug_db = true

            [database]
            path = "/tmp/tally-test.db"

            [defaults]
            order_currency = "EUR"
            "#,
        )
        .unwrap();

        assert!(config.debug_db);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.defaults.order_currency, "EUR");
        assert_eq!(config.defaults.product_currency, "DZD");
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/tally-test.db")
        );
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = AppConfig::from_toml("[database]\nmax_connections = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 1;
        config.defaults.order_currency = "  ".into();
        assert!(config.validate().is_err());

        config.defaults.order_currency = "USD".into();
        config.defaults.product_currency = String::new();
        assert!(config.validate().is_err());

        config.defaults.product_currency = "DZD".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let path = std::env::temp_dir().join(format!(
            "tally-config-{}-load.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[database]\nmax_connections = 2\n").unwrap();

        let config = AppConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.database.max_connections, 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "tally-config-{}-invalid.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[database]\nmax_connections = 0\n").unwrap();

        let err = AppConfig::load(Some(path.clone())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        std::fs::remove_file(&path).unwrap();
    }
}

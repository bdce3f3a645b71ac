//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use domain::codegen::DEFAULT_CODE_LENGTH;
use domain::service::DEFAULT_MAX_ATTEMPTS;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::Sqlite
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
#[error("Configuration error for {field}: {message}")]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider (default: sqlite)
    pub storage_provider: StorageProvider,
    /// SQLite database path (default: ./data/shortlinks.db)
    pub db_path: PathBuf,
    /// How long a SQLite call may wait on a lock (default: 5000 ms)
    pub sqlite_busy_timeout: Duration,
    /// Log format
    pub log_format: LogFormat,
    /// Custom shortlink domain for generated URLs
    pub shortlink_domain: Option<String>,
    /// Length of generated codes (default: 6)
    pub code_length: usize,
    /// Generated-code collisions tolerated per create (default: 1000)
    pub max_code_attempts: u32,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse_or("PORT", get("PORT"), 3001u16)?;

        // CORS allow origin
        let cors_origin_str = get("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        let storage_provider = StorageProvider::from_str(
            &get("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()),
        );

        let db_path = get("DB_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/shortlinks.db"));

        let busy_ms = parse_or("SQLITE_BUSY_TIMEOUT_MS", get("SQLITE_BUSY_TIMEOUT_MS"), 5000u64)?;
        let sqlite_busy_timeout = Duration::from_millis(busy_ms);

        let log_format =
            LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        let shortlink_domain = get("SHORTLINK_DOMAIN").filter(|s| !s.is_empty());

        let code_length = parse_or("CODE_LENGTH", get("CODE_LENGTH"), DEFAULT_CODE_LENGTH)?;
        if !(1..=64).contains(&code_length) {
            return Err(ConfigError {
                field: "CODE_LENGTH",
                message: format!("must be between 1 and 64, got {}", code_length),
            });
        }

        let max_code_attempts =
            parse_or("MAX_CODE_ATTEMPTS", get("MAX_CODE_ATTEMPTS"), DEFAULT_MAX_ATTEMPTS)?;
        if max_code_attempts == 0 {
            return Err(ConfigError {
                field: "MAX_CODE_ATTEMPTS",
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            sqlite_busy_timeout,
            log_format,
            shortlink_domain,
            code_length,
            max_code_attempts,
        })
    }

    /// Log warnings about configuration that loses data.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: links and click counts are lost on restart."
            );
        }
    }
}

fn parse_or<T>(field: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw.filter(|s| !s.trim().is_empty()) {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e| ConfigError {
            field,
            message: format!("Invalid value '{}': {}", s, e),
        }),
    }
}

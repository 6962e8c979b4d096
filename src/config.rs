//! Configuration Module
//!
//! Handles loading the cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default sliding TTL: one day.
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sliding TTL in seconds shared by every key
    pub ttl_secs: u64,
    /// Backend selector: memory, sqlite, postgres or jsonfile
    pub backend: String,
    /// Connection target for durable backends (file path or database URL)
    pub dsn: Option<String>,
    /// HTTP server port
    pub server_port: u16,
}

/// A validated backend selection together with its connection target.
#[derive(Debug, Clone, PartialEq)]
pub enum Backend {
    Memory,
    Sqlite { path: PathBuf },
    Postgres { url: String },
    JsonFile { path: PathBuf },
}

impl Backend {
    /// Returns the selector name used in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Sqlite { .. } => "sqlite",
            Backend::Postgres { .. } => "postgres",
            Backend::JsonFile { .. } => "jsonfile",
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL` - Sliding TTL in seconds (default: 86400)
    /// - `CACHE_BACKEND` - Storage backend (default: memory)
    /// - `CACHE_DSN` - Database file path or connection URL (default: none)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_secs: env::var("CACHE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ttl_secs),
            backend: env::var("CACHE_BACKEND").unwrap_or(defaults.backend),
            dsn: env::var("CACHE_DSN").ok().filter(|v| !v.is_empty()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Returns the TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Validates the backend selector and its connection target.
    pub fn backend(&self) -> Result<Backend, ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }

        let target = |name: &'static str| self.dsn.clone().ok_or(ConfigError::MissingTarget(name));

        match self.backend.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Backend::Memory),
            "sqlite" => Ok(Backend::Sqlite {
                path: target("sqlite")?.into(),
            }),
            "postgres" | "postgresql" => Ok(Backend::Postgres {
                url: target("postgres")?,
            }),
            "jsonfile" | "json" => Ok(Backend::JsonFile {
                path: target("jsonfile")?.into(),
            }),
            _ => Err(ConfigError::UnknownBackend(self.backend.clone())),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            backend: "memory".to_string(),
            dsn: None,
            server_port: 3000,
        }
    }
}

//! Configuration module
//!
//! This module provides the server, storage, and retention settings. Configuration
//! is read once at startup (environment plus an optional `.env` file) and treated
//! as immutable for the lifetime of the process.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::units::{parse_duration, parse_size};

// Common constants
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HTTP_CONCURRENCY_LIMIT: usize = 1024;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_DB_PATH: &str = "./data/kcst.db";
const DEFAULT_MIN_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_MAX_TTL: Duration = Duration::from_secs(28 * 24 * 3600);
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_ORPHAN_GRACE_PERIOD: Duration = Duration::from_secs(24 * 3600);

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Public base URL used when building links. Derived from the request when unset.
    pub base_url: Option<String>,
    pub environment: String,
    /// Maximum number of requests handled at once
    pub concurrency_limit: usize,
}

/// On-disk locations owned by the retention store
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Content directory holding one file per stored object
    pub upload_dir: PathBuf,
    /// Snapshot file holding the whole metadata map
    pub db_path: PathBuf,
}

/// Parameters of the size-based TTL formula and the sweep cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionConfig {
    pub min_ttl: Duration,
    pub max_ttl: Duration,
    pub max_file_size: u64,
    pub cleanup_interval: Duration,
    /// Files with no metadata record older than this are removed by the cleanup
    /// routine. Zero disables the orphan scan.
    pub orphan_grace_period: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            min_ttl: DEFAULT_MIN_TTL,
            max_ttl: DEFAULT_MAX_TTL,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            orphan_grace_period: DEFAULT_ORPHAN_GRACE_PERIOD,
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.min_ttl > self.max_ttl {
            return Err(anyhow::anyhow!(
                "MIN_TTL ({:?}) must not exceed MAX_TTL ({:?})",
                self.min_ttl,
                self.max_ttl
            ));
        }

        if self.max_file_size == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE must be greater than zero"));
        }

        if self.cleanup_interval.is_zero() {
            return Err(anyhow::anyhow!("CLEANUP_INTERVAL must be greater than zero"));
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => DEFAULT_PORT,
        };

        let base_url = lookup("BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let concurrency_limit = match lookup("HTTP_CONCURRENCY_LIMIT") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be a valid number"))?
                .max(1),
            None => DEFAULT_HTTP_CONCURRENCY_LIMIT,
        };

        let server = ServerConfig {
            port,
            base_url,
            environment,
            concurrency_limit,
        };

        let storage = StorageConfig {
            upload_dir: lookup("UPLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
            db_path: lookup("DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
        };

        let duration_var = |key: &str, default: Duration| -> Result<Duration, anyhow::Error> {
            match lookup(key) {
                Some(value) => parse_duration(&value)
                    .map_err(|e| anyhow::anyhow!("{} is not a valid duration: {}", key, e)),
                None => Ok(default),
            }
        };

        let max_file_size = match lookup("MAX_FILE_SIZE") {
            Some(value) => parse_size(&value)
                .map_err(|e| anyhow::anyhow!("MAX_FILE_SIZE is not a valid size: {}", e))?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        let retention = RetentionConfig {
            min_ttl: duration_var("MIN_TTL", DEFAULT_MIN_TTL)?,
            max_ttl: duration_var("MAX_TTL", DEFAULT_MAX_TTL)?,
            max_file_size,
            cleanup_interval: duration_var("CLEANUP_INTERVAL", DEFAULT_CLEANUP_INTERVAL)?,
            orphan_grace_period: duration_var("ORPHAN_GRACE_PERIOD", DEFAULT_ORPHAN_GRACE_PERIOD)?,
        };

        Ok(Config {
            server,
            storage,
            retention,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(base_url) = &self.server.base_url {
            if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "BASE_URL must start with http:// or https://"
                ));
            }
        }

        self.retention.validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.server.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn base_url(&self) -> Option<&str> {
        self.server.base_url.as_deref()
    }

    pub fn environment(&self) -> &str {
        &self.server.environment
    }

    pub fn max_file_size(&self) -> u64 {
        self.retention.max_file_size
    }
}

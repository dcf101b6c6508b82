use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use services::ApiConfig;
use services::api::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};

use crate::cli::Cli;

pub const DEFAULT_DB_URL: &str = "sqlite://portal.sqlite3";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug)]
pub enum ConfigError {
    InvalidDbUrl { raw: String },
    InvalidTimeout { raw: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDbUrl { raw } => write!(f, "invalid database url: {raw}"),
            ConfigError::InvalidTimeout { raw } => write!(f, "invalid timeout: {raw}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime settings: environment first, then command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub api_url: String,
    pub db_url: String,
    pub timeout: Duration,
    pub log_filter: String,
}

impl PortalConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if `PORTAL_HTTP_TIMEOUT_SECS` is not a positive integer
    /// or the database url is blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("PORTAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let db_url = match lookup("PORTAL_DB_URL") {
            Some(raw) => normalize_sqlite_url(raw)?,
            None => DEFAULT_DB_URL.into(),
        };
        let timeout = match lookup("PORTAL_HTTP_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let log_filter = lookup("RUST_LOG")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.into());
        Ok(Self {
            api_url,
            db_url,
            timeout,
            log_filter,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDbUrl` for a blank `--db`.
    pub fn apply_overrides(mut self, cli: &Cli) -> Result<Self, ConfigError> {
        if let Some(url) = &cli.api_url {
            self.api_url.clone_from(url);
        }
        if let Some(db) = &cli.db {
            self.db_url = normalize_sqlite_url(db.clone())?;
        }
        if let Some(secs) = cli.timeout_secs {
            self.timeout = Duration::from_secs(secs.max(1));
        }
        if cli.verbose {
            self.log_filter = "debug".into();
        }
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `services::ApiError::InvalidUrl` for an unusable API url.
    pub fn api(&self) -> Result<ApiConfig, services::ApiError> {
        ApiConfig::new(&self.api_url, self.timeout)
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidTimeout { raw: raw.to_owned() })
}

/// Accept `sqlite://path`, `sqlite:path`, a bare path or `sqlite::memory:`; relative
/// paths are resolved against the working directory.
pub fn normalize_sqlite_url(raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDbUrl { raw });
    }
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return Ok(trimmed.to_owned());
    }

    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    Ok(format!("sqlite://{}", absolute.display()))
}

/// Make sure the parent directory of a file database exists.
///
/// # Errors
///
/// Returns an error for a malformed url or when the directory cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

//! Process configuration.
//!
//! Built once at startup and handed to whatever needs it; nothing reads the
//! environment after that. Values come from, lowest priority first: built-in
//! defaults, an optional `local.env` dotenv file, and the process environment.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::duration;
use crate::error::{ActionError, Result};

pub const DEFAULT_MAX_SLEEP_TIME_SECS: u64 = 120;
pub const DEFAULT_RELEASE_AFTER: &str = "P30D";
pub const DEFAULT_DB_PATH: &str = "./data/actions.db";
pub const DEFAULT_LOG_FILE: &str = "logs/action_provider.log";
pub const DOTENV_FILE: &str = "local.env";

const TRUE_VALUES: &[&str] = &["True", "true", "1", "yes", "Y", "T"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub client_secret: String,
    /// Seconds an action stays `ACTIVE` before a poll completes it.
    pub max_sleep_time_secs: u64,
    pub default_release_after: String,
    pub db_path: PathBuf,
    pub log_level: String,
    pub enable_file_logging: bool,
    /// Only set when file logging is enabled.
    pub log_file: Option<PathBuf>,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: "bogus".to_string(),
            client_secret: "bogus".to_string(),
            max_sleep_time_secs: DEFAULT_MAX_SLEEP_TIME_SECS,
            default_release_after: DEFAULT_RELEASE_AFTER.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: "debug".to_string(),
            enable_file_logging: false,
            log_file: None,
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Config {
    /// Read `local.env` from the working directory if present, then the
    /// process environment. Variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_dotenv(Path::new(DOTENV_FILE))
    }

    pub fn from_env_with_dotenv(dotenv: &Path) -> Result<Self> {
        if dotenv.exists() {
            dotenvy::from_path(dotenv).map_err(|e| {
                ActionError::InvalidConfig(format!("{}: {e}", dotenv.display()))
            })?;
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let enable_file_logging = lookup("ENABLE_FILE_LOGGING")
            .map(|v| TRUE_VALUES.contains(&v.as_str()))
            .unwrap_or(defaults.enable_file_logging);
        let log_file = enable_file_logging.then(|| {
            PathBuf::from(lookup("LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()))
        });

        let config = Self {
            client_id: lookup("GLOBUS_CLIENT_ID").unwrap_or(defaults.client_id),
            client_secret: lookup("GLOBUS_CLIENT_SECRET").unwrap_or(defaults.client_secret),
            max_sleep_time_secs: parse_or(&lookup, "MAX_SLEEP_TIME", defaults.max_sleep_time_secs)?,
            default_release_after: lookup("DEFAULT_RELEASE_AFTER")
                .unwrap_or(defaults.default_release_after),
            db_path: lookup("DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            enable_file_logging,
            log_file,
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        duration::parse_iso8601(&self.default_release_after).map_err(|_| {
            ActionError::InvalidConfig(format!(
                "DEFAULT_RELEASE_AFTER '{}' is not an ISO-8601 duration",
                self.default_release_after
            ))
        })?;
        // TimeDelta cannot represent every u64 second count.
        if i64::try_from(self.max_sleep_time_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .is_none()
        {
            return Err(ActionError::InvalidConfig(format!(
                "MAX_SLEEP_TIME {} is out of range",
                self.max_sleep_time_secs
            )));
        }
        Ok(())
    }

    pub fn max_sleep_time(&self) -> TimeDelta {
        i64::try_from(self.max_sleep_time_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// OAuth scope advertised in the provider description.
    pub fn auth_scope(&self) -> String {
        format!(
            "https://auth.globus.org/scopes/{}/action_all",
            self.client_id
        )
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ActionError::InvalidConfig(format!("{key}='{raw}': {e}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

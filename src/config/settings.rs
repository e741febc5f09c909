//! TOML-based configuration for semgate.
//!
//! Supports a config file (semgate.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [query]
//! default_limit = 10000
//! max_limit = 50000
//! default_timezone = "${SEMGATE_TZ}"
//!
//! [time_series]
//! max_points = 50000
//!
//! [gateway]
//! max_concurrent_queries = 8
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Query normalization limits and defaults.
    pub query: QuerySettings,

    /// Time series generation.
    pub time_series: TimeSeriesSettings,

    /// Request orchestration.
    pub gateway: GatewaySettings,
}

/// Limit applied when neither the query nor the settings set one.
pub const DEFAULT_LIMIT: u64 = 10_000;

/// Ceiling for non-persistent queries.
pub const MAX_LIMIT: u64 = 50_000;

/// Timezone of queries that do not name one.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Query normalization settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QuerySettings {
    /// Limit applied when a query does not set one.
    pub default_limit: u64,

    /// Ceiling for non-persistent queries.
    pub max_limit: u64,

    /// Timezone used when a query does not set one (supports ${ENV_VAR}).
    pub default_timezone: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl QuerySettings {
    /// Get the default timezone with environment variables expanded.
    pub fn resolved_timezone(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.default_timezone)
    }
}

/// Time series settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeSeriesSettings {
    /// Maximum number of points a generated series may hold.
    pub max_points: u64,
}

impl Default for TimeSeriesSettings {
    fn default() -> Self {
        Self { max_points: 50_000 }
    }
}

/// Gateway orchestration settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// How many sibling queries of one request run at the same time.
    pub max_concurrent_queries: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_concurrent_queries: 8,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text and validate them.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.query.default_timezone = settings.query.resolved_timezone()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SEMGATE_CONFIG`
    /// 2. `./semgate.toml`
    /// 3. `~/.config/semgate/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SEMGATE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("semgate.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("semgate").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.query.default_limit > self.query.max_limit {
            return Err(SettingsError::InvalidConfig(format!(
                "query.default_limit ({}) exceeds query.max_limit ({})",
                self.query.default_limit, self.query.max_limit
            )));
        }
        if self.time_series.max_points == 0 {
            return Err(SettingsError::InvalidConfig(
                "time_series.max_points must be positive".to_string(),
            ));
        }
        if self.gateway.max_concurrent_queries == 0 {
            return Err(SettingsError::InvalidConfig(
                "gateway.max_concurrent_queries must be positive".to_string(),
            ));
        }
        self.query
            .default_timezone
            .parse::<Tz>()
            .map_err(|_| SettingsError::UnknownTimezone(self.query.default_timezone.clone()))?;
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced {
                chars.next();
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            } else if ch.is_alphanumeric() || ch == '_' {
                var_name.push(ch);
                chars.next();
            } else {
                break;
            }
        }

        if var_name.is_empty() && !braced {
            // A lone $ is kept as-is
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

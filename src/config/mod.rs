//! Configuration module for semgate.
//!
//! Handles the settings file, environment variable expansion, and defaults.

mod settings;

pub use settings::{
    expand_env_vars, GatewaySettings, QuerySettings, Settings, SettingsError, TimeSeriesSettings,
    DEFAULT_LIMIT, DEFAULT_TIMEZONE, MAX_LIMIT,
};

//! Launch configuration read from the environment.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `CHECKPOINT_PHASE` | [`phase`](LaunchConfig::phase) | unset (no checkpoint) |
//! | `CHECKPOINT_DEBUG` | [`debug`](LaunchConfig::debug) | `false` |
//! | `CHECKPOINT_LOG_FORMAT` | [`log_format`](LaunchConfig::log_format) | `pretty` |
//! | `CHECKPOINT_LOG_FILTER` | [`env_filter`](LaunchConfig::env_filter) | unset |
//! | `CHECKPOINT_IMAGE_DIR` | [`image_dir`](LaunchConfig::image_dir) | `checkpoint/image` |

use core::str::FromStr;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the checkpoint phase.
pub const PHASE_ENV: &str = "CHECKPOINT_PHASE";
/// Environment variable enabling debug trace output.
pub const DEBUG_ENV: &str = "CHECKPOINT_DEBUG";
/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "CHECKPOINT_LOG_FORMAT";
/// Environment variable holding a `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "CHECKPOINT_LOG_FILTER";
/// Environment variable naming the directory the image is written to.
pub const IMAGE_DIR_ENV: &str = "CHECKPOINT_IMAGE_DIR";

/// Errors raised while reading the launch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The log format is not one of `pretty`, `compact` or `json`.
    #[error("unknown log format '{0}': expected pretty, compact or json")]
    UnknownLogFormat(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

impl FromStr for TracingFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(TracingFormat::Pretty),
            "compact" => Ok(TracingFormat::Compact),
            "json" => Ok(TracingFormat::Json),
            _ => Err(ConfigError::UnknownLogFormat(s.to_owned())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LaunchConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Settings the launcher needs before anything else starts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Phase name to checkpoint at. `None` means no checkpoint.
    pub phase: Option<String>,
    /// Emit phase transitions and hook registrations at debug level.
    pub debug: bool,
    /// Log output format.
    pub log_format: TracingFormat,
    /// Custom filter directive, overriding the level implied by `debug`.
    pub env_filter: Option<String>,
    /// Where the image is written.
    pub image_dir: PathBuf,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            phase: None,
            debug: false,
            log_format: TracingFormat::default(),
            env_filter: None,
            image_dir: PathBuf::from("checkpoint/image"),
        }
    }
}

impl LaunchConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownLogFormat`] for an unrecognized log format.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownLogFormat`] for an unrecognized log format.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(format) => format.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            phase: get(PHASE_ENV),
            debug: get(DEBUG_ENV).is_some_and(|value| parse_flag(&value)),
            log_format,
            env_filter: get(LOG_FILTER_ENV),
            image_dir: get(IMAGE_DIR_ENV).map_or(defaults.image_dir, PathBuf::from),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

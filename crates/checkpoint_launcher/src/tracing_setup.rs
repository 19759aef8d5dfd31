//! Installs the `tracing` subscriber for the launcher.
//!
//! The checkpoint crates only emit events; nothing is printed until a
//! subscriber is installed here. With [`LaunchConfig::debug`] off, only
//! `info` and above reach stdout, which hides phase transitions and hook
//! registrations.

use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LaunchConfig, TracingFormat};

/// Maximum level implied by the debug toggle.
#[must_use]
pub fn level_for(config: &LaunchConfig) -> Level {
    if config.debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Builds the filter for `config`.
///
/// A custom directive wins over the debug toggle; an invalid directive falls
/// back to the toggle's level.
#[must_use]
pub fn env_filter_for(config: &LaunchConfig) -> EnvFilter {
    let level = level_for(config);
    match &config.env_filter {
        Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(level.as_str())),
        None => EnvFilter::new(level.as_str()),
    }
}

/// Installs a global subscriber for `config`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(config: &LaunchConfig) {
    let installed = tracing_subscriber::registry()
        .with(env_filter_for(config))
        .with(fmt_layer(config.log_format))
        .try_init()
        .is_ok();

    tracing::debug!(
        level = %level_for(config),
        format = ?config.log_format,
        installed,
        "checkpoint tracing initialized"
    );
}

/// Formatting layer for `format`, boxed so every format shares one
/// subscriber type.
fn fmt_layer<S>(format: TracingFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = tracing_subscriber::fmt::layer();
    match format {
        TracingFormat::Pretty => layer.pretty().boxed(),
        TracingFormat::Compact => layer.compact().boxed(),
        TracingFormat::Json => layer.json().boxed(),
    }
}

//! Startup wiring for checkpoint/restore.
//!
//! - [`LaunchConfig`] - Settings read from `CHECKPOINT_*` environment variables
//! - [`init_tracing`] - Installs the `tracing` subscriber, honoring the debug toggle
//! - [`Launcher`] - Owns the phase registry and the snapshot driver
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkpoint_launcher::{LaunchConfig, Launcher};
//! use checkpoint_phase::{FnHook, Phase};
//! use checkpoint_snapshot::InProcessCheckpoint;
//!
//! let config = LaunchConfig {
//!     phase: Some("applications".to_owned()),
//!     ..LaunchConfig::default()
//! };
//! let launcher = Launcher::new(config, InProcessCheckpoint::new());
//! assert_eq!(launcher.phase(), Phase::Applications);
//!
//! launcher
//!     .registry()
//!     .current()
//!     .add_multi_threaded_hook(Arc::new(FnHook::new("scheduler")))
//!     .unwrap();
//!
//! assert!(launcher.checkpoint().unwrap());
//! ```

mod config;
mod launcher;
mod tracing_setup;

pub use config::{
    ConfigError, DEBUG_ENV, IMAGE_DIR_ENV, LOG_FILTER_ENV, LOG_FORMAT_ENV, LaunchConfig,
    PHASE_ENV, TracingFormat,
};
pub use launcher::Launcher;
pub use tracing_setup::{env_filter_for, init_tracing, level_for};

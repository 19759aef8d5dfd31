//! Process-start wiring of the phase registry and snapshot driver.

use std::sync::Arc;

use checkpoint_phase::{Phase, PhaseRegistry};
use checkpoint_snapshot::{Checkpoint, CheckpointDriver, SnapshotHookFactory, SnapshotResult};

use crate::config::{ConfigError, LaunchConfig};
use crate::tracing_setup::init_tracing;

/// Owns the process's [`PhaseRegistry`] and the driver that checkpoints it.
///
/// Create one at startup, hand [`registry`](Self::registry) to every
/// subsystem that registers hooks, and call [`checkpoint`](Self::checkpoint)
/// once startup reaches the configured phase.
pub struct Launcher {
    config: LaunchConfig,
    driver: CheckpointDriver,
}

impl Launcher {
    /// Creates a launcher from `config` and sets the checkpoint phase.
    pub fn new(config: LaunchConfig, facility: impl Checkpoint + 'static) -> Self {
        let registry = Arc::new(PhaseRegistry::new());
        registry.set_phase(config.phase.as_deref());

        if config.phase.is_some() && registry.phase().is_inactive() {
            tracing::warn!(
                phase = config.phase.as_deref(),
                "unknown checkpoint phase, checkpoint disabled"
            );
        }

        Self {
            driver: CheckpointDriver::new(registry, facility),
            config,
        }
    }

    /// Reads [`LaunchConfig::from_env`], installs tracing and creates the
    /// launcher.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from reading the environment.
    pub fn from_env(facility: impl Checkpoint + 'static) -> Result<Self, ConfigError> {
        let config = LaunchConfig::from_env()?;
        init_tracing(&config);
        Ok(Self::new(config, facility))
    }

    /// Adds a snapshot hook factory to the driver.
    #[must_use]
    pub fn with_factory(mut self, factory: impl SnapshotHookFactory + 'static) -> Self {
        self.driver.add_factory(factory);
        self
    }

    /// The configuration this launcher was created with.
    #[must_use]
    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// The process's phase registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PhaseRegistry> {
        self.driver.registry()
    }

    /// The phase selected at startup.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.registry().phase()
    }

    /// Checkpoints the process into the configured image directory.
    ///
    /// Returns `Ok(false)` without doing anything when no checkpoint was
    /// requested, `Ok(true)` once the process has been restored. Only the
    /// first call can succeed.
    ///
    /// # Errors
    ///
    /// See [`CheckpointDriver::snapshot`].
    pub fn checkpoint(&self) -> SnapshotResult<bool> {
        if self.phase().is_inactive() {
            tracing::debug!("no checkpoint requested");
            return Ok(false);
        }

        self.driver.snapshot(&self.config.image_dir)?;
        Ok(true)
    }
}

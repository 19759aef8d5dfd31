//! Runs every participant of a checkpoint in the right order.
//!
//! # Ordering
//!
//! ```text
//! prepare:  factory hooks (in order) → multi-threaded phase hooks
//!           → native facility: single-threaded phase hooks, image, resume
//! restore:  multi-threaded phase hooks → factory hooks (reverse order)
//!           → deferred restore actions
//! ```
//!
//! A failure before the image is written rolls back everything already
//! prepared, newest first. A failure after resume is reported as
//! [`SnapshotFailedKind::RestoreAbort`]; hooks not yet restored are told via
//! [`SnapshotHook::abort_restore`]. Once the process has resumed the phase is
//! marked restored either way, so actions deferred with
//! [`PhaseRegistry::on_restore`] still run.
//!
//! A phase is checkpointed at most once. After its hooks have been drained,
//! or once it is restored, `snapshot` refuses to run again.

use std::path::Path;
use std::sync::Arc;

use checkpoint_phase::{CheckpointHook, Phase, PhaseHookAdapter, PhaseRegistry};
use parking_lot::Mutex;

use crate::error::{SnapshotFailed, SnapshotFailedKind, SnapshotResult};
use crate::hook::{SnapshotHook, SnapshotHookFactory};
use crate::native::Checkpoint;

/// Coordinates the phase registry, snapshot hook factories and the native
/// facility for one process.
pub struct CheckpointDriver {
    registry: Arc<PhaseRegistry>,
    factories: Vec<Box<dyn SnapshotHookFactory>>,
    facility: Box<dyn Checkpoint>,
    running: Mutex<()>,
}

impl CheckpointDriver {
    /// Creates a driver over `registry` that snapshots with `facility`.
    pub fn new(registry: Arc<PhaseRegistry>, facility: impl Checkpoint + 'static) -> Self {
        Self {
            registry,
            factories: Vec::new(),
            facility: Box::new(facility),
            running: Mutex::new(()),
        }
    }

    /// Adds a snapshot hook factory.
    #[must_use]
    pub fn with_factory(mut self, factory: impl SnapshotHookFactory + 'static) -> Self {
        self.add_factory(factory);
        self
    }

    /// Adds a snapshot hook factory.
    pub fn add_factory(&mut self, factory: impl SnapshotHookFactory + 'static) -> &mut Self {
        self.factories.push(Box::new(factory));
        self
    }

    /// The registry whose hooks this driver runs.
    #[must_use]
    pub fn registry(&self) -> &Arc<PhaseRegistry> {
        &self.registry
    }

    /// Checkpoints the process at its current phase and restores it.
    ///
    /// On success the phase is marked restored.
    ///
    /// # Errors
    ///
    /// - [`SnapshotFailedKind::PrepareAbort`] if no phase is active, the phase
    ///   was already checkpointed or is being checkpointed, or a hook failed
    ///   to prepare.
    /// - Whatever the native facility reports.
    /// - [`SnapshotFailedKind::RestoreAbort`] if a hook failed to restore.
    pub fn snapshot(&self, image_dir: &Path) -> SnapshotResult {
        let Some(_running) = self.running.try_lock() else {
            return Err(SnapshotFailed::new(
                SnapshotFailedKind::PrepareAbort,
                "a checkpoint is already in progress",
            ));
        };

        let phase = self.registry.phase();
        self.check_phase(phase)?;

        tracing::info!(%phase, image_dir = %image_dir.display(), "checkpoint starting");

        let hooks: Vec<Box<dyn SnapshotHook>> = self
            .factories
            .iter()
            .flat_map(|factory| factory.create(phase))
            .collect();
        let multi_threaded = self.registry.hook_adapter(true);
        let single_threaded = self.registry.hook_adapter(false);

        prepare_snapshot_hooks(&hooks)?;

        if let Err(cause) = multi_threaded.prepare() {
            multi_threaded.checkpoint_failed();
            let err = SnapshotFailed::from_hook(SnapshotFailedKind::PrepareAbort, cause);
            abort_prepare(&hooks, &err);
            return Err(err);
        }

        if let Err(err) = self
            .facility
            .checkpoint(phase, image_dir, &single_threaded)
        {
            if err.kind() == SnapshotFailedKind::RestoreAbort {
                tracing::warn!(%phase, error = %err, "restore failed after resume");
                abort_restore(&hooks, &err);
                self.mark_restored_after_failure(phase);
            } else {
                tracing::info!(%phase, error = %err, "checkpoint abandoned");
                single_threaded.checkpoint_failed();
                multi_threaded.checkpoint_failed();
                abort_prepare(&hooks, &err);
            }
            return Err(err);
        }

        tracing::info!(%phase, "checkpoint resumed, restoring");

        if let Err(err) = restore_after_resume(&hooks, &multi_threaded) {
            tracing::warn!(%phase, error = %err, "restore failed after resume");
            self.mark_restored_after_failure(phase);
            return Err(err);
        }

        self.registry.mark_restored().map_err(|cause| {
            let err = SnapshotFailed::from_hook(SnapshotFailedKind::RestoreAbort, cause);
            tracing::warn!(%phase, error = %err, "restore action failed");
            err
        })?;

        tracing::info!(%phase, "checkpoint restored");
        Ok(())
    }

    fn check_phase(&self, phase: Phase) -> SnapshotResult {
        let refused = if phase.is_inactive() {
            "no checkpoint phase is active".to_owned()
        } else if self.registry.is_restored(phase) {
            format!("checkpoint phase {phase} has already been restored")
        } else if self.registry.is_draining(phase) {
            format!("hooks for checkpoint phase {phase} were already drained")
        } else {
            return Ok(());
        };
        Err(SnapshotFailed::new(SnapshotFailedKind::PrepareAbort, refused))
    }

    /// The process is running again, so the phase is over even though a
    /// restore hook failed.
    fn mark_restored_after_failure(&self, phase: Phase) {
        if let Err(cause) = self.registry.mark_restored() {
            tracing::warn!(%phase, error = %cause, "restore action failed");
        }
    }
}

fn restore_after_resume(
    hooks: &[Box<dyn SnapshotHook>],
    multi_threaded: &PhaseHookAdapter,
) -> SnapshotResult {
    if let Err(cause) = multi_threaded.restore() {
        let err = SnapshotFailed::from_hook(SnapshotFailedKind::RestoreAbort, cause);
        abort_restore(hooks, &err);
        return Err(err);
    }

    for (i, hook) in hooks.iter().enumerate().rev() {
        if let Err(cause) = hook.restore() {
            let err = SnapshotFailed::from_hook(SnapshotFailedKind::RestoreAbort, cause);
            tracing::debug!(hook = hook.name(), "snapshot hook failed to restore");
            abort_restore(&hooks[..i], &err);
            return Err(err);
        }
    }
    Ok(())
}

fn prepare_snapshot_hooks(hooks: &[Box<dyn SnapshotHook>]) -> SnapshotResult {
    for (i, hook) in hooks.iter().enumerate() {
        if let Err(cause) = hook.prepare() {
            let err = SnapshotFailed::from_hook(SnapshotFailedKind::PrepareAbort, cause);
            tracing::info!(hook = hook.name(), error = %err, "checkpoint abandoned");
            abort_prepare(&hooks[..i], &err);
            return Err(err);
        }
    }
    Ok(())
}

fn abort_prepare(hooks: &[Box<dyn SnapshotHook>], cause: &SnapshotFailed) {
    for hook in hooks.iter().rev() {
        hook.abort_prepare(cause);
    }
}

fn abort_restore(hooks: &[Box<dyn SnapshotHook>], cause: &SnapshotFailed) {
    for hook in hooks.iter().rev() {
        hook.abort_restore(cause);
    }
}

//! Abort-aware snapshot hooks contributed by subsystem factories.
//!
//! Unlike [`CheckpointHook`](checkpoint_phase::CheckpointHook), which is added
//! to the phase registry while startup is in progress, a [`SnapshotHook`] is
//! produced on demand by a [`SnapshotHookFactory`] when the driver starts a
//! checkpoint. Snapshot hooks are told why a checkpoint was abandoned.

use checkpoint_phase::{HookError, Phase};

use crate::error::SnapshotFailed;

/// Callbacks run around a process snapshot, with explicit abort notification.
pub trait SnapshotHook: Send + Sync {
    /// Called before the snapshot is taken.
    fn prepare(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called when a later step failed after this hook prepared.
    fn abort_prepare(&self, _cause: &SnapshotFailed) {}

    /// Called after the process image has been resumed.
    fn restore(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called when a restore step failed before this hook was restored.
    fn abort_restore(&self, _cause: &SnapshotFailed) {}

    /// Name used in log output.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

/// Produces the snapshot hooks a subsystem needs for a checkpoint at `phase`.
///
/// Factories are asked once per checkpoint, in the order they were added to
/// the driver. Returning no hooks is fine.
pub trait SnapshotHookFactory: Send + Sync {
    /// Creates the hooks for a checkpoint taken at `phase`.
    fn create(&self, phase: Phase) -> Vec<Box<dyn SnapshotHook>>;
}

impl<F> SnapshotHookFactory for F
where
    F: Fn(Phase) -> Vec<Box<dyn SnapshotHook>> + Send + Sync,
{
    fn create(&self, phase: Phase) -> Vec<Box<dyn SnapshotHook>> {
        self(phase)
    }
}

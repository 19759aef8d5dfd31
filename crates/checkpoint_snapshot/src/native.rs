//! The native facility that actually writes the process image.
//!
//! The real facility (CRIU or a JVM-integrated equivalent) lives outside this
//! workspace. [`Checkpoint`] is the seam it plugs into.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use checkpoint_phase::{CheckpointHook, Phase};
use parking_lot::Mutex;

use crate::error::{SnapshotFailed, SnapshotFailedKind, SnapshotResult};

/// A facility able to snapshot the running process.
///
/// # Contract
///
/// `checkpoint` must call `single_threaded.prepare()` with every other thread
/// of the process paused, write the image to `image_dir`, and call
/// `single_threaded.restore()` as soon as the image is resumed.
///
/// - If `prepare` fails, return [`SnapshotFailedKind::PrepareAbort`].
/// - If the image cannot be written, return [`SnapshotFailedKind::SnapshotFailed`].
/// - If `restore` fails, return [`SnapshotFailedKind::RestoreAbort`].
pub trait Checkpoint: Send + Sync {
    /// Takes the snapshot and returns once the process has been resumed.
    fn checkpoint(
        &self,
        phase: Phase,
        image_dir: &Path,
        single_threaded: &dyn CheckpointHook,
    ) -> SnapshotResult;
}

impl<C: Checkpoint + ?Sized> Checkpoint for Arc<C> {
    fn checkpoint(
        &self,
        phase: Phase,
        image_dir: &Path,
        single_threaded: &dyn CheckpointHook,
    ) -> SnapshotResult {
        (**self).checkpoint(phase, image_dir, single_threaded)
    }
}

/// Facility for platforms where checkpointing is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCheckpoint;

impl Checkpoint for UnsupportedCheckpoint {
    fn checkpoint(
        &self,
        _phase: Phase,
        _image_dir: &Path,
        _single_threaded: &dyn CheckpointHook,
    ) -> SnapshotResult {
        Err(SnapshotFailed::new(
            SnapshotFailedKind::Unsupported,
            "no native checkpoint facility is available on this platform",
        ))
    }
}

/// Facility that runs the single-threaded hooks in-process without writing
/// an image, as if the snapshot were resumed immediately.
///
/// Used for dry runs of a server's hooks and in tests.
#[derive(Debug, Default)]
pub struct InProcessCheckpoint {
    taken: Mutex<Vec<(Phase, PathBuf)>>,
}

impl InProcessCheckpoint {
    /// Creates a facility with no recorded snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots "taken" so far, in order.
    #[must_use]
    pub fn taken(&self) -> Vec<(Phase, PathBuf)> {
        self.taken.lock().clone()
    }
}

impl Checkpoint for InProcessCheckpoint {
    fn checkpoint(
        &self,
        phase: Phase,
        image_dir: &Path,
        single_threaded: &dyn CheckpointHook,
    ) -> SnapshotResult {
        single_threaded
            .prepare()
            .map_err(|cause| SnapshotFailed::from_hook(SnapshotFailedKind::PrepareAbort, cause))?;

        tracing::debug!(%phase, image_dir = %image_dir.display(), "in-process snapshot");
        self.taken.lock().push((phase, image_dir.to_path_buf()));

        single_threaded
            .restore()
            .map_err(|cause| SnapshotFailed::from_hook(SnapshotFailedKind::RestoreAbort, cause))
    }
}

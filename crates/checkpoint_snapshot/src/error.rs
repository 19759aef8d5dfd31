//! Snapshot failure reporting.

use core::fmt;

use checkpoint_phase::HookError;
use thiserror::Error;

/// Outcome of a snapshot step.
pub type SnapshotResult<T = ()> = Result<T, SnapshotFailed>;

/// Which stage of the checkpoint failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotFailedKind {
    /// A hook failed to prepare; no image was written.
    PrepareAbort,
    /// Hooks prepared but the image could not be written.
    SnapshotFailed,
    /// The image resumed but a hook failed to restore.
    RestoreAbort,
    /// This process cannot be checkpointed at all.
    Unsupported,
}

impl SnapshotFailedKind {
    /// Returns a short, stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SnapshotFailedKind::PrepareAbort => "prepare aborted",
            SnapshotFailedKind::SnapshotFailed => "snapshot failed",
            SnapshotFailedKind::RestoreAbort => "restore aborted",
            SnapshotFailedKind::Unsupported => "checkpoint unsupported",
        }
    }
}

impl fmt::Display for SnapshotFailedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checkpoint that did not complete.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct SnapshotFailed {
    kind: SnapshotFailedKind,
    message: String,
    #[source]
    cause: Option<HookError>,
}

impl SnapshotFailed {
    /// Creates a failure with no underlying hook error.
    pub fn new(kind: SnapshotFailedKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Creates a failure caused by a hook.
    #[must_use]
    pub fn from_hook(kind: SnapshotFailedKind, cause: HookError) -> Self {
        Self {
            kind,
            message: cause.to_string(),
            cause: Some(cause),
        }
    }

    /// The stage that failed.
    #[must_use]
    pub fn kind(&self) -> SnapshotFailedKind {
        self.kind
    }

    /// Human-readable failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The hook error behind this failure, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&HookError> {
        self.cause.as_ref()
    }
}

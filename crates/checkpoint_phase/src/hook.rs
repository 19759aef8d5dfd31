//! The prepare/restore capability subsystems implement to take part in a
//! checkpoint.
//!
//! # Example
//!
//! ```
//! use checkpoint_phase::{CheckpointHook, FnHook, HookError};
//!
//! struct ListenerHook;
//!
//! impl CheckpointHook for ListenerHook {
//!     fn prepare(&self) -> Result<(), HookError> {
//!         // close the listening socket
//!         Ok(())
//!     }
//!
//!     fn restore(&self) -> Result<(), HookError> {
//!         // reopen it
//!         Ok(())
//!     }
//! }
//!
//! let timers = FnHook::new("timers")
//!     .on_prepare(|| Ok(()))
//!     .on_restore(|| Ok(()));
//! assert_eq!(timers.name(), "timers");
//! ```

use core::error::Error;
use core::fmt;

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// HookError
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by a hook's `prepare` or `restore` callback.
#[derive(Debug, Error)]
#[error("checkpoint hook '{hook}' failed: {message}")]
pub struct HookError {
    hook: String,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl HookError {
    /// Creates an error for `hook` with a plain message.
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error raised while running `hook`.
    pub fn with_source(hook: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            hook: hook.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Name of the hook that failed.
    #[must_use]
    pub fn hook(&self) -> &str {
        &self.hook
    }

    /// Human-readable failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CheckpointHook
// ─────────────────────────────────────────────────────────────────────────────

/// Callbacks run around a process snapshot.
///
/// Both callbacks default to doing nothing, so a hook only implements the
/// side it cares about.
///
/// - [`prepare`](Self::prepare) runs before the snapshot and must leave the
///   process in a state that is safe to serialize.
/// - [`restore`](Self::restore) runs after the image is resumed and undoes
///   whatever `prepare` suspended.
///
/// An error from `prepare` aborts the checkpoint. Hooks that had already
/// prepared are then offered [`checkpoint_failed`](Self::checkpoint_failed).
pub trait CheckpointHook: Send + Sync + 'static {
    /// Called before the snapshot is taken.
    fn prepare(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after the process image has been resumed.
    fn restore(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Called instead of `restore` when a later step aborted the checkpoint
    /// after this hook's `prepare` had succeeded.
    fn checkpoint_failed(&self) {}

    /// Name used in log output and errors.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FnHook
// ─────────────────────────────────────────────────────────────────────────────

type Callback = Box<dyn Fn() -> Result<(), HookError> + Send + Sync>;

/// A [`CheckpointHook`] assembled from closures.
///
/// Unset callbacks behave like the trait defaults.
pub struct FnHook {
    name: String,
    prepare: Option<Callback>,
    restore: Option<Callback>,
    failed: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FnHook {
    /// Creates a hook with no callbacks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prepare: None,
            restore: None,
            failed: None,
        }
    }

    /// Sets the prepare callback.
    #[must_use]
    pub fn on_prepare(
        mut self,
        f: impl Fn() -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.prepare = Some(Box::new(f));
        self
    }

    /// Sets the restore callback.
    #[must_use]
    pub fn on_restore(
        mut self,
        f: impl Fn() -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        self.restore = Some(Box::new(f));
        self
    }

    /// Sets the callback run when the checkpoint is abandoned after prepare.
    #[must_use]
    pub fn on_checkpoint_failed(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.failed = Some(Box::new(f));
        self
    }
}

impl CheckpointHook for FnHook {
    fn prepare(&self) -> Result<(), HookError> {
        self.prepare.as_ref().map_or(Ok(()), |f| f())
    }

    fn restore(&self) -> Result<(), HookError> {
        self.restore.as_ref().map_or(Ok(()), |f| f())
    }

    fn checkpoint_failed(&self) {
        if let Some(f) = &self.failed {
            f();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook")
            .field("name", &self.name)
            .field("prepare", &self.prepare.is_some())
            .field("restore", &self.restore.is_some())
            .finish_non_exhaustive()
    }
}

//! The single top-level hook handed to the snapshot driver per threading mode.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::hook::{CheckpointHook, HookError};
use crate::registry::{PhaseRegistry, SharedHook};

#[derive(Default)]
struct Drained {
    hooks: Vec<SharedHook>,
    /// Number of leading `hooks` whose `prepare` succeeded.
    prepared: usize,
    /// Set by `prepare`, cleared by `restore` or `checkpoint_failed`.
    in_round: bool,
}

/// Runs every hook registered for one threading mode of the current phase.
///
/// - `prepare` drains the registry and prepares each hook in registration
///   order.
/// - `restore` restores the same hooks in reverse order and releases them.
/// - `checkpoint_failed` notifies, in reverse order, only the hooks whose
///   `prepare` succeeded, and releases them.
///
/// Hook errors are returned as-is; the first failing hook stops the round.
/// A second `prepare` before the round is released is refused and leaves the
/// drained hooks in place.
pub struct PhaseHookAdapter {
    registry: Arc<PhaseRegistry>,
    multi_threaded: bool,
    drained: Mutex<Drained>,
}

impl PhaseHookAdapter {
    pub(crate) fn new(registry: Arc<PhaseRegistry>, multi_threaded: bool) -> Self {
        Self {
            registry,
            multi_threaded,
            drained: Mutex::new(Drained::default()),
        }
    }

    /// Whether this adapter drives the multi-threaded hooks.
    #[must_use]
    pub fn is_multi_threaded(&self) -> bool {
        self.multi_threaded
    }

    /// Number of hooks drained by `prepare` and not yet released.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.drained.lock().hooks.len()
    }
}

impl CheckpointHook for PhaseHookAdapter {
    fn prepare(&self) -> Result<(), HookError> {
        let hooks = {
            let mut drained = self.drained.lock();
            if drained.in_round {
                return Err(HookError::new(
                    self.name(),
                    "prepare called again before restore",
                ));
            }
            let hooks = self.registry.drain_hooks(self.multi_threaded);
            *drained = Drained {
                hooks: hooks.clone(),
                prepared: 0,
                in_round: true,
            };
            hooks
        };

        for hook in &hooks {
            tracing::trace!(hook = hook.name(), multi_threaded = self.multi_threaded, "prepare");
            hook.prepare()?;
            self.drained.lock().prepared += 1;
        }
        Ok(())
    }

    fn restore(&self) -> Result<(), HookError> {
        let hooks = core::mem::take(&mut *self.drained.lock()).hooks;

        for hook in hooks.iter().rev() {
            tracing::trace!(hook = hook.name(), multi_threaded = self.multi_threaded, "restore");
            hook.restore()?;
        }
        Ok(())
    }

    fn checkpoint_failed(&self) {
        let Drained {
            hooks, prepared, ..
        } = core::mem::take(&mut *self.drained.lock());

        for hook in hooks.get(..prepared).unwrap_or_default().iter().rev() {
            hook.checkpoint_failed();
        }
    }

    fn name(&self) -> &str {
        if self.multi_threaded {
            "phase-hooks(multi-threaded)"
        } else {
            "phase-hooks(single-threaded)"
        }
    }
}

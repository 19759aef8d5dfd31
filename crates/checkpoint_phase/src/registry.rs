//! The process-wide authority on the current checkpoint phase and its hooks.
//!
//! A [`PhaseRegistry`] is created once at startup and shared by `Arc` with
//! every subsystem that wants to take part in a checkpoint. The launcher
//! calls [`set_phase`](PhaseRegistry::set_phase) once; subsystems then add
//! hooks to the current phase until the snapshot driver drains them.
//!
//! # Lifecycle of a phase
//!
//! ```text
//! INACTIVE ──set_phase──▶ accepting hooks ──drain──▶ draining ──mark_restored──▶ restored
//! ```
//!
//! There is no way back to accepting hooks once draining has started.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkpoint_phase::{FnHook, Phase, PhaseRegistry};
//!
//! let registry = Arc::new(PhaseRegistry::new());
//! registry.set_phase(Some("features"));
//! assert_eq!(registry.phase(), Phase::Features);
//!
//! let added = registry
//!     .current()
//!     .add_single_threaded_hook(Arc::new(FnHook::new("a")))
//!     .unwrap();
//! assert!(added);
//!
//! let hooks = registry.drain_hooks(false);
//! assert_eq!(hooks.len(), 1);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::adapter::PhaseHookAdapter;
use crate::error::PhaseError;
use crate::hook::{CheckpointHook, FnHook, HookError};
use crate::phase::Phase;

/// Shared handle to a registered hook.
pub type SharedHook = Arc<dyn CheckpointHook>;

// ─────────────────────────────────────────────────────────────────────────────
// PhaseState
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state owned by one concrete phase.
#[derive(Default)]
struct PhaseHooks {
    single_threaded: Vec<SharedHook>,
    multi_threaded: Vec<SharedHook>,
    /// Actions from `on_restore`, run once the phase is marked restored.
    restore_actions: Vec<SharedHook>,
    no_more_add_hooks: bool,
    restored: bool,
}

impl PhaseHooks {
    fn list_mut(&mut self, multi_threaded: bool) -> &mut Vec<SharedHook> {
        if multi_threaded {
            &mut self.multi_threaded
        } else {
            &mut self.single_threaded
        }
    }
}

#[derive(Default)]
struct PhaseState {
    hooks: Mutex<PhaseHooks>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PhaseRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Holds the current checkpoint phase and the hooks registered against it.
///
/// # Thread Safety
///
/// - [`set_phase`](Self::set_phase) is serialized by a registry-wide lock.
/// - [`phase`](Self::phase) is a lock-free atomic read.
/// - Hook additions and drains take the lock of the phase they touch. Hook
///   callbacks never run while a registry lock is held.
pub struct PhaseRegistry {
    current: AtomicU8,
    set_lock: Mutex<()>,
    states: [PhaseState; Phase::CONCRETE.len()],
    names: HashMap<String, Phase>,
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseRegistry")
            .field("current", &self.phase())
            .finish_non_exhaustive()
    }
}

impl PhaseRegistry {
    /// Creates a registry whose current phase is [`Phase::Inactive`].
    #[must_use]
    pub fn new() -> Self {
        let names = Phase::ALL
            .iter()
            .map(|phase| (phase.name().to_ascii_lowercase(), *phase))
            .collect();

        Self {
            current: AtomicU8::new(Phase::Inactive as u8),
            set_lock: Mutex::new(()),
            states: Default::default(),
            names,
        }
    }

    /// Resolves a phase name, ignoring ASCII case.
    ///
    /// `None` and unknown names resolve to [`Phase::Inactive`].
    #[must_use]
    pub fn resolve(&self, name: Option<&str>) -> Phase {
        name.and_then(|name| self.names.get(name.trim().to_ascii_lowercase().as_str()))
            .copied()
            .unwrap_or(Phase::Inactive)
    }

    /// Sets the process's checkpoint phase.
    ///
    /// The first call that resolves to a concrete phase wins. Every later
    /// call is ignored, as is any call that resolves to [`Phase::Inactive`].
    pub fn set_phase(&self, name: Option<&str>) {
        let _guard = self.set_lock.lock();

        let requested = self.resolve(name);
        let current = self.phase();
        if !current.is_inactive() {
            tracing::debug!(%current, %requested, "checkpoint phase already set, ignoring");
            return;
        }
        if requested.is_inactive() {
            tracing::debug!(name = ?name, "no checkpoint phase requested");
            return;
        }

        self.current.store(requested as u8, Ordering::Release);
        tracing::debug!(phase = %requested, "checkpoint phase set");
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_index(self.current.load(Ordering::Acquire))
    }

    /// Returns a view of the current phase.
    #[must_use]
    pub fn current(&self) -> PhaseRef<'_> {
        self.phase_ref(self.phase())
    }

    /// Returns a view of `phase`, current or not.
    #[must_use]
    pub fn phase_ref(&self, phase: Phase) -> PhaseRef<'_> {
        PhaseRef {
            registry: self,
            phase,
        }
    }

    fn state(&self, phase: Phase) -> Option<&PhaseState> {
        self.states.get(phase.index())
    }

    /// Returns `true` if `phase` is [`Phase::Inactive`] or has been restored.
    #[must_use]
    pub fn is_restored(&self, phase: Phase) -> bool {
        self.state(phase)
            .is_none_or(|state| state.hooks.lock().restored)
    }

    /// Returns `true` once `phase` has stopped accepting hooks because they
    /// are being drained. Always `false` for [`Phase::Inactive`].
    #[must_use]
    pub fn is_draining(&self, phase: Phase) -> bool {
        self.state(phase)
            .is_some_and(|state| state.hooks.lock().no_more_add_hooks)
    }

    /// Adds `hook` to `phase`.
    ///
    /// Returns `Ok(false)` without storing the hook when `phase` is
    /// [`Phase::Inactive`], when its hooks are already being drained, or when
    /// it has been restored. Callers should log and carry on without the hook.
    ///
    /// # Errors
    ///
    /// [`PhaseError::NotCurrentPhase`] if `phase` is not the current phase.
    pub fn add_hook(
        &self,
        phase: Phase,
        hook: SharedHook,
        multi_threaded: bool,
    ) -> Result<bool, PhaseError> {
        let Some(state) = self.state(phase) else {
            return Ok(false);
        };

        let current = self.phase();
        if phase != current {
            return Err(PhaseError::NotCurrentPhase {
                requested: phase,
                current,
            });
        }

        let mut hooks = state.hooks.lock();
        if hooks.no_more_add_hooks || hooks.restored {
            tracing::debug!(
                %phase,
                hook = hook.name(),
                multi_threaded,
                "hook registered too late, ignoring"
            );
            return Ok(false);
        }

        tracing::debug!(%phase, hook = hook.name(), multi_threaded, "hook registered");
        hooks.list_mut(multi_threaded).push(hook);
        Ok(true)
    }

    /// Takes the current phase's hooks for one threading mode.
    ///
    /// This closes the phase to new hooks for good. The returned hooks are in
    /// registration order; a second call for the same mode returns nothing.
    /// Intended for the snapshot driver only, usually through
    /// [`hook_adapter`](Self::hook_adapter).
    pub fn drain_hooks(&self, multi_threaded: bool) -> Vec<SharedHook> {
        let phase = self.phase();
        let Some(state) = self.state(phase) else {
            return Vec::new();
        };

        let mut hooks = state.hooks.lock();
        hooks.no_more_add_hooks = true;
        let drained = core::mem::take(hooks.list_mut(multi_threaded));
        tracing::debug!(%phase, multi_threaded, count = drained.len(), "hooks drained");
        drained
    }

    /// Creates the top-level hook that runs every hook registered for one
    /// threading mode.
    #[must_use]
    pub fn hook_adapter(self: &Arc<Self>, multi_threaded: bool) -> PhaseHookAdapter {
        PhaseHookAdapter::new(Arc::clone(self), multi_threaded)
    }

    /// Marks the current phase as restored and runs the actions deferred by
    /// [`on_restore`](Self::on_restore), in registration order.
    ///
    /// The snapshot driver calls this once the process has resumed, whether
    /// or not every restore hook succeeded. Calling it again, or while
    /// [`Phase::Inactive`], does nothing.
    ///
    /// # Errors
    ///
    /// The first error returned by a deferred action. Actions after it are
    /// not run.
    pub fn mark_restored(&self) -> Result<(), HookError> {
        let phase = self.phase();
        let Some(state) = self.state(phase) else {
            return Ok(());
        };

        let actions = {
            let mut hooks = state.hooks.lock();
            if hooks.restored {
                return Ok(());
            }
            hooks.restored = true;
            core::mem::take(&mut hooks.restore_actions)
        };

        tracing::debug!(%phase, actions = actions.len(), "checkpoint phase restored");
        for action in actions {
            action.restore()?;
        }
        Ok(())
    }

    /// Runs `action` once the process has been restored.
    ///
    /// If no checkpoint is in progress, or the current phase has already been
    /// restored, `action` runs immediately on the calling thread and
    /// `Ok(false)` is returned. Otherwise the action is deferred until
    /// [`mark_restored`](Self::mark_restored) and `Ok(true)` is returned.
    /// Unlike a hook, a deferred action is accepted even after draining has
    /// started.
    ///
    /// # Errors
    ///
    /// The action's own error when it ran immediately.
    pub fn on_restore(
        &self,
        action: impl Fn() -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Result<bool, HookError> {
        let hook: SharedHook = Arc::new(FnHook::new("on-restore").on_restore(action));
        let phase = self.phase();

        if let Some(state) = self.state(phase) {
            let mut hooks = state.hooks.lock();
            if !hooks.restored {
                hooks.restore_actions.push(hook);
                tracing::debug!(%phase, "restore action deferred");
                return Ok(true);
            }
        }

        hook.restore()?;
        Ok(false)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PhaseRef
// ─────────────────────────────────────────────────────────────────────────────

/// A phase as seen through its registry.
///
/// Subsystems typically hold `registry.current()` and add their hooks to it.
#[derive(Clone, Copy)]
pub struct PhaseRef<'r> {
    registry: &'r PhaseRegistry,
    phase: Phase,
}

impl PhaseRef<'_> {
    /// The phase this view refers to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// See [`PhaseRegistry::is_restored`].
    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.registry.is_restored(self.phase)
    }

    /// See [`PhaseRegistry::add_hook`].
    ///
    /// # Errors
    ///
    /// [`PhaseError::NotCurrentPhase`] if this phase is no longer current.
    pub fn add_hook(&self, hook: SharedHook, multi_threaded: bool) -> Result<bool, PhaseError> {
        self.registry.add_hook(self.phase, hook, multi_threaded)
    }

    /// Adds a hook that must run while the rest of the process is paused.
    ///
    /// # Errors
    ///
    /// [`PhaseError::NotCurrentPhase`] if this phase is no longer current.
    pub fn add_single_threaded_hook(&self, hook: SharedHook) -> Result<bool, PhaseError> {
        self.add_hook(hook, false)
    }

    /// Adds a hook that may run alongside other threads.
    ///
    /// # Errors
    ///
    /// [`PhaseError::NotCurrentPhase`] if this phase is no longer current.
    pub fn add_multi_threaded_hook(&self, hook: SharedHook) -> Result<bool, PhaseError> {
        self.add_hook(hook, true)
    }
}

impl fmt::Debug for PhaseRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PhaseRef").field(&self.phase).finish()
    }
}

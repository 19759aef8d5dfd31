//! Checkpoint phase coordination.
//!
//! `checkpoint_phase` lets independent subsystems register prepare/restore
//! callbacks around a process snapshot taken at a named point of startup:
//!
//! - [`Phase`] - The lifecycle stages at which a checkpoint can be taken
//! - [`PhaseRegistry`] - The current phase and the hooks registered against it
//! - [`CheckpointHook`] - The prepare/restore capability hooks implement
//! - [`PhaseHookAdapter`] - The top-level hook a snapshot driver runs
//!
//! Hooks are split into two sets: single-threaded hooks run while the rest of
//! the process is paused, multi-threaded hooks may run alongside other
//! threads. The registry keeps the sets apart; deciding when each runs is the
//! snapshot driver's job.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use checkpoint_phase::{CheckpointHook, FnHook, PhaseRegistry};
//!
//! let registry = Arc::new(PhaseRegistry::new());
//! registry.set_phase(Some("applications"));
//!
//! registry
//!     .current()
//!     .add_multi_threaded_hook(Arc::new(
//!         FnHook::new("connection-pool")
//!             .on_prepare(|| Ok(()))
//!             .on_restore(|| Ok(())),
//!     ))
//!     .unwrap();
//!
//! let adapter = registry.hook_adapter(true);
//! adapter.prepare().unwrap();
//! // ... the snapshot is taken and resumed ...
//! adapter.restore().unwrap();
//! registry.mark_restored().unwrap();
//! assert!(registry.current().is_restored());
//! ```

mod adapter;
mod error;
mod hook;
mod phase;
mod registry;

pub use adapter::PhaseHookAdapter;
pub use error::PhaseError;
pub use hook::{CheckpointHook, FnHook, HookError};
pub use phase::Phase;
pub use registry::{PhaseRef, PhaseRegistry, SharedHook};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        CheckpointHook, FnHook, HookError, Phase, PhaseError, PhaseHookAdapter, PhaseRef,
        PhaseRegistry, SharedHook,
    };
}

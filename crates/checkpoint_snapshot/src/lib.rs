//! Snapshot-side coordination for checkpoint/restore.
//!
//! This crate drives a checkpoint once startup has reached the configured
//! [`Phase`](checkpoint_phase::Phase):
//!
//! - [`CheckpointDriver`] - Runs every hook around the native snapshot
//! - [`SnapshotHook`] / [`SnapshotHookFactory`] - Abort-aware hooks created per checkpoint
//! - [`Checkpoint`] - Seam for the native facility that writes the image
//! - [`SnapshotFailed`] - Why a checkpoint did not complete
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use std::sync::Arc;
//! use checkpoint_phase::{FnHook, PhaseRegistry};
//! use checkpoint_snapshot::{CheckpointDriver, InProcessCheckpoint};
//!
//! let registry = Arc::new(PhaseRegistry::new());
//! registry.set_phase(Some("features"));
//! registry
//!     .current()
//!     .add_single_threaded_hook(Arc::new(FnHook::new("timers")))
//!     .unwrap();
//!
//! let driver = CheckpointDriver::new(Arc::clone(&registry), InProcessCheckpoint::new());
//! driver.snapshot(Path::new("checkpoint/image")).unwrap();
//! assert!(registry.current().is_restored());
//! ```

mod driver;
mod error;
mod hook;
mod native;

pub use driver::CheckpointDriver;
pub use error::{SnapshotFailed, SnapshotFailedKind, SnapshotResult};
pub use hook::{SnapshotHook, SnapshotHookFactory};
pub use native::{Checkpoint, InProcessCheckpoint, UnsupportedCheckpoint};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        Checkpoint, CheckpointDriver, InProcessCheckpoint, SnapshotFailed, SnapshotFailedKind,
        SnapshotHook, SnapshotHookFactory, SnapshotResult, UnsupportedCheckpoint,
    };
}

//! Checkpoint/restore phase coordination for server processes.
//!

pub use checkpoint_internal::*;

/// The `tracing` crate the checkpoint crates emit their events through.
#[cfg(feature = "tracing")]
pub use tracing;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use checkpoint_internal::prelude::*;
}

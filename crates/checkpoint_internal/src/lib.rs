//! # Checkpoint Internal Library
//!
//! Re-exports the checkpoint crates for convenience.

/// Phase registry and hook coordination.
pub use checkpoint_phase;

/// Snapshot hooks, native facility seam and driver.
pub use checkpoint_snapshot;

/// Environment-driven startup wiring.
pub use checkpoint_launcher;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use checkpoint_launcher::{LaunchConfig, Launcher, TracingFormat, init_tracing};
    pub use checkpoint_phase::prelude::*;
    pub use checkpoint_snapshot::prelude::*;
}

//! Error types for the phase registry.

use thiserror::Error;

use crate::phase::Phase;

/// Usage errors raised by [`PhaseRegistry`](crate::PhaseRegistry).
///
/// Late registrations are not errors; they are reported as a `false` return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhaseError {
    /// A hook was added to a phase that is not the process's current phase.
    #[error("cannot add a hook to phase {requested}: the current phase is {current}")]
    NotCurrentPhase {
        /// The phase the caller tried to add to.
        requested: Phase,
        /// The phase the process is actually in.
        current: Phase,
    },
}

//! The lifecycle stages at which a checkpoint can be taken.

use core::fmt;

/// A named point in server startup at which a snapshot may be taken.
///
/// Concrete phases are ordered by startup progression
/// (`Features < Applications < Deployment`). [`Phase::Inactive`] is the
/// sentinel for "no checkpoint in this run" and sorts last.
///
/// The enum itself carries no state. Per-phase hook lists and flags live in
/// the [`PhaseRegistry`](crate::PhaseRegistry) that owns the process's
/// current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Checkpoint after the configured features have started.
    Features = 0,
    /// Checkpoint after applications are installed but before they start.
    Applications = 1,
    /// Checkpoint after applications have been deployed.
    Deployment = 2,
    /// No checkpoint is being performed.
    Inactive = 3,
}

impl Phase {
    /// Every phase, in declaration order.
    pub const ALL: [Phase; 4] = [
        Phase::Features,
        Phase::Applications,
        Phase::Deployment,
        Phase::Inactive,
    ];

    /// The phases that can actually host a checkpoint.
    pub const CONCRETE: [Phase; 3] = [Phase::Features, Phase::Applications, Phase::Deployment];

    /// Returns the stable, upper-case name of this phase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Features => "FEATURES",
            Phase::Applications => "APPLICATIONS",
            Phase::Deployment => "DEPLOYMENT",
            Phase::Inactive => "INACTIVE",
        }
    }

    /// Returns `true` for the [`Phase::Inactive`] sentinel.
    #[must_use]
    pub const fn is_inactive(self) -> bool {
        matches!(self, Phase::Inactive)
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    pub(crate) const fn from_index(index: u8) -> Phase {
        match index {
            0 => Phase::Features,
            1 => Phase::Applications,
            2 => Phase::Deployment,
            _ => Phase::Inactive,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

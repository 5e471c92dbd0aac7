//! Compile phases
//!
//! One compile call walks
//! `Declared → GraphBuilt → BaseComposed → PolicyAttached → Labeled → Validated`
//! and ends in exactly one terminal phase. There is no retry phase: a
//! failed compile is re-run by the caller with corrected input.

use serde::Serialize;
use tracing::debug;

/// Where a compile call is
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CompilePhase {
    /// Declaration accepted
    Declared,
    /// Application located in the dependency graph
    GraphBuilt,
    /// Workload resources generated
    BaseComposed,
    /// NetworkPolicy and RBAC generated
    PolicyAttached,
    /// Reserved metadata written
    Labeled,
    /// Every resource validated
    Validated,
    /// All resources valid
    Succeeded,
    /// Only non-mandated resources were invalid and were dropped
    PartiallySucceeded,
    /// A fatal error ended the compile
    Failed,
}

impl CompilePhase {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PartiallySucceeded | Self::Failed
        )
    }

    /// Next non-terminal phase, `None` from `Validated` and terminal phases
    pub fn next(&self) -> Option<CompilePhase> {
        match self {
            Self::Declared => Some(Self::GraphBuilt),
            Self::GraphBuilt => Some(Self::BaseComposed),
            Self::BaseComposed => Some(Self::PolicyAttached),
            Self::PolicyAttached => Some(Self::Labeled),
            Self::Labeled => Some(Self::Validated),
            Self::Validated | Self::Succeeded | Self::PartiallySucceeded | Self::Failed => None,
        }
    }

    /// Phase name as written in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Declared => "Declared",
            Self::GraphBuilt => "GraphBuilt",
            Self::BaseComposed => "BaseComposed",
            Self::PolicyAttached => "PolicyAttached",
            Self::Labeled => "Labeled",
            Self::Validated => "Validated",
            Self::Succeeded => "Succeeded",
            Self::PartiallySucceeded => "PartiallySucceeded",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one compile call and logs each transition
#[derive(Debug)]
pub(crate) struct PhaseTracker<'a> {
    application: &'a str,
    phase: CompilePhase,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(application: &'a str) -> Self {
        debug!(app = application, phase = %CompilePhase::Declared, "compile started");
        Self {
            application,
            phase: CompilePhase::Declared,
        }
    }

    /// Advance to the next non-terminal phase
    pub(crate) fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            self.enter(next);
        }
    }

    /// Enter a phase directly (used for terminal phases)
    pub(crate) fn enter(&mut self, phase: CompilePhase) {
        debug!(app = self.application, from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    pub(crate) fn phase(&self) -> CompilePhase {
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_through_every_intermediate_phase() {
        let mut tracker = PhaseTracker::new("default/api");
        let mut seen = vec![tracker.phase()];
        while tracker.phase() != CompilePhase::Validated {
            tracker.advance();
            seen.push(tracker.phase());
        }
        assert_eq!(
            seen,
            vec![
                CompilePhase::Declared,
                CompilePhase::GraphBuilt,
                CompilePhase::BaseComposed,
                CompilePhase::PolicyAttached,
                CompilePhase::Labeled,
                CompilePhase::Validated,
            ]
        );
    }

    #[test]
    fn terminal_phases_have_no_successor() {
        for phase in [
            CompilePhase::Succeeded,
            CompilePhase::PartiallySucceeded,
            CompilePhase::Failed,
        ] {
            assert!(phase.is_terminal());
            assert_eq!(phase.next(), None);
        }
        assert!(!CompilePhase::Validated.is_terminal());
    }

    #[test]
    fn advance_stops_at_validated() {
        let mut tracker = PhaseTracker::new("default/api");
        for _ in 0..10 {
            tracker.advance();
        }
        assert_eq!(tracker.phase(), CompilePhase::Validated);
    }

    #[test]
    fn serializes_as_phase_name() {
        assert_eq!(
            serde_json::to_value(CompilePhase::PartiallySucceeded).unwrap(),
            "PartiallySucceeded"
        );
    }
}

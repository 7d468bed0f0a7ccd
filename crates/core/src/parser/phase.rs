//! Metadata/progress phase tracking.

use serde::{Deserialize, Serialize};

/// Parsing phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Metadata lines are still being classified.
    #[default]
    Open,
    /// Metadata is final; only progress lines are interpreted.
    Closed,
}

/// Event that ends the metadata phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTrigger {
    /// A `Stream mapping:` line.
    StreamMapping,
    /// The process exited.
    ProcessExit,
    /// The first progress line arrived.
    Progress,
}

impl PhaseTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamMapping => "stream_mapping",
            Self::ProcessExit => "process_exit",
            Self::Progress => "progress",
        }
    }
}

/// Two-state machine closing the metadata phase exactly once.
///
/// Any number of triggers may fire, in any order; only the first one
/// transitions `Open -> Closed`.
#[derive(Debug, Clone, Default)]
pub struct PhaseController {
    phase: Phase,
    closed_by: Option<PhaseTrigger>,
}

impl PhaseController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Trigger that closed the phase, once closed.
    pub fn closed_by(&self) -> Option<PhaseTrigger> {
        self.closed_by
    }

    /// Applies `trigger`. Returns `true` only for the transition that
    /// actually closed the phase.
    pub fn close(&mut self, trigger: PhaseTrigger) -> bool {
        match self.phase {
            Phase::Open => {
                self.phase = Phase::Closed;
                self.closed_by = Some(trigger);
                true
            }
            Phase::Closed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_open() {
        let controller = PhaseController::new();
        assert!(controller.is_open());
        assert_eq!(controller.closed_by(), None);
    }

    #[test]
    fn test_first_trigger_wins() {
        let mut controller = PhaseController::new();
        assert!(controller.close(PhaseTrigger::Progress));
        assert!(!controller.close(PhaseTrigger::StreamMapping));
        assert!(!controller.close(PhaseTrigger::ProcessExit));
        assert_eq!(controller.phase(), Phase::Closed);
        assert_eq!(controller.closed_by(), Some(PhaseTrigger::Progress));
    }

    #[test]
    fn test_repeated_trigger_is_noop() {
        let mut controller = PhaseController::new();
        assert!(controller.close(PhaseTrigger::ProcessExit));
        assert!(!controller.close(PhaseTrigger::ProcessExit));
        assert_eq!(controller.closed_by(), Some(PhaseTrigger::ProcessExit));
    }
}

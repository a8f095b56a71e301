//! Per-scan state machine.
//!
//! ```text
//! DISCOVERED ─→ EXTRACTING ─→ EXTRACTED ─→ FILTERING ─→ FILTERED ─→ RUNNING ─→ RUN_DONE
//!      └──────skip──────────────┘  └──────skip───────────┘  └────skip──────────┘
//!
//! RUN_DONE ─→ CAND_FILTERING ─→ CAND_DONE ─→ CLASSIFYING ─→ DONE
//!     └──────────skip─────────────┘  └──────────skip───────────┘
//!
//! any non-terminal state ──Fail──→ FAILED
//! ```

use std::fmt;

use super::stage::Stage;
use crate::errors::{FfaError, FfaResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Discovered,
    Extracting,
    Extracted,
    Filtering,
    Filtered,
    Running,
    RunDone,
    CandFiltering,
    CandDone,
    Classifying,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Gate says the stage is not needed.
    Skip,
    /// Stage work starts.
    Begin,
    Succeed,
    Fail,
}

impl ScanState {
    /// Stage waiting to start in this state, if the scan sits at a boundary.
    pub fn pending_stage(&self) -> Option<Stage> {
        match self {
            ScanState::Discovered => Some(Stage::Extract),
            ScanState::Extracted => Some(Stage::RfiFilter),
            ScanState::Filtered => Some(Stage::FfaRun),
            ScanState::RunDone => Some(Stage::CandidateFilter),
            ScanState::CandDone => Some(Stage::Classify),
            _ => None,
        }
    }

    /// Stage currently executing in this state.
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            ScanState::Extracting => Some(Stage::Extract),
            ScanState::Filtering => Some(Stage::RfiFilter),
            ScanState::Running => Some(Stage::FfaRun),
            ScanState::CandFiltering => Some(Stage::CandidateFilter),
            ScanState::Classifying => Some(Stage::Classify),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Done | ScanState::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Discovered => "DISCOVERED",
            ScanState::Extracting => "EXTRACTING",
            ScanState::Extracted => "EXTRACTED",
            ScanState::Filtering => "FILTERING",
            ScanState::Filtered => "FILTERED",
            ScanState::Running => "RUNNING",
            ScanState::RunDone => "RUN_DONE",
            ScanState::CandFiltering => "CAND_FILTERING",
            ScanState::CandDone => "CAND_DONE",
            ScanState::Classifying => "CLASSIFYING",
            ScanState::Done => "DONE",
            ScanState::Failed => "FAILED",
        }
    }

    /// Apply a transition. Moves not in the diagram are `InvalidState`.
    pub fn advance(self, transition: Transition) -> FfaResult<ScanState> {
        let next = match (transition, self) {
            (Transition::Fail, s) if !s.is_terminal() => Some(ScanState::Failed),
            (Transition::Skip, s) => s.pending_stage().map(Self::after),
            (Transition::Begin, s) => s.pending_stage().map(Self::during),
            (Transition::Succeed, s) => s.active_stage().map(Self::after),
            _ => None,
        };
        next.ok_or_else(|| {
            FfaError::InvalidState(format!(
                "cannot apply {:?} in state {}",
                transition,
                self.name()
            ))
        })
    }

    fn during(stage: Stage) -> ScanState {
        match stage {
            Stage::Extract => ScanState::Extracting,
            Stage::RfiFilter => ScanState::Filtering,
            Stage::FfaRun => ScanState::Running,
            Stage::CandidateFilter => ScanState::CandFiltering,
            Stage::Classify => ScanState::Classifying,
        }
    }

    fn after(stage: Stage) -> ScanState {
        match stage {
            Stage::Extract => ScanState::Extracted,
            Stage::RfiFilter => ScanState::Filtered,
            Stage::FfaRun => ScanState::RunDone,
            Stage::CandidateFilter => ScanState::CandDone,
            Stage::Classify => ScanState::Done,
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_run_through_all_stages() {
        let mut state = ScanState::Discovered;
        for _ in Stage::ALL {
            state = state.advance(Transition::Begin).unwrap();
            assert!(state.active_stage().is_some());
            state = state.advance(Transition::Succeed).unwrap();
        }
        assert_eq!(state, ScanState::Done);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_skip_moves_past_stage() {
        assert_eq!(
            ScanState::Discovered.advance(Transition::Skip).unwrap(),
            ScanState::Extracted
        );
        assert_eq!(
            ScanState::RunDone.advance(Transition::Skip).unwrap(),
            ScanState::CandDone
        );
        assert_eq!(
            ScanState::CandDone.advance(Transition::Skip).unwrap(),
            ScanState::Done
        );
    }

    #[test]
    fn test_fail_from_any_non_terminal() {
        assert_eq!(
            ScanState::Discovered.advance(Transition::Fail).unwrap(),
            ScanState::Failed
        );
        assert_eq!(
            ScanState::Running.advance(Transition::Fail).unwrap(),
            ScanState::Failed
        );
        assert!(ScanState::Done.advance(Transition::Fail).is_err());
        assert!(ScanState::Failed.advance(Transition::Fail).is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        for (state, transition) in [
            (ScanState::Discovered, Transition::Succeed),
            (ScanState::Extracting, Transition::Begin),
            (ScanState::Extracting, Transition::Skip),
            (ScanState::Done, Transition::Begin),
            (ScanState::Failed, Transition::Skip),
        ] {
            let err = state.advance(transition).unwrap_err();
            assert!(matches!(err, FfaError::InvalidState(_)), "{state} {transition:?}");
        }
    }
}

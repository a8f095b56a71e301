//! Stage enumeration.

use std::fmt;

/// How a stage's work is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageExecution {
    /// One rank per host through the distributed launcher.
    Distributed,
    /// A single command batch on one host.
    Remote,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Extract,
    RfiFilter,
    FfaRun,
    CandidateFilter,
    Classify,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Extract,
        Stage::RfiFilter,
        Stage::FfaRun,
        Stage::CandidateFilter,
        Stage::Classify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extract => "EXTRACT",
            Stage::RfiFilter => "RFI_FILTER",
            Stage::FfaRun => "FFA_RUN",
            Stage::CandidateFilter => "CANDIDATE_FILTER",
            Stage::Classify => "CLASSIFY",
        }
    }

    pub fn execution(&self) -> StageExecution {
        match self {
            Stage::Extract | Stage::RfiFilter | Stage::FfaRun => StageExecution::Distributed,
            Stage::CandidateFilter | Stage::Classify => StageExecution::Remote,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

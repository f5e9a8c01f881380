use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Error raised from inside a case body. Conversion errors (`ParseIntError`,
/// `ParseFloatError`, ...) and plain strings convert into it with `?`.
pub type CaseError = Box<dyn StdError + Send + Sync>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("workload seed must contain at least one element")]
    InvalidWorkloadSeed,

    #[error("benchmark case '{0}' is already registered")]
    DuplicateCaseName(String),

    #[error("no benchmark case named '{0}'")]
    CaseNotFound(String),

    #[error(
        "timing did not stabilise after {rounds} rounds: {iterations} iterations took {elapsed:?} (need {min_time:?})"
    )]
    UnstableTiming {
        rounds: u32,
        iterations: u64,
        elapsed: Duration,
        min_time: Duration,
    },

    #[error("elapsed time is zero after {iterations} iterations; cannot compute a rate")]
    DivisionByZeroTiming { iterations: u64 },

    #[error("case body failed: {0}")]
    CaseFailed(#[source] CaseError),

    #[error("no benchmark case matches filter '{filter}'")]
    NoMatchingCases { filter: String },

    #[error("invalid case filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("invalid block file: {0}")]
    InvalidBlockFile(String),

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Stable identifier used in report rows.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::InvalidWorkloadSeed => "InvalidWorkloadSeed",
            HarnessError::DuplicateCaseName(_) => "DuplicateCaseName",
            HarnessError::CaseNotFound(_) => "CaseNotFound",
            HarnessError::UnstableTiming { .. } => "UnstableTiming",
            HarnessError::DivisionByZeroTiming { .. } => "DivisionByZeroTiming",
            HarnessError::CaseFailed(_) => "CaseFailed",
            HarnessError::NoMatchingCases { .. } => "NoMatchingCases",
            HarnessError::InvalidFilter(_) => "InvalidFilter",
            HarnessError::InvalidBlockFile(_) => "InvalidBlockFile",
            HarnessError::ThreadPool(_) => "ThreadPool",
            HarnessError::Io(_) => "Io",
            HarnessError::Json(_) => "Json",
        }
    }

    /// Errors that belong to a single case run and must not stop the suite.
    pub fn is_case_local(&self) -> bool {
        matches!(
            self,
            HarnessError::CaseFailed(_)
                | HarnessError::UnstableTiming { .. }
                | HarnessError::DivisionByZeroTiming { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;

use clap::ValueEnum;

pub mod cases;
pub mod driver;
pub mod error;
pub mod harness;
pub mod registry;
pub mod report;
pub mod schema;
pub mod workload;

pub use error::{CaseError, HarnessError, Result};

/// How the result table is written to stdout.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable columns.
    #[default]
    Table,
    /// The full report as pretty-printed JSON.
    Json,
}

//! Simulator statistics report parser.
//!
//! - [`schema`] - declarative table layouts and the generic table reader
//! - [`trace`] - [`TraceStatistics`] extracted from a full report

pub mod schema;
pub mod trace;

pub use trace::{BufferActivity, OverlapMatrix, ResourceActivity, TraceStatistics};

use thiserror::Error;

/// Errors raised while reading a statistics report.
///
/// The report layout is fixed by the simulator. Any mismatch means the
/// report and this analyzer disagree on the format, so nothing is guessed.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required table title was not found.
    #[error("section `{section}` not found in report")]
    SectionNotFound {
        /// Table name.
        section: &'static str,
    },

    /// A data row is too short or holds an unparseable value.
    #[error("malformed row in `{section}` at line {line}: {reason}")]
    MalformedRow {
        /// Table name.
        section: &'static str,
        /// 1-based line number in the report.
        line: usize,
        /// What was wrong with the row.
        reason: String,
    },
}

//! Crate-level error type.

use thiserror::Error;

use crate::hardware::HardwareError;
use crate::parser::ReportError;
use crate::runner::RunError;

/// Any failure of an analysis run.
#[derive(Debug, Error)]
pub enum ErmError {
    #[error("report: {0}")]
    Report(#[from] ReportError),

    #[error("hardware config: {0}")]
    Hardware(#[from] HardwareError),

    #[error("run: {0}")]
    Run(#[from] RunError),

    #[error("JSON export failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ErmError>;

//! The analysis pipeline: parse report, load hardware, compute bounds, assemble.

use std::path::Path;

use crate::config::RunConfig;
use crate::error::Result;
use crate::hardware::HardwareConfig;
use crate::model::{BoundTable, ErmModel};
use crate::parser::TraceStatistics;

/// Everything derived from one report.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub stats: TraceStatistics,
    pub hardware: HardwareConfig,
    pub bounds: BoundTable,
    pub model: ErmModel,
}

/// Analyze the report at `report` under `run`.
///
/// Any parse or configuration error aborts the run; no partial model is
/// returned.
pub fn analyze(report: &Path, run: &RunConfig) -> Result<Analysis> {
    let stats = TraceStatistics::from_file(report)?;
    let hardware = HardwareConfig::load(&run.configs_dir, &run.uarch, run.precision)?;
    analyze_with(stats, hardware, run)
}

/// Run the computation stages on already loaded inputs.
pub fn analyze_with(stats: TraceStatistics, hardware: HardwareConfig, run: &RunConfig) -> Result<Analysis> {
    let bounds = BoundTable::compute(&stats, &hardware)?;
    let model = ErmModel::assemble(&stats, &bounds, run);
    Ok(Analysis { stats, hardware, bounds, model })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErmError;
    use crate::hardware::tests::sb;
    use crate::hardware::{HardwareError, Precision};
    use crate::parser::trace::tests::stats;
    use crate::parser::ReportError;
    use std::path::PathBuf;

    #[test]
    fn test_analyze_with() {
        let analysis = analyze_with(stats(), sb(Precision::Double), &RunConfig::default()).unwrap();
        assert_eq!(analysis.bounds.total_flops(), 800.0);
        assert!(!analysis.model.horizontal.is_empty());
        assert!(!analysis.model.diagonal.is_empty());
    }

    #[test]
    fn test_missing_report() {
        let err = analyze(Path::new("/nonexistent/erm.out"), &RunConfig::default()).unwrap_err();
        assert!(matches!(err, ErmError::Report(ReportError::Io(_))));
    }

    #[test]
    fn test_missing_descriptor() {
        let report = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/mmm-sb.out");
        let run = RunConfig {
            uarch: "NOPE".to_string(),
            configs_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs"),
            ..RunConfig::default()
        };
        let err = analyze(&report, &run).unwrap_err();
        assert!(matches!(err, ErmError::Hardware(HardwareError::ConfigNotFound { .. })));
    }
}

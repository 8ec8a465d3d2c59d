//! Persisting an analysis.
//!
//! - [`write_json`] writes the assembled [`ErmModel`] as one JSON document.
//! - [`write_legacy`] writes the intermediate one-value-per-file layout the
//!   older plotting scripts read, every name suffixed with the series
//!   (the report's file name).
//!
//! | File                                      | Content                         |
//! |-------------------------------------------|---------------------------------|
//! | `<res>_throughput_<s>`                    | theoretical bound               |
//! | `<buf>_throughput_<s>`                    | simulator stall bound           |
//! | `<res>_ops_<s>`                           | operations, or bytes for memory |
//! | `performance_<res>_<k>_<s>`               | bound `k` (see [`perf_index`])  |
//! | `<a>_<b>_overlap_{without,with}_stalls_<s>` | overlap fraction              |
//! | `flops_<s>`, `bytes_transferred_<s>`, `tsc_<s>` | run totals                  |

use std::fs;
use std::path::{Path, PathBuf};

use super::{BoundTable, ErmModel};
use crate::error::Result;
use crate::parser::TraceStatistics;
use crate::resource::Buffer;

/// Write the model as pretty-printed JSON.
pub fn write_json(path: &Path, model: &ErmModel) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(model)?;
    fs::write(path, json)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Legacy index of each bound in `performance_<res>_<k>` files.
pub mod perf_index {
    pub const ISSUE: usize = 0;
    pub const LATENCY: usize = 1;
    /// Buffers occupy `BUFFER_BASE..BUFFER_BASE + 5`.
    pub const BUFFER_BASE: usize = 2;
    pub const COMBINED: usize = 7;
}

struct LegacyWriter<'a> {
    dir: &'a Path,
    serie: &'a str,
    written: usize,
}

impl LegacyWriter<'_> {
    fn write(&mut self, stem: &str, value: f64) -> Result<()> {
        fs::write(legacy_path(self.dir, stem, self.serie), value.to_string())?;
        self.written += 1;
        Ok(())
    }
}

/// Write every bound and count as its own file in `dir`.
///
/// Returns the number of files written.
pub fn write_legacy(dir: &Path, serie: &str, stats: &TraceStatistics, bounds: &BoundTable) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let mut out = LegacyWriter { dir, serie, written: 0 };

    for set in bounds.iter() {
        let name = set.resource.name();
        out.write(&format!("{}_throughput", name), set.theoretical)?;
        out.write(&format!("{}_ops", name), set.volume)?;

        let performance = |k: usize| format!("performance_{}_{}", name, k);
        out.write(&performance(perf_index::ISSUE), set.issue)?;
        out.write(&performance(perf_index::LATENCY), set.latency)?;
        for buffer in Buffer::ALL {
            out.write(&performance(perf_index::BUFFER_BASE + buffer.ordinal()), set.buffer(buffer))?;
        }
        out.write(&performance(perf_index::COMBINED), set.combined)?;
    }

    for buffer in Buffer::ALL {
        out.write(&format!("{}_throughput", buffer), bounds.stall_bound(buffer))?;
    }

    for (variant, matrix) in [
        ("without_stalls", stats.overlap_without_stalls()),
        ("with_stalls", stats.overlap_with_stalls()),
    ] {
        for (a, b, fraction) in matrix.pairs() {
            out.write(&format!("{}_{}_overlap_{}", a, b, variant), fraction)?;
        }
    }

    out.write("flops", bounds.total_flops())?;
    out.write("bytes_transferred", bounds.total_bytes())?;
    out.write("tsc", bounds.total_cycles())?;

    log::info!("Wrote {} legacy files to {}", out.written, dir.display());
    Ok(out.written)
}

/// Path of one legacy file.
pub fn legacy_path(dir: &Path, stem: &str, serie: &str) -> PathBuf {
    dir.join(format!("{}_{}", stem, serie))
}

/// Legacy series name of a report: its file name.
pub fn serie_of(report: &Path) -> String {
    report
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "erm.out".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::hardware::tests::sb;
    use crate::hardware::Precision;
    use crate::parser::trace::tests::stats;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("erm-export-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn read(path: PathBuf) -> f64 {
        fs::read_to_string(path).unwrap().parse().unwrap()
    }

    #[test]
    fn test_write_json() {
        let s = stats();
        let bounds = BoundTable::compute(&s, &sb(Precision::Double)).unwrap();
        let model = ErmModel::assemble(&s, &bounds, &RunConfig::default());

        let dir = scratch("json");
        let path = dir.join("nested").join("mmm.json");
        write_json(&path, &model).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["uarch"], "SB");
        assert_eq!(value["point"]["performance"], 1.6);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_legacy() {
        let s = stats();
        let bounds = BoundTable::compute(&s, &sb(Precision::Double)).unwrap();
        let dir = scratch("legacy");
        let written = write_legacy(&dir, "erm.out", &s, &bounds).unwrap();

        // Per resource: throughput, ops, 8 performances; buffers; two overlap triangles; totals.
        assert_eq!(written, 13 * 10 + 5 + 2 * 78 + 3);

        assert_eq!(read(legacy_path(&dir, "fadd_ops", "erm.out")), 400.0);
        assert_eq!(read(legacy_path(&dir, "l1_load_ops", "erm.out")), 6400.0);
        assert_eq!(read(legacy_path(&dir, "performance_fmov_0", "erm.out")), 4.0);
        assert_eq!(read(legacy_path(&dir, "performance_fadd_2", "erm.out")), 4.0);
        assert_eq!(read(legacy_path(&dir, "performance_fmov_7", "erm.out")), 0.0);
        assert_eq!(read(legacy_path(&dir, "sb_throughput", "erm.out")), -1.0);
        assert_eq!(read(legacy_path(&dir, "fadd_l1_load_overlap_without_stalls", "erm.out")), 0.6);
        assert_eq!(read(legacy_path(&dir, "fadd_l1_load_overlap_with_stalls", "erm.out")), 0.7);
        assert_eq!(read(legacy_path(&dir, "bytes_transferred", "erm.out")), 16640.0);
        assert_eq!(read(legacy_path(&dir, "tsc", "erm.out")), 500.0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_serie_of() {
        assert_eq!(serie_of(Path::new("output/erm.out")), "erm.out");
        assert_eq!(serie_of(Path::new("/")), "erm.out");
    }
}

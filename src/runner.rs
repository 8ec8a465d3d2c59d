//! Benchmark compilation and profiling.
//!
//! Produces the statistics report the analyzer consumes:
//!
//! 1. `clang -emit-llvm -O3 -c <src>/<benchmark>.c -o <bin>/<benchmark>.bc`
//! 2. `<lli_path>/lli -force-interpreter -function <function> -warm-cache
//!    -uarch <uarch> <bin>/<benchmark>.bc <input>`, with stderr captured into
//!    `<output>/erm.out`
//!
//! Both tools run synchronously, once, without retries.

use std::fs::{self, File};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

use crate::config::RunConfig;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to launch `{tool}`: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{tool}` exited with {status}")]
    ToolFailed { tool: String, status: ExitStatus },
}

fn tool_path(dir: &std::path::Path, name: &str) -> PathBuf {
    if dir.as_os_str().is_empty() {
        PathBuf::from(name)
    } else {
        dir.join(name)
    }
}

/// Bitcode produced for the benchmark.
pub fn bitcode_path(run: &RunConfig) -> PathBuf {
    run.bin_dir.join(format!("{}.bc", run.benchmark))
}

/// The clang invocation compiling the benchmark to bitcode.
pub fn compile_command(run: &RunConfig) -> Command {
    let mut cmd = Command::new(tool_path(&run.clang_path, "clang"));
    cmd.arg("-emit-llvm")
        .arg("-O3")
        .arg("-c")
        .arg(run.src_dir.join(format!("{}.c", run.benchmark)))
        .arg("-o")
        .arg(bitcode_path(run));
    cmd
}

/// The instrumented interpreter invocation; stderr is the report.
pub fn profile_command(run: &RunConfig) -> Command {
    let mut cmd = Command::new(tool_path(&run.lli_path, "lli"));
    cmd.arg("-force-interpreter")
        .arg("-function")
        .arg(&run.function)
        .arg("-warm-cache")
        .arg("-uarch")
        .arg(&run.uarch)
        .arg(bitcode_path(run))
        .arg(&run.input);
    cmd
}

fn execute(mut cmd: Command) -> Result<(), RunError> {
    let tool = cmd.get_program().to_string_lossy().into_owned();
    log::info!("Running {:?}", cmd);

    let status = cmd
        .status()
        .map_err(|source| RunError::Launch { tool: tool.clone(), source })?;

    if status.success() {
        Ok(())
    } else {
        Err(RunError::ToolFailed { tool, status })
    }
}

/// Compile and profile the configured benchmark.
///
/// Returns the path of the captured report.
pub fn run(run: &RunConfig) -> Result<PathBuf, RunError> {
    fs::create_dir_all(&run.bin_dir)?;
    fs::create_dir_all(&run.output_dir)?;

    execute(compile_command(run))?;

    let report = run.report_path();
    let mut profile = profile_command(run);
    profile.stderr(Stdio::from(File::create(&report)?));
    execute(profile)?;

    log::info!("Report written to {}", report.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn args(cmd: &Command) -> Vec<&OsStr> {
        cmd.get_args().collect()
    }

    #[test]
    fn test_compile_command() {
        let run = RunConfig::default();
        let cmd = compile_command(&run);
        assert_eq!(cmd.get_program(), "clang");
        assert_eq!(
            args(&cmd),
            ["-emit-llvm", "-O3", "-c", "src/mmm.c", "-o", "bin/mmm.bc"].map(OsStr::new)
        );
    }

    #[test]
    fn test_profile_command() {
        let run = RunConfig {
            uarch: "HW".to_string(),
            input: "64".to_string(),
            ..RunConfig::default()
        };
        let cmd = profile_command(&run);
        assert_eq!(cmd.get_program(), "/local/bin/lli");
        assert_eq!(
            args(&cmd),
            ["-force-interpreter", "-function", "mmm", "-warm-cache", "-uarch", "HW", "bin/mmm.bc", "64"].map(OsStr::new)
        );
    }

    #[test]
    fn test_missing_tool() {
        let run = RunConfig {
            clang_path: PathBuf::from("/nonexistent/erm-toolchain"),
            ..RunConfig::default()
        };
        let err = execute(compile_command(&run)).unwrap_err();
        assert!(matches!(err, RunError::Launch { .. }));
    }
}

//! Configuration management for erm-analyzer.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (ERM_CONFIGS_DIR, etc.)
//! 2. Project-local config file (`./erm.toml`)
//! 3. User config file (`~/.config/erm-analyzer/config.toml`)
//! 4. Built-in defaults
//!
//! The merged [`Config`] is resolved once into an immutable [`RunConfig`]
//! that is passed explicitly through the analysis pipeline.
//!
//! # Config File Format
//!
//! ```toml
//! # erm.toml
//! benchmark = "mmm"
//! uarch = "SB"
//! precision = "double"
//!
//! [plot]
//! issue = true
//! overlap = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hardware::Precision;

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = "erm.toml";

// ============================================================================
// Plot options
// ============================================================================

/// Which overlap table feeds the overlap curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapVariant {
    #[default]
    WithoutStalls,
    WithStalls,
}

/// Axis limits, sampling and the bound families to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotOptions {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Points per overlap curve.
    pub samples: usize,

    /// Unscaled hardware ceilings.
    pub theoretical: bool,
    /// Hardware ceilings normalised by workload share.
    pub workload_scaled: bool,
    pub issue: bool,
    pub latency: bool,
    pub combined: bool,
    /// Compute/memory overlap curves.
    pub overlap: bool,
    /// Memory/memory overlap curves.
    pub memory_overlap: bool,
    /// Draw buffers as standalone flat bounds instead of per resource.
    pub separate_buffers: bool,
    pub overlap_variant: OverlapVariant,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            x_min: 0.001,
            x_max: 30.0,
            y_min: 0.1,
            y_max: 14.0,
            samples: 200,
            theoretical: false,
            workload_scaled: true,
            issue: true,
            latency: true,
            combined: true,
            overlap: false,
            memory_overlap: false,
            separate_buffers: false,
            overlap_variant: OverlapVariant::WithoutStalls,
        }
    }
}

// ============================================================================
// Layered configuration
// ============================================================================

/// erm-analyzer configuration, as read from one source.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Benchmark name; the source is `<src_dir>/<benchmark>.c`.
    pub benchmark: Option<String>,
    /// Kernel function the interpreter profiles.
    pub function: Option<String>,
    /// Argument passed to the benchmark.
    pub input: Option<String>,
    pub precision: Option<Precision>,
    /// Microarchitecture identifier, selects `config<uarch>.json`.
    pub uarch: Option<String>,

    pub src_dir: Option<String>,
    pub bin_dir: Option<String>,
    pub output_dir: Option<String>,
    pub configs_dir: Option<String>,

    /// Directory holding the instrumented `lli`.
    pub lli_path: Option<String>,
    /// Directory holding `clang`; empty means search `PATH`.
    pub clang_path: Option<String>,

    pub plot: Option<PlotOptions>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `erm.toml`
    /// 3. User config `~/.config/erm-analyzer/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        log::debug!("Loaded configuration: {:?}", config);
        config
    }

    /// Resolve every unset field to its default.
    pub fn run_config(&self) -> RunConfig {
        fn or(value: &Option<String>, default: &str) -> String {
            value.clone().unwrap_or_else(|| default.to_string())
        }

        RunConfig {
            benchmark: or(&self.benchmark, "mmm"),
            function: or(&self.function, "mmm"),
            input: or(&self.input, "20"),
            precision: self.precision.unwrap_or_default(),
            uarch: or(&self.uarch, "SB"),
            src_dir: PathBuf::from(or(&self.src_dir, "src")),
            bin_dir: PathBuf::from(or(&self.bin_dir, "bin")),
            output_dir: PathBuf::from(or(&self.output_dir, "output")),
            configs_dir: PathBuf::from(or(&self.configs_dir, "configs")),
            lli_path: PathBuf::from(or(&self.lli_path, "/local/bin")),
            clang_path: PathBuf::from(or(&self.clang_path, "")),
            plot: self.plot.clone().unwrap_or_default(),
        }
    }

    /// Load user configuration from ~/.config/erm-analyzer/config.toml
    fn load_user_config() -> Option<Self> {
        Self::load_from_file(&Self::user_config_path()?)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    pub fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.benchmark, other.benchmark);
        take(&mut self.function, other.function);
        take(&mut self.input, other.input);
        take(&mut self.precision, other.precision);
        take(&mut self.uarch, other.uarch);
        take(&mut self.src_dir, other.src_dir);
        take(&mut self.bin_dir, other.bin_dir);
        take(&mut self.output_dir, other.output_dir);
        take(&mut self.configs_dir, other.configs_dir);
        take(&mut self.lli_path, other.lli_path);
        take(&mut self.clang_path, other.clang_path);
        take(&mut self.plot, other.plot);
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        let vars: [(&str, &mut Option<String>); 5] = [
            ("ERM_CONFIGS_DIR", &mut self.configs_dir),
            ("ERM_OUTPUT_DIR", &mut self.output_dir),
            ("ERM_LLI_PATH", &mut self.lli_path),
            ("ERM_CLANG_PATH", &mut self.clang_path),
            ("ERM_UARCH", &mut self.uarch),
        ];
        for (name, slot) in vars {
            if let Ok(value) = std::env::var(name) {
                log::info!("Using {} from environment: {}", name, value);
                *slot = Some(value);
            }
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("erm-analyzer").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# erm-analyzer configuration
# Place this file at ~/.config/erm-analyzer/config.toml or ./erm.toml

# Benchmark compiled from <src_dir>/<benchmark>.c and the profiled function
benchmark = "mmm"
function = "mmm"
input = "20"

# Floating-point precision of the kernel: "single" or "double"
precision = "double"

# Microarchitecture, selects <configs_dir>/config<uarch>.json
uarch = "SB"

# src_dir = "src"
# bin_dir = "bin"
# output_dir = "output"
# configs_dir = "configs"

# Directory containing the instrumented lli interpreter
# lli_path = "/local/bin"
# Directory containing clang (empty: search PATH)
# clang_path = ""

[plot]
x_min = 0.001
x_max = 30.0
y_min = 0.1
y_max = 14.0
samples = 200
theoretical = false
workload_scaled = true
issue = true
latency = true
combined = true
overlap = false
memory_overlap = false
separate_buffers = false
# "without-stalls" or "with-stalls"
overlap_variant = "without-stalls"
"#
        .to_string()
    }
}

// ============================================================================
// Resolved run configuration
// ============================================================================

/// Fully resolved settings for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub benchmark: String,
    pub function: String,
    pub input: String,
    pub precision: Precision,
    pub uarch: String,
    pub src_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub output_dir: PathBuf,
    pub configs_dir: PathBuf,
    pub lli_path: PathBuf,
    pub clang_path: PathBuf,
    pub plot: PlotOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Config::default().run_config()
    }
}

impl RunConfig {
    /// Where the simulator report of a run is captured.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("erm.out")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let run = Config::default().run_config();
        assert_eq!(run.benchmark, "mmm");
        assert_eq!(run.uarch, "SB");
        assert_eq!(run.precision, Precision::Double);
        assert_eq!(run.configs_dir, PathBuf::from("configs"));
        assert_eq!(run.report_path(), PathBuf::from("output/erm.out"));

        let plot = run.plot;
        assert!(!plot.theoretical && plot.workload_scaled && plot.issue);
        assert!(plot.latency && plot.combined);
        assert!(!plot.overlap && !plot.separate_buffers);
        assert_eq!(plot.samples, 200);
        assert_eq!((plot.x_min, plot.x_max), (0.001, 30.0));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config {
            benchmark: Some("base".to_string()),
            uarch: Some("SB".to_string()),
            ..Default::default()
        };

        let overlay = Config {
            uarch: Some("HW".to_string()),
            precision: Some(Precision::Single),
            ..Default::default()
        };

        base.merge(overlay);

        // benchmark unchanged (overlay was None)
        assert_eq!(base.benchmark.as_deref(), Some("base"));
        assert_eq!(base.uarch.as_deref(), Some("HW"));
        assert_eq!(base.precision, Some(Precision::Single));
    }

    #[test]
    fn test_partial_plot_table() {
        let config: Config = toml::from_str("[plot]\noverlap = true\noverlap_variant = \"with-stalls\"\n").unwrap();
        let plot = config.run_config().plot;
        assert!(plot.overlap);
        assert_eq!(plot.overlap_variant, OverlapVariant::WithStalls);
        // Unspecified keys keep their defaults.
        assert!(plot.issue);
        assert_eq!(plot.y_max, 14.0);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("erm-config-test-{}.toml", std::process::id()));
        std::fs::write(&path, "benchmark = \"stencil\"\nprecision = \"single\"\n").unwrap();
        let config = Config::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.benchmark.as_deref(), Some("stencil"));
        assert_eq!(config.precision, Some(Precision::Single));
        assert!(Config::load_from_file(&path).is_none());
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = Config::sample_config();
        let config: Config = toml::from_str(&sample).expect("Sample config should parse");
        assert_eq!(config.run_config().plot, PlotOptions::default());
    }
}

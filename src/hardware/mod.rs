//! Hardware configuration model.
//!
//! A [`HardwareConfig`] describes one simulated microarchitecture: per-unit
//! throughput, latency and parallel-issue width, buffer capacities, cache
//! sizes and memory-access granularities. It is loaded once per analysis run
//! from `config<ID>.json` and is immutable afterwards.
//!
//! # Descriptor layout
//!
//! Per-unit lists are flattened. Execution units (arithmetic and
//! data-movement resources) take two consecutive entries, single precision
//! first; the register file and memory levels take one entry each after
//! them:
//!
//! ```text
//! fadd.sp fadd.dp fmul.sp fmul.dp ... fmov.sp fmov.dp register l1_load ... mem
//! ```
//!
//! `mem-access-granularity` only covers byte-moving resources and starts at
//! the register file.

mod descriptor;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::Resource;
use descriptor::Descriptor;

/// Errors raised while loading or querying a hardware configuration.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// No descriptor exists for the requested identifier.
    #[error("no hardware configuration `{id}` (looked for {})", path.display())]
    ConfigNotFound {
        /// Requested configuration identifier.
        id: String,
        /// Path that was probed.
        path: PathBuf,
    },

    /// A required field is missing or not parseable.
    #[error("malformed hardware configuration field `{field}`: {reason}")]
    MalformedConfig {
        /// Descriptor key.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Parameter name not recognised.
    #[error("unknown hardware parameter `{0}`")]
    UnknownParameter(String),

    /// Resource index beyond what the descriptor covers.
    #[error("index {index} out of range for `{parameter}` ({len} entries)")]
    IndexOutOfRange {
        /// Parameter being looked up.
        parameter: ParameterKind,
        /// Offending index.
        index: usize,
        /// Number of entries available.
        len: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Floating-point precision selecting the variant of per-unit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    #[default]
    Double,
}

impl Precision {
    /// Offset within a single/double pair.
    #[inline]
    fn pair_offset(self) -> usize {
        match self {
            Precision::Single => 0,
            Precision::Double => 1,
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" | "sp" | "fp32" => Ok(Precision::Single),
            "double" | "dp" | "fp64" => Ok(Precision::Double),
            _ => Err(format!("unknown precision `{}`", s)),
        }
    }
}

/// Hardware parameters that can be queried from a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Throughput,
    Latency,
    ParallelIssue,
    MemAccessGranularity,
    ReservationStation,
    ReorderBuffer,
    LoadBuffer,
    StoreBuffer,
    LineFillBuffer,
    RegisterFileSize,
    L1CacheSize,
    L2CacheSize,
    LlcCacheSize,
    FetchBandwidth,
    MemoryModel,
    MemoryWordSize,
    CacheLineSize,
}

impl ParameterKind {
    pub const ALL: [ParameterKind; 17] = [
        ParameterKind::Throughput,
        ParameterKind::Latency,
        ParameterKind::ParallelIssue,
        ParameterKind::MemAccessGranularity,
        ParameterKind::ReservationStation,
        ParameterKind::ReorderBuffer,
        ParameterKind::LoadBuffer,
        ParameterKind::StoreBuffer,
        ParameterKind::LineFillBuffer,
        ParameterKind::RegisterFileSize,
        ParameterKind::L1CacheSize,
        ParameterKind::L2CacheSize,
        ParameterKind::LlcCacheSize,
        ParameterKind::FetchBandwidth,
        ParameterKind::MemoryModel,
        ParameterKind::MemoryWordSize,
        ParameterKind::CacheLineSize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParameterKind::Throughput => "throughput",
            ParameterKind::Latency => "latency",
            ParameterKind::ParallelIssue => "parallel-issue",
            ParameterKind::MemAccessGranularity => "mem-access-granularity",
            ParameterKind::ReservationStation => "rs",
            ParameterKind::ReorderBuffer => "rob",
            ParameterKind::LoadBuffer => "lb",
            ParameterKind::StoreBuffer => "sb",
            ParameterKind::LineFillBuffer => "lfb",
            ParameterKind::RegisterFileSize => "register-file-size",
            ParameterKind::L1CacheSize => "l1-cache-size",
            ParameterKind::L2CacheSize => "l2-cache-size",
            ParameterKind::LlcCacheSize => "llc-cache-size",
            ParameterKind::FetchBandwidth => "fetch-bw",
            ParameterKind::MemoryModel => "memory-model",
            ParameterKind::MemoryWordSize => "memory-word-size",
            ParameterKind::CacheLineSize => "cache-line-size",
        }
    }

    /// Whether the parameter is stored per resource.
    pub fn is_per_resource(self) -> bool {
        matches!(
            self,
            ParameterKind::Throughput
                | ParameterKind::Latency
                | ParameterKind::ParallelIssue
                | ParameterKind::MemAccessGranularity
        )
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterKind {
    type Err = HardwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| HardwareError::UnknownParameter(s.to_string()))
    }
}

/// Configuration of one simulated microarchitecture.
#[derive(Debug, Clone)]
pub struct HardwareConfig {
    id: String,
    precision: Precision,

    throughput: Vec<f64>,
    latency: Vec<f64>,
    parallel_issue: Vec<f64>,
    mem_access_granularity: Vec<f64>,

    reservation_station_size: f64,
    reorder_buffer_size: f64,
    load_buffer_size: f64,
    store_buffer_size: f64,
    line_fill_buffer_size: f64,
    register_file_size: f64,
    l1_cache_size: f64,
    l2_cache_size: f64,
    llc_cache_size: f64,
    fetch_bandwidth: f64,
    memory_model: f64,
    memory_word_size: f64,
    cache_line_size: f64,

    vector_code: bool,
    max_vector_width: f64,
}

impl HardwareConfig {
    /// Path of the descriptor for `id` inside `configs_dir`.
    pub fn descriptor_path(configs_dir: &Path, id: &str) -> PathBuf {
        configs_dir.join(format!("config{}.json", id))
    }

    /// Load the descriptor for `id` from `configs_dir`.
    pub fn load(configs_dir: &Path, id: &str, precision: Precision) -> Result<Self, HardwareError> {
        let path = Self::descriptor_path(configs_dir, id);
        if !path.is_file() {
            return Err(HardwareError::ConfigNotFound {
                id: id.to_string(),
                path,
            });
        }

        let text = std::fs::read_to_string(&path)?;
        let config = Self::from_json(id, &text, precision)?;
        log::info!("Loaded hardware configuration {} from {}", id, path.display());
        Ok(config)
    }

    /// Build a configuration from descriptor text.
    pub fn from_json(id: &str, text: &str, precision: Precision) -> Result<Self, HardwareError> {
        let d = Descriptor::parse(text)?;

        let config = Self {
            id: id.to_string(),
            precision,
            throughput: d.list("execution-units-throughput")?,
            latency: d.list("execution-units-latency")?,
            parallel_issue: d.list("execution-units-parallel-issue")?,
            mem_access_granularity: d.list("mem-access-granularity")?,
            reservation_station_size: d.scalar("reservation-station-size")?,
            reorder_buffer_size: d.scalar("reorder-buffer-size")?,
            load_buffer_size: d.scalar("load-buffer-size")?,
            store_buffer_size: d.scalar("store-buffer-size")?,
            line_fill_buffer_size: d.scalar("line-fill-buffer-size")?,
            register_file_size: d.scalar("register-file-size")?,
            l1_cache_size: d.scalar("l1-cache-size")?,
            l2_cache_size: d.scalar("l2-cache-size")?,
            llc_cache_size: d.scalar("llc-cache-size")?,
            fetch_bandwidth: d.scalar("instruction-fetch-bandwidth")?,
            memory_model: d.scalar("x86-memory-model")?,
            memory_word_size: d.scalar("memory-word-size")?,
            cache_line_size: d.scalar("cache-line-size")?,
            vector_code: d.flag("vector-code")?,
            max_vector_width: d.scalar("max-vector-width")?,
        };

        log::debug!(
            "Hardware config {}: {} throughput entries, vector code {}",
            id,
            config.throughput.len(),
            config.vector_code
        );
        Ok(config)
    }

    /// Configuration identifier (e.g. `SB`).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn vector_code(&self) -> bool {
        self.vector_code
    }

    pub fn max_vector_width(&self) -> f64 {
        self.max_vector_width
    }

    /// Look up a parameter as the bound calculator sees it.
    ///
    /// Throughput is scaled for vector code: execution units by the vector
    /// width, L1 load/store by two ports. Non-per-resource parameters ignore
    /// `resource_index`.
    pub fn get(&self, kind: ParameterKind, resource_index: usize) -> Result<f64, HardwareError> {
        let raw = self.raw(kind, resource_index)?;
        if kind != ParameterKind::Throughput || !self.vector_code {
            return Ok(raw);
        }

        // raw() already validated the index.
        let resource = Resource::ALL[resource_index];
        if resource.kind().is_execution_unit() {
            Ok(raw * self.max_vector_width)
        } else if resource.is_l1_port() {
            Ok(raw * 2.0)
        } else {
            Ok(raw)
        }
    }

    /// Look up a parameter exactly as stored in the descriptor.
    pub fn raw(&self, kind: ParameterKind, resource_index: usize) -> Result<f64, HardwareError> {
        let list = match kind {
            ParameterKind::Throughput => &self.throughput,
            ParameterKind::Latency => &self.latency,
            ParameterKind::ParallelIssue => &self.parallel_issue,
            ParameterKind::MemAccessGranularity => &self.mem_access_granularity,
            ParameterKind::ReservationStation => return Ok(self.reservation_station_size),
            ParameterKind::ReorderBuffer => return Ok(self.reorder_buffer_size),
            ParameterKind::LoadBuffer => return Ok(self.load_buffer_size),
            ParameterKind::StoreBuffer => return Ok(self.store_buffer_size),
            ParameterKind::LineFillBuffer => return Ok(self.line_fill_buffer_size),
            ParameterKind::RegisterFileSize => return Ok(self.register_file_size),
            ParameterKind::L1CacheSize => return Ok(self.l1_cache_size),
            ParameterKind::L2CacheSize => return Ok(self.l2_cache_size),
            ParameterKind::LlcCacheSize => return Ok(self.llc_cache_size),
            ParameterKind::FetchBandwidth => return Ok(self.fetch_bandwidth),
            ParameterKind::MemoryModel => return Ok(self.memory_model),
            ParameterKind::MemoryWordSize => return Ok(self.memory_word_size),
            ParameterKind::CacheLineSize => return Ok(self.cache_line_size),
        };

        let out_of_range = |index: usize| HardwareError::IndexOutOfRange {
            parameter: kind,
            index,
            len: list.len(),
        };

        let resource = Resource::from_index(resource_index).ok_or_else(|| out_of_range(resource_index))?;
        let position = match (kind, resource.kind()) {
            (ParameterKind::MemAccessGranularity, k) if k.moves_bytes() => {
                resource_index - Resource::Register.index()
            }
            (ParameterKind::MemAccessGranularity, _) => return Err(out_of_range(resource_index)),
            (_, k) if k.is_execution_unit() => resource_index * 2 + self.precision.pair_offset(),
            _ => resource_index + Resource::Register.index(),
        };

        list.get(position).copied().ok_or_else(|| out_of_range(position))
    }

    /// Scaled throughput of `resource`.
    pub fn throughput(&self, resource: Resource) -> Result<f64, HardwareError> {
        self.get(ParameterKind::Throughput, resource.index())
    }

    /// Parallel-issue width of `resource`; `None` when unbounded (the
    /// descriptor stores `-1`).
    pub fn parallel_issue(&self, resource: Resource) -> Result<Option<f64>, HardwareError> {
        let width = self.get(ParameterKind::ParallelIssue, resource.index())?;
        Ok(if width < 0.0 { None } else { Some(width) })
    }

    /// Bytes moved per access of a byte-moving resource.
    pub fn access_granularity(&self, resource: Resource) -> Result<f64, HardwareError> {
        self.get(ParameterKind::MemAccessGranularity, resource.index())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sandy Bridge-like descriptor used across the crate's tests.
    pub(crate) const SB_JSON: &str = r#"{
        "execution-units-throughput": "{1,1},{1,1},{1,1},{0.07,0.035},{1,1},{1,1},{1,1},{-1},{2},{1},{0.5},{0.25},{0.125}",
        "execution-units-latency": "{3,3},{5,5},{5,5},{14,22},{1,1},{1,1},{1,1},{0},{4},{4},{12},{30},{200}",
        "execution-units-parallel-issue": "{1,1},{1,1},{0,0},{1,1},{1,1},{1,1},{3,3},{-1},{2},{1},{1},{1},{1}",
        "mem-access-granularity": "{8},{8},{8},{64},{64},{64}",
        "reservation-station-size": "54",
        "reorder-buffer-size": "168",
        "load-buffer-size": "64",
        "store-buffer-size": "36",
        "line-fill-buffer-size": "10",
        "register-file-size": "16",
        "l1-cache-size": "32768",
        "l2-cache-size": "262144",
        "llc-cache-size": "20971520",
        "instruction-fetch-bandwidth": "4",
        "x86-memory-model": "1",
        "memory-word-size": "8",
        "cache-line-size": "64",
        "vector-code": "0",
        "max-vector-width": "4"
    }"#;

    pub(crate) fn sb(precision: Precision) -> HardwareConfig {
        HardwareConfig::from_json("SB", SB_JSON, precision).unwrap()
    }

    #[test]
    fn test_precision_pair_selection() {
        let dp = sb(Precision::Double);
        let sp = sb(Precision::Single);
        assert_eq!(dp.get(ParameterKind::Throughput, Resource::FDiv.index()).unwrap(), 0.035);
        assert_eq!(sp.get(ParameterKind::Throughput, Resource::FDiv.index()).unwrap(), 0.07);
        assert_eq!(dp.get(ParameterKind::Latency, Resource::FDiv.index()).unwrap(), 22.0);
    }

    #[test]
    fn test_flat_lookup_beyond_register() {
        let hw = sb(Precision::Double);
        assert_eq!(hw.throughput(Resource::Register).unwrap(), -1.0);
        assert_eq!(hw.throughput(Resource::L1Load).unwrap(), 2.0);
        assert_eq!(hw.throughput(Resource::Dram).unwrap(), 0.125);
        assert_eq!(hw.get(ParameterKind::Latency, Resource::Dram.index()).unwrap(), 200.0);
        assert_eq!(hw.parallel_issue(Resource::Register).unwrap(), None);
        assert_eq!(hw.parallel_issue(Resource::L1Load).unwrap(), Some(2.0));
    }

    #[test]
    fn test_granularity_indexed_from_register() {
        let hw = sb(Precision::Double);
        assert_eq!(hw.access_granularity(Resource::Register).unwrap(), 8.0);
        assert_eq!(hw.access_granularity(Resource::L2).unwrap(), 64.0);
        let err = hw
            .get(ParameterKind::MemAccessGranularity, Resource::FAdd.index())
            .unwrap_err();
        assert!(matches!(err, HardwareError::IndexOutOfRange { .. }));
    }

    #[test]
    fn test_vector_code_scaling() {
        let json = SB_JSON.replace(r#""vector-code": "0""#, r#""vector-code": "1""#);
        let hw = HardwareConfig::from_json("SB-vec", &json, Precision::Double).unwrap();
        assert!(hw.vector_code());
        assert_eq!(hw.throughput(Resource::FAdd).unwrap(), 4.0);
        assert_eq!(hw.throughput(Resource::L1Load).unwrap(), 4.0);
        assert_eq!(hw.throughput(Resource::L1Store).unwrap(), 2.0);
        assert_eq!(hw.throughput(Resource::L2).unwrap(), 0.5);
        // Raw lookups are never scaled.
        assert_eq!(hw.raw(ParameterKind::Throughput, Resource::FAdd.index()).unwrap(), 1.0);
    }

    #[test]
    fn test_scalars() {
        let hw = sb(Precision::Double);
        assert_eq!(hw.get(ParameterKind::ReorderBuffer, 0).unwrap(), 168.0);
        assert_eq!(hw.get(ParameterKind::CacheLineSize, 0).unwrap(), 64.0);
        assert_eq!(hw.get(ParameterKind::FetchBandwidth, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_index_out_of_range() {
        let hw = sb(Precision::Double);
        let err = hw.get(ParameterKind::Throughput, Resource::COUNT).unwrap_err();
        assert!(matches!(err, HardwareError::IndexOutOfRange { index: 13, .. }));

        let short = SB_JSON.replace("{0.25},{0.125}", "{0.25}");
        let hw = HardwareConfig::from_json("short", &short, Precision::Double).unwrap();
        let err = hw.throughput(Resource::Dram).unwrap_err();
        assert!(matches!(err, HardwareError::IndexOutOfRange { index: 19, len: 19, .. }));
    }

    #[test]
    fn test_unknown_parameter() {
        assert_eq!("rob".parse::<ParameterKind>().unwrap(), ParameterKind::ReorderBuffer);
        let err = "bogus".parse::<ParameterKind>().unwrap_err();
        assert!(matches!(err, HardwareError::UnknownParameter(ref name) if name == "bogus"));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let json = SB_JSON.replace(r#""cache-line-size": "64","#, "");
        let err = HardwareConfig::from_json("SB", &json, Precision::Double).unwrap_err();
        assert!(matches!(err, HardwareError::MalformedConfig { ref field, .. } if field == "cache-line-size"));
    }

    #[test]
    fn test_config_not_found() {
        let dir = std::env::temp_dir().join("erm-analyzer-no-such-configs");
        let err = HardwareConfig::load(&dir, "XYZ", Precision::Double).unwrap_err();
        assert!(matches!(err, HardwareError::ConfigNotFound { ref id, .. } if id == "XYZ"));
    }

    #[test]
    fn test_shipped_descriptor() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs");
        let hw = HardwareConfig::load(&dir, "SB", Precision::Single).unwrap();
        assert_eq!(hw.id(), "SB");
        assert_eq!(hw.precision(), Precision::Single);
        assert_eq!(hw.throughput(Resource::FDiv).unwrap(), 0.07);
        assert_eq!(hw.max_vector_width(), 4.0);
    }
}

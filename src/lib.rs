//! erm-analyzer library
//!
//! Extended Roofline Model construction from simulator statistics reports.
//!
//! - [`parser`] - simulator report tables into [`TraceStatistics`]
//! - [`hardware`] - per-microarchitecture descriptors
//! - [`model`] - bounds, overlap composition and the assembled [`ErmModel`]
//! - [`runner`] - compiling and profiling a benchmark to obtain a report

pub mod analysis;
pub mod config;
pub mod error;
pub mod hardware;
pub mod model;
pub mod parser;
pub mod resource;
pub mod runner;

pub use analysis::{analyze, Analysis};
pub use config::{Config, RunConfig};
pub use error::ErmError;
pub use model::ErmModel;
pub use parser::TraceStatistics;

//! Trace statistics extracted from a simulator report.

use std::path::Path;

use serde::Serialize;

use super::schema::{self, Report};
use super::ReportError;
use crate::resource::{Buffer, Resource};

/// Stall bound the simulator writes for a buffer it did not evaluate.
pub const NOT_COMPUTED: f64 = -1.0;

/// Counts and spans for one compute/memory resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceActivity {
    /// Operations issued (accesses for memory levels).
    pub operations: u64,
    /// Cycles from first to last activity, stalls excluded.
    pub total_span: u64,
    /// Cycles spent issuing.
    pub issue_span: u64,
    /// Total span including stall cycles.
    pub total_span_with_stalls: u64,
}

/// Stall information for one micro-architectural buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BufferActivity {
    /// Cycles the buffer was full.
    pub stall_span: u64,
    /// Performance bound computed by the simulator ([`NOT_COMPUTED`] when absent).
    pub stall_bound: f64,
}

/// Pairwise overlap fractions, upper triangle only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapMatrix {
    values: Vec<f64>,
}

impl OverlapMatrix {
    const N: usize = Resource::COUNT;

    fn new() -> Self {
        Self {
            values: vec![0.0; Self::N * (Self::N - 1) / 2],
        }
    }

    /// Slot for `i < j`.
    fn slot(i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < Self::N);
        i * (2 * Self::N - i - 1) / 2 + (j - i - 1)
    }

    fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[Self::slot(i, j)] = value;
    }

    /// Overlap between two distinct resources, in either order.
    pub fn get(&self, a: Resource, b: Resource) -> Option<f64> {
        let (i, j) = match a.index().cmp(&b.index()) {
            std::cmp::Ordering::Less => (a.index(), b.index()),
            std::cmp::Ordering::Greater => (b.index(), a.index()),
            std::cmp::Ordering::Equal => return None,
        };
        Some(self.values[Self::slot(i, j)])
    }

    /// All `(i, j, fraction)` entries with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (Resource, Resource, f64)> + '_ {
        Resource::ALL.into_iter().flat_map(move |a| {
            Resource::ALL
                .into_iter()
                .skip(a.index() + 1)
                .map(move |b| (a, b, self.values[Self::slot(a.index(), b.index())]))
        })
    }
}

/// Everything the model needs from one simulator run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStatistics {
    resources: [ResourceActivity; Resource::COUNT],
    buffers: [BufferActivity; Buffer::COUNT],
    issue_stall_span: [[f64; Buffer::COUNT]; Resource::COUNT],
    overlap_without_stalls: OverlapMatrix,
    overlap_with_stalls: OverlapMatrix,
    total_cycles: f64,
    total_flops: f64,
}

impl TraceStatistics {
    /// Read and parse a report file.
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let text = std::fs::read_to_string(path)?;
        let stats = Self::parse(&text)?;
        log::info!("Parsed simulator report {}", path.display());
        Ok(stats)
    }

    /// Parse the text of a simulator report.
    ///
    /// All tables must be present; the first error aborts parsing.
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        let report = Report::new(text);

        // Fail on a missing title before reading any rows.
        for table in &schema::REQUIRED {
            report.locate(table)?;
        }

        let mut resources = [ResourceActivity::default(); Resource::COUNT];
        let statistics = report.table(&schema::STATISTICS)?;
        for resource in Resource::ALL {
            let row = statistics.row(resource.index(), 5)?;
            resources[resource.index()] = ResourceActivity {
                operations: row.cell(1)?,
                total_span: row.cell(2)?,
                issue_span: row.cell(3)?,
                total_span_with_stalls: row.cell(4)?,
            };
        }

        let mut buffers = [BufferActivity::default(); Buffer::COUNT];
        let stalls = report.table(&schema::STALL_CYCLES)?;
        let bottlenecks = report.table(&schema::BUFFER_BOTTLENECKS)?;
        for buffer in Buffer::ALL {
            let row = bottlenecks.row(buffer.ordinal(), 2)?;
            let stall_bound: f64 = row.cell(1)?;
            if !(stall_bound.is_finite() && (stall_bound >= 0.0 || stall_bound == NOT_COMPUTED)) {
                return Err(row.malformed(format!("stall bound {} for {} is not a non-negative finite value", stall_bound, buffer)));
            }
            buffers[buffer.ordinal()] = BufferActivity {
                stall_span: stalls.row(buffer.ordinal(), 2)?.cell(1)?,
                stall_bound,
            };
        }

        let mut issue_stall_span = [[0.0; Buffer::COUNT]; Resource::COUNT];
        let spans = report.table(&schema::ISSUE_STALL_SPAN)?;
        for resource in Resource::ALL {
            let row = spans.row(resource.index(), 1 + Buffer::COUNT)?;
            for buffer in Buffer::ALL {
                issue_stall_span[resource.index()][buffer.ordinal()] = row.quantity(buffer.ordinal() + 1)?;
            }
        }

        let overlap_without_stalls = parse_overlaps(&report, &schema::OVERLAP_WITHOUT_STALLS)?;
        let overlap_with_stalls = parse_overlaps(&report, &schema::OVERLAP_WITH_STALLS)?;

        let total_cycles = report.table(&schema::GRAND_TOTAL)?.row(0, 3)?.quantity(2)?;
        let total_flops = report.table(&schema::FLOPS)?.row(0, 3)?.quantity(2)?;

        log::debug!("Report totals: {} flops over {} cycles", total_flops, total_cycles);

        Ok(Self {
            resources,
            buffers,
            issue_stall_span,
            overlap_without_stalls,
            overlap_with_stalls,
            total_cycles,
            total_flops,
        })
    }

    pub fn resource(&self, resource: Resource) -> &ResourceActivity {
        &self.resources[resource.index()]
    }

    pub fn buffer(&self, buffer: Buffer) -> &BufferActivity {
        &self.buffers[buffer.ordinal()]
    }

    /// Cycles `resource` spent issuing while `buffer` was stalling.
    pub fn issue_stall_span(&self, resource: Resource, buffer: Buffer) -> f64 {
        self.issue_stall_span[resource.index()][buffer.ordinal()]
    }

    pub fn overlap_without_stalls(&self) -> &OverlapMatrix {
        &self.overlap_without_stalls
    }

    pub fn overlap_with_stalls(&self) -> &OverlapMatrix {
        &self.overlap_with_stalls
    }

    /// Total elapsed cycles of the run.
    pub fn total_cycles(&self) -> f64 {
        self.total_cycles
    }

    /// Total floating-point operations of the run.
    pub fn total_flops(&self) -> f64 {
        self.total_flops
    }
}

/// Read a triangular overlap table.
///
/// The row of resource `j` holds, in columns `1..=j`, its overlap with each
/// resource `i < j`. Nothing past that slice is read.
fn parse_overlaps(report: &Report<'_>, table: &'static schema::TableSchema) -> Result<OverlapMatrix, ReportError> {
    let mut matrix = OverlapMatrix::new();
    let table = report.table(table)?;

    for j in 1..Resource::COUNT {
        let row = table.row(j, j + 1)?;
        for i in 0..j {
            let fraction: f64 = row.cell(i + 1)?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(row.malformed(format!(
                    "overlap {} between {} and {} is outside [0, 1]",
                    fraction,
                    Resource::ALL[i],
                    Resource::ALL[j]
                )));
            }
            matrix.set(i, j, fraction);
        }
    }

    Ok(matrix)
}

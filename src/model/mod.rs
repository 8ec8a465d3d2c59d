//! Extended Roofline Model assembly.
//!
//! [`ErmModel::assemble`] turns a [`BoundTable`] into everything a renderer
//! needs: the achieved point, named horizontal (flops/cycle) and diagonal
//! (bytes/cycle slope) bound lines, and sampled overlap curves.
//!
//! | Resource kind          | Lines                          |
//! |------------------------|--------------------------------|
//! | arithmetic, data move  | horizontal, `y = bound/weight` |
//! | memory                 | diagonal, `y = x*bound/weight` |
//! | register access        | none                           |
//!
//! Bounds that are zero, and resources that never ran, are listed in
//! [`ErmModel::degenerate`] instead of producing lines.

pub mod bounds;
pub mod export;
pub mod overlap;

pub use bounds::{BoundSet, BoundTable, WeightedBound};
pub use overlap::{Contribution, OverlapComposition};

use serde::Serialize;

use crate::config::{OverlapVariant, PlotOptions, RunConfig};
use crate::hardware::Precision;
use crate::parser::trace::NOT_COMPUTED;
use crate::parser::{OverlapMatrix, TraceStatistics};
use crate::resource::{Buffer, Resource, ResourceKind};

// ============================================================================
// Artifact types
// ============================================================================

/// Which bound a line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "buffer")]
pub enum LineFamily {
    Theoretical,
    WorkloadScaled,
    Issue,
    Latency,
    Combined,
    Buffer(Buffer),
}

impl LineFamily {
    /// Label for a line of this family drawn for `resource`.
    pub fn label(self, resource: Resource) -> String {
        match self {
            LineFamily::Theoretical | LineFamily::WorkloadScaled => resource.name().to_string(),
            LineFamily::Issue => format!("{}_issue", resource),
            LineFamily::Latency => format!("{}_latency", resource),
            LineFamily::Combined => format!("{}_all", resource),
            LineFamily::Buffer(buffer) => format!("{} {}", resource, buffer),
        }
    }

    fn style(self) -> (LineStyle, f64) {
        match self {
            LineFamily::Theoretical => (LineStyle::Solid, 2.0),
            LineFamily::WorkloadScaled => (LineStyle::Solid, 1.5),
            _ => (LineStyle::Dashed, 0.5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Solid,
    Dashed,
}

/// One named bound line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundLine {
    /// `None` for standalone buffer bounds.
    pub resource: Option<Resource>,
    pub family: LineFamily,
    pub label: String,
    /// Bound before workload normalisation.
    pub bound: f64,
    /// Workload share; 1.0 when not normalised.
    pub weight: f64,
    /// y-value of a horizontal line, slope of a diagonal one.
    pub value: f64,
    pub style: LineStyle,
    pub width: f64,
}

impl BoundLine {
    fn new(resource: Resource, family: LineFamily, bound: f64, weight: f64) -> Self {
        let (style, width) = family.style();
        Self {
            resource: Some(resource),
            family,
            label: family.label(resource),
            bound,
            weight,
            value: bound / weight,
            style,
            width,
        }
    }
}

/// A sampled two-resource overlap curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapCurve {
    pub first: Resource,
    pub second: Resource,
    pub alpha: f64,
    pub ridge_point: Option<f64>,
    /// `(intensity, performance)` pairs in increasing intensity.
    pub points: Vec<[f64; 2]>,
}

/// The kernel's measured position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievedPoint {
    /// Flops per byte.
    pub intensity: f64,
    /// Flops per cycle.
    pub performance: f64,
    /// Set when no bytes were moved and the intensity is the axis maximum.
    pub intensity_clamped: bool,
}

impl AchievedPoint {
    pub fn new(flops: f64, bytes: f64, cycles: f64, x_max: f64) -> Self {
        let clamped = bytes <= 0.0;
        Self {
            intensity: if clamped { x_max } else { flops / bytes },
            performance: bounds::ratio(flops, cycles),
            intensity_clamped: clamped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegenerateReason {
    /// No operations issued.
    Unused,
    /// The bound evaluated to zero.
    ZeroBound,
    /// Total flops or bytes is zero, so no workload share exists.
    NoWorkload,
    /// The simulator did not compute this buffer bound.
    NotComputed,
}

/// A recognised zero/unused case excluded from the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegenerateResource {
    pub name: &'static str,
    pub family: Option<LineFamily>,
    pub reason: DegenerateReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Axis {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

/// The assembled Extended Roofline Model of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErmModel {
    pub benchmark: String,
    pub uarch: String,
    pub precision: Precision,
    pub axis: Axis,
    pub point: AchievedPoint,
    pub horizontal: Vec<BoundLine>,
    pub diagonal: Vec<BoundLine>,
    pub overlaps: Vec<OverlapCurve>,
    pub degenerate: Vec<DegenerateResource>,
}

// ============================================================================
// Assembly
// ============================================================================

impl ErmModel {
    pub fn assemble(stats: &TraceStatistics, bounds: &BoundTable, run: &RunConfig) -> Self {
        let plot = &run.plot;
        let mut model = Self {
            benchmark: run.benchmark.clone(),
            uarch: run.uarch.clone(),
            precision: run.precision,
            axis: Axis {
                x_min: plot.x_min,
                x_max: plot.x_max,
                y_min: plot.y_min,
                y_max: plot.y_max,
            },
            point: AchievedPoint::new(bounds.total_flops(), bounds.total_bytes(), bounds.total_cycles(), plot.x_max),
            horizontal: Vec::new(),
            diagonal: Vec::new(),
            overlaps: Vec::new(),
            degenerate: Vec::new(),
        };

        if model.point.intensity_clamped {
            log::warn!("No bytes transferred; intensity set to the axis maximum {}", plot.x_max);
        }

        for set in bounds.iter() {
            model.add_resource_lines(set, bounds, plot);
        }

        if plot.separate_buffers {
            model.add_buffer_lines(bounds);
        }

        let matrix = match plot.overlap_variant {
            OverlapVariant::WithoutStalls => stats.overlap_without_stalls(),
            OverlapVariant::WithStalls => stats.overlap_with_stalls(),
        };
        if plot.overlap {
            model.add_overlap_curves(bounds, matrix, plot, false);
        }
        if plot.memory_overlap {
            model.add_overlap_curves(bounds, matrix, plot, true);
        }

        log::debug!(
            "Assembled model: {} horizontal, {} diagonal, {} overlap curves, {} degenerate",
            model.horizontal.len(),
            model.diagonal.len(),
            model.overlaps.len(),
            model.degenerate.len()
        );
        model
    }

    fn degenerate(&mut self, name: &'static str, family: Option<LineFamily>, reason: DegenerateReason) {
        self.degenerate.push(DegenerateResource { name, family, reason });
    }

    fn add_resource_lines(&mut self, set: &BoundSet, bounds: &BoundTable, plot: &PlotOptions) {
        let resource = set.resource;
        let kind = resource.kind();
        if kind == ResourceKind::RegisterAccess {
            return;
        }
        if !set.is_used() {
            self.degenerate(resource.name(), None, DegenerateReason::Unused);
            return;
        }
        let Some(weight) = bounds.weight(resource) else {
            log::warn!("{} has operations but the run has no workload of its kind", resource);
            self.degenerate(resource.name(), None, DegenerateReason::NoWorkload);
            return;
        };

        let mut families = Vec::with_capacity(5 + Buffer::COUNT);
        if plot.theoretical {
            families.push((LineFamily::Theoretical, set.theoretical, 1.0));
        }
        if plot.workload_scaled {
            families.push((LineFamily::WorkloadScaled, set.theoretical, weight));
        }
        if plot.issue {
            families.push((LineFamily::Issue, set.issue, weight));
        }
        if plot.latency {
            families.push((LineFamily::Latency, set.latency, weight));
        }
        if plot.combined {
            families.push((LineFamily::Combined, set.combined, weight));
        }
        if !plot.separate_buffers {
            for buffer in Buffer::ALL {
                families.push((LineFamily::Buffer(buffer), set.buffer(buffer), weight));
            }
        }

        for (family, bound, weight) in families {
            if bound <= 0.0 {
                self.degenerate(resource.name(), Some(family), DegenerateReason::ZeroBound);
                continue;
            }
            let line = BoundLine::new(resource, family, bound, weight);
            if kind == ResourceKind::Memory {
                self.diagonal.push(line);
            } else {
                self.horizontal.push(line);
            }
        }
    }

    fn add_buffer_lines(&mut self, bounds: &BoundTable) {
        for buffer in Buffer::ALL {
            let bound = bounds.stall_bound(buffer);
            let family = Some(LineFamily::Buffer(buffer));
            if bound == NOT_COMPUTED {
                self.degenerate(buffer.name(), family, DegenerateReason::NotComputed);
            } else if bound <= 0.0 {
                self.degenerate(buffer.name(), family, DegenerateReason::ZeroBound);
            } else {
                self.horizontal.push(BoundLine {
                    resource: None,
                    family: LineFamily::Buffer(buffer),
                    label: buffer.name().to_string(),
                    bound,
                    weight: 1.0,
                    value: bound,
                    style: LineStyle::Dashed,
                    width: 0.5,
                });
            }
        }
    }

    /// Compute/memory pairs, or memory/memory pairs when `memory_only`.
    fn add_overlap_curves(&mut self, bounds: &BoundTable, matrix: &OverlapMatrix, plot: &PlotOptions, memory_only: bool) {
        let contribution = |r: Resource| {
            let weight = bounds.weight(r)?;
            Some(Contribution::new(r, bounds.get(r).combined, weight))
        };

        for (a, b, alpha) in matrix.pairs() {
            let pair_matches = if memory_only {
                a.kind() == ResourceKind::Memory && b.kind() == ResourceKind::Memory
            } else {
                a.kind().is_execution_unit() && b.kind() == ResourceKind::Memory
            };
            if !pair_matches {
                continue;
            }
            let (Some(first), Some(second)) = (contribution(a), contribution(b)) else {
                continue;
            };
            let Some(composition) = OverlapComposition::new(first, second, alpha) else {
                continue;
            };

            self.overlaps.push(OverlapCurve {
                first: a,
                second: b,
                alpha: composition.alpha,
                ridge_point: composition.ridge_point(),
                points: composition.sample(plot.x_min, plot.x_max, plot.samples),
            });
        }
    }

    /// All bound lines, horizontal first.
    pub fn lines(&self) -> impl Iterator<Item = &BoundLine> {
        self.horizontal.iter().chain(&self.diagonal)
    }

    pub fn find(&self, label: &str) -> Option<&BoundLine> {
        self.lines().find(|line| line.label == label)
    }

    /// Print a human-readable summary of the model.
    pub fn print_summary(&self) {
        println!("Extended Roofline Model");
        println!("=======================");
        println!("Benchmark: {}", self.benchmark);
        println!("Uarch: {} ({:?} precision)", self.uarch, self.precision);
        println!();
        println!(
            "Achieved: P = {:.4} flops/cycle, I = {:.4} flops/byte{}",
            self.point.performance,
            self.point.intensity,
            if self.point.intensity_clamped { " (no bytes moved)" } else { "" }
        );

        for (title, unit, lines) in [
            ("Horizontal bounds", "F/C", &self.horizontal),
            ("Diagonal bounds", "B/C", &self.diagonal),
        ] {
            if lines.is_empty() {
                continue;
            }
            println!();
            println!("{} ({}):", title, lines.len());
            for line in lines {
                println!(
                    "  {:<20} {:>10.4} {} / {:<8.4} = {:>10.4}",
                    line.label, line.bound, unit, line.weight, line.value
                );
            }
        }

        if !self.overlaps.is_empty() {
            println!();
            println!("Overlap curves ({}):", self.overlaps.len());
            for curve in &self.overlaps {
                match curve.ridge_point {
                    Some(ridge) => println!("  {}-{} alpha={:.3} ridge={:.4}", curve.first, curve.second, curve.alpha, ridge),
                    None => println!("  {}-{} alpha={:.3}", curve.first, curve.second, curve.alpha),
                }
            }
        }

        if !self.degenerate.is_empty() {
            println!();
            println!("Excluded ({}):", self.degenerate.len());
            for entry in &self.degenerate {
                match entry.family {
                    Some(family) => println!("  {} {:?}: {:?}", entry.name, family, entry.reason),
                    None => println!("  {}: {:?}", entry.name, entry.reason),
                }
            }
        }
    }
}

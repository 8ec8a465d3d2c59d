//! Per-resource performance bounds.
//!
//! Every bound is a volume divided by a span:
//!
//! | Bound        | Span                                   |
//! |--------------|----------------------------------------|
//! | theoretical  | hardware throughput x parallel issue   |
//! | issue        | issue span                             |
//! | latency      | total span                             |
//! | combined     | total span including stalls            |
//! | buffer `b`   | issue span while `b` was stalling      |
//!
//! For byte-moving resources the volume is `accesses x granularity`, which
//! turns every bound into a bandwidth in bytes per cycle. A zero span gives
//! a zero bound: the resource was never active in that respect and the
//! bound must not be drawn.

use serde::Serialize;

use crate::hardware::{HardwareConfig, HardwareError};
use crate::parser::TraceStatistics;
use crate::resource::{Buffer, Resource, ResourceKind};

/// `volume / span`, or 0 for an idle span.
#[inline]
pub fn ratio(volume: f64, span: f64) -> f64 {
    if span == 0.0 {
        0.0
    } else {
        volume / span
    }
}

/// Bounds derived for one compute/memory resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundSet {
    pub resource: Resource,
    /// Operations, or bytes for byte-moving resources.
    pub volume: f64,
    /// Peak rate from the hardware description.
    pub theoretical: f64,
    pub issue: f64,
    pub latency: f64,
    /// All effects: latency, issue and stalls.
    pub combined: f64,
    /// One bound per buffer, in [`Buffer::ALL`] order.
    pub buffers: [f64; Buffer::COUNT],
}

impl BoundSet {
    /// Whether the resource did any work during the run.
    #[inline]
    pub fn is_used(&self) -> bool {
        self.volume > 0.0
    }

    pub fn buffer(&self, buffer: Buffer) -> f64 {
        self.buffers[buffer.ordinal()]
    }
}

/// A bound paired with the share of the workload the resource carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedBound {
    pub bound: f64,
    pub weight: f64,
}

impl WeightedBound {
    /// Ceiling position once normalised by the workload share.
    #[inline]
    pub fn value(&self) -> f64 {
        self.bound / self.weight
    }
}

/// Bounds for every resource of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundTable {
    sets: Vec<BoundSet>,
    stall_bounds: [f64; Buffer::COUNT],
    total_flops: f64,
    total_bytes: f64,
    total_cycles: f64,
}

impl BoundTable {
    /// Combine trace counts with hardware parameters.
    pub fn compute(stats: &TraceStatistics, hw: &HardwareConfig) -> Result<Self, HardwareError> {
        let mut sets = Vec::with_capacity(Resource::COUNT);
        let mut total_bytes = 0.0;

        for resource in Resource::ALL {
            let activity = stats.resource(resource);
            let kind = resource.kind();

            let mut volume = activity.operations as f64;
            if kind.moves_bytes() {
                volume *= hw.access_granularity(resource)?;
            }
            if kind == ResourceKind::Memory {
                total_bytes += volume;
            }

            // A negative throughput marks a unit without a finite peak.
            let throughput = hw.throughput(resource)?.max(0.0);
            let theoretical = match hw.parallel_issue(resource)? {
                Some(width) => throughput * width,
                None => throughput,
            };

            let mut buffers = [0.0; Buffer::COUNT];
            for buffer in Buffer::ALL {
                buffers[buffer.ordinal()] = ratio(volume, stats.issue_stall_span(resource, buffer));
            }

            let set = BoundSet {
                resource,
                volume,
                theoretical,
                issue: ratio(volume, activity.issue_span as f64),
                latency: ratio(volume, activity.total_span as f64),
                combined: ratio(volume, activity.total_span_with_stalls as f64),
                buffers,
            };
            log::debug!(
                "{}: volume={} theoretical={} issue={} latency={} combined={}",
                resource,
                set.volume,
                set.theoretical,
                set.issue,
                set.latency,
                set.combined
            );
            sets.push(set);
        }

        let mut stall_bounds = [0.0; Buffer::COUNT];
        for buffer in Buffer::ALL {
            stall_bounds[buffer.ordinal()] = stats.buffer(buffer).stall_bound;
        }

        Ok(Self {
            sets,
            stall_bounds,
            total_flops: stats.total_flops(),
            total_bytes,
            total_cycles: stats.total_cycles(),
        })
    }

    pub fn get(&self, resource: Resource) -> &BoundSet {
        &self.sets[resource.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundSet> {
        self.sets.iter()
    }

    /// Standalone bound of a buffer as reported by the simulator.
    pub fn stall_bound(&self, buffer: Buffer) -> f64 {
        self.stall_bounds[buffer.ordinal()]
    }

    pub fn total_flops(&self) -> f64 {
        self.total_flops
    }

    /// Bytes moved through the memory hierarchy (register traffic excluded).
    pub fn total_bytes(&self) -> f64 {
        self.total_bytes
    }

    pub fn total_cycles(&self) -> f64 {
        self.total_cycles
    }

    /// Share of the workload carried by `resource`.
    ///
    /// Flops for execution units, bytes for byte-moving resources. `None` for
    /// an unused resource or when the run has no workload of that kind.
    pub fn weight(&self, resource: Resource) -> Option<f64> {
        let set = self.get(resource);
        let total = if resource.kind().moves_bytes() {
            self.total_bytes
        } else {
            self.total_flops
        };

        if !set.is_used() || total <= 0.0 {
            return None;
        }
        Some(set.volume / total)
    }

    /// Theoretical bound together with its workload weight.
    pub fn workload_scaled(&self, resource: Resource) -> Option<WeightedBound> {
        let weight = self.weight(resource)?;
        Some(WeightedBound {
            bound: self.get(resource).theoretical,
            weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::tests::{sb, SB_JSON};
    use crate::hardware::Precision;
    use crate::parser::trace::tests::stats;
    use approx::assert_relative_eq;

    fn table() -> BoundTable {
        BoundTable::compute(&stats(), &sb(Precision::Double)).unwrap()
    }

    #[test]
    fn test_ratio_idle_span() {
        assert_eq!(ratio(40.0, 10.0), 4.0);
        assert_eq!(ratio(40.0, 0.0), 0.0);
    }

    #[test]
    fn test_compute_bounds_are_exact_ratios() {
        let t = table();
        let fadd = t.get(Resource::FAdd);
        assert_eq!(fadd.volume, 400.0);
        assert_eq!(fadd.issue, 400.0 / 200.0);
        assert_eq!(fadd.latency, 400.0 / 250.0);
        assert_eq!(fadd.combined, 400.0 / 320.0);
        assert_eq!(fadd.buffer(Buffer::Rs), 400.0 / 100.0);
        assert_eq!(fadd.buffer(Buffer::Rob), 0.0);
    }

    #[test]
    fn test_issue_bound_scenario() {
        let t = table();
        let fmov = t.get(Resource::FMov);
        assert_eq!(fmov.issue, 4.0);
        // Stall span of zero yields a zero combined bound, never a division error.
        assert_eq!(fmov.combined, 0.0);
    }

    #[test]
    fn test_zero_spans_give_zero_bounds() {
        let t = table();
        let s = stats();
        for set in t.iter() {
            let activity = s.resource(set.resource);
            if activity.issue_span == 0 {
                assert_eq!(set.issue, 0.0);
            }
            if activity.total_span == 0 {
                assert_eq!(set.latency, 0.0);
            }
            assert!(set.issue >= 0.0 && set.latency >= 0.0 && set.combined >= 0.0);
        }
    }

    #[test]
    fn test_memory_bounds_are_bandwidths() {
        let t = table();
        let l1 = t.get(Resource::L1Load);
        assert_eq!(l1.volume, 800.0 * 8.0);
        assert_eq!(l1.issue, 6400.0 / 400.0);
        assert_eq!(l1.combined, 6400.0 / 500.0);
        assert_eq!(l1.buffer(Buffer::Lb), 6400.0 / 160.0);

        let register = t.get(Resource::Register);
        assert_eq!(register.volume, 800.0);

        // 6400 + 3200 + 6400 + 0 + 640; register traffic excluded.
        assert_eq!(t.total_bytes(), 16640.0);
    }

    #[test]
    fn test_theoretical_bounds() {
        let t = table();
        assert_eq!(t.get(Resource::FAdd).theoretical, 1.0);
        // ffma has zero parallel issue in the descriptor.
        assert_eq!(t.get(Resource::FFma).theoretical, 0.0);
        // Register throughput is unbounded in the descriptor: no ceiling.
        assert_eq!(t.get(Resource::Register).theoretical, 0.0);
        // Unbounded issue falls back to the throughput alone.
        assert_eq!(t.get(Resource::Dram).theoretical, 0.125);
        assert_eq!(t.get(Resource::L1Load).theoretical, 4.0);
        assert_eq!(t.get(Resource::FMov).theoretical, 3.0);
    }

    #[test]
    fn test_vector_width_scales_theoretical_bound() {
        let json = SB_JSON.replace(r#""vector-code": "0""#, r#""vector-code": "1""#);
        let hw = HardwareConfig::from_json("SB", &json, Precision::Double).unwrap();
        let t = BoundTable::compute(&stats(), &hw).unwrap();
        assert_eq!(t.get(Resource::FAdd).theoretical, 4.0);
    }

    #[test]
    fn test_workload_weights() {
        let t = table();
        let fadd = t.workload_scaled(Resource::FAdd).unwrap();
        assert_relative_eq!(fadd.weight, 0.5);
        assert_relative_eq!(fadd.value(), 2.0);

        let l2 = t.workload_scaled(Resource::L2).unwrap();
        assert_relative_eq!(l2.weight, 6400.0 / 16640.0);

        assert!(t.workload_scaled(Resource::Llc).is_none());
        assert!(t.workload_scaled(Resource::FDiv).is_none());
    }

    #[test]
    fn test_stall_bounds_copied_from_trace() {
        let t = table();
        assert_eq!(t.stall_bound(Buffer::Rs), 3.2);
        assert_eq!(t.stall_bound(Buffer::Sb), -1.0);
    }
}

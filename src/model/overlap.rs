//! Two-resource bound composition under partial overlap.
//!
//! Each resource contributes a time per flop at operational intensity `x`:
//!
//! - an execution unit: `frac / perf` (independent of `x`)
//! - a byte-moving resource: `frac / (perf * x)`
//!
//! where `frac` is the resource's share of the workload and `perf` its bound.
//! Of the two contributions, a fraction `alpha` of the smaller one runs
//! concurrently with the other, so the composed performance is
//!
//! ```text
//! y(x) = 1 / (t_a + t_b - alpha * min(t_a, t_b))
//! ```
//!
//! `alpha = 0` is serial composition, `alpha = 1` the minimum of the two
//! individual bounds.

use serde::Serialize;

use crate::resource::Resource;

/// One resource's side of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Contribution {
    pub resource: Resource,
    /// The resource's bound (flops/cycle or bytes/cycle).
    pub performance: f64,
    /// Share of flops or bytes carried by the resource.
    pub fraction: f64,
}

impl Contribution {
    pub fn new(resource: Resource, performance: f64, fraction: f64) -> Self {
        Self { resource, performance, fraction }
    }

    #[inline]
    fn scales_with_intensity(&self) -> bool {
        self.resource.kind().moves_bytes()
    }

    /// Cycles per flop at intensity `x`.
    #[inline]
    pub fn time_per_flop(&self, x: f64) -> f64 {
        let t = self.fraction / self.performance;
        if self.scales_with_intensity() {
            t / x
        } else {
            t
        }
    }

    fn is_degenerate(&self) -> bool {
        !(self.performance > 0.0 && self.fraction > 0.0)
            || !self.performance.is_finite()
            || !self.fraction.is_finite()
    }
}

/// Bound of two resources overlapping by `alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlapComposition {
    pub first: Contribution,
    pub second: Contribution,
    pub alpha: f64,
}

impl OverlapComposition {
    /// `None` when either side is unused (zero fraction or zero bound).
    pub fn new(first: Contribution, second: Contribution, alpha: f64) -> Option<Self> {
        if first.is_degenerate() || second.is_degenerate() {
            return None;
        }
        Some(Self {
            first,
            second,
            alpha: alpha.clamp(0.0, 1.0),
        })
    }

    /// Composed performance at operational intensity `x`.
    pub fn performance(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        let a = self.first.time_per_flop(x);
        let b = self.second.time_per_flop(x);
        1.0 / (a + b - self.alpha * a.min(b))
    }

    /// Intensity at which both contributions take equal time.
    ///
    /// Only exists when exactly one side scales with intensity.
    pub fn ridge_point(&self) -> Option<f64> {
        let a = self.first.fraction / self.first.performance;
        let b = self.second.fraction / self.second.performance;
        match (self.first.scales_with_intensity(), self.second.scales_with_intensity()) {
            (false, true) => Some(b / a),
            (true, false) => Some(a / b),
            _ => None,
        }
    }

    /// Sample the curve geometrically over `[x_min, x_max]`, inserting the
    /// ridge point when it falls inside the range.
    pub fn sample(&self, x_min: f64, x_max: f64, samples: usize) -> Vec<[f64; 2]> {
        let mut xs = geometric_space(x_min, x_max, samples.max(2));

        if let Some(ridge) = self.ridge_point() {
            if ridge > x_min && ridge < x_max {
                let at = xs.partition_point(|&x| x < ridge);
                if xs.get(at) != Some(&ridge) {
                    xs.insert(at, ridge);
                }
            }
        }

        xs.into_iter().map(|x| [x, self.performance(x)]).collect()
    }
}

/// `n` points spaced evenly on a log axis, endpoints included.
fn geometric_space(start: f64, end: f64, n: usize) -> Vec<f64> {
    let ratio = end / start;
    let last = (n - 1) as f64;
    (0..n)
        .map(|i| match i {
            0 => start,
            i if i == n - 1 => end,
            i => start * ratio.powf(i as f64 / last),
        })
        .collect()
}

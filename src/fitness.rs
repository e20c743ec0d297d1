//! Fitness evaluation: scalar error of one candidate parameter vector
//! against the full target dataset.

use crate::empirical::ModelFamily;
use crate::params::ParameterSpace;
use crate::target::TargetDataset;

/// Sentinel fitness for candidates whose evaluation fails or produces
/// non-finite values. Large enough that selection always discards
/// them, finite so ordering stays total.
pub const PENALTY: f64 = 1.0e30;

/// Per-run error normalization. Off by default; `Range` divides each
/// run's squared error by the squared target range so runs of very
/// different magnitude weigh equally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Normalization {
    None,
    /// Divide each run's squared error by the squared target range.
    Range,
}

/// Maps a candidate parameter vector to a scalar error (lower is
/// better) by summing squared deviations across every run's target
/// curve. Pure and side-effect free; safe to call from parallel
/// workers.
pub struct FitnessEvaluator<'a> {
    targets: &'a TargetDataset,
    space: &'a ParameterSpace,
    family: &'a dyn ModelFamily,
    normalization: Normalization,
}

impl<'a> FitnessEvaluator<'a> {
    pub fn new(
        targets: &'a TargetDataset,
        space: &'a ParameterSpace,
        family: &'a dyn ModelFamily,
        normalization: Normalization,
    ) -> Self {
        Self {
            targets,
            space,
            family,
            normalization,
        }
    }

    pub fn evaluate(&self, params: &[f64]) -> f64 {
        let params = match self.space.decode_real(params) {
            Ok(p) => p,
            Err(_) => return PENALTY,
        };
        let model = self.family.build(&params);

        let mut total = 0.0;
        for (_run, target) in self.targets.iter() {
            let y_fit = model.evaluate(&target.t, &target.operating_conditions);
            if y_fit.len() != target.y.len() {
                return PENALTY;
            }
            let mut sse = 0.0;
            for (yf, y) in y_fit.iter().zip(target.y.iter()) {
                let d = yf - y;
                sse += d * d;
            }
            if let Normalization::Range = self.normalization {
                let (lo, hi) = target
                    .y
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                let range = hi - lo;
                if range > 0.0 {
                    sse /= range * range;
                }
            }
            total += sse;
        }
        if total.is_finite() {
            total
        } else {
            PENALTY
        }
    }
}

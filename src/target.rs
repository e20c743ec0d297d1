//! Target data for calibration: operating conditions, detailed-model
//! run results and the per-run target curves the optimizer fits
//! against.

use crate::error::{CalibrationError, Result};
use std::collections::BTreeMap;

/// Boundary/initial conditions for one simulation run: a piecewise
/// linear heating schedule as (time, temperature) points.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatingCondition {
    points: Vec<(f64, f64)>,
}

impl OperatingCondition {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        if points.is_empty() {
            return Err(CalibrationError::config(
                "operating condition has no schedule points",
            ));
        }
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Err(CalibrationError::config(format!(
                    "operating condition times must be strictly increasing ({} then {})",
                    pair[0].0, pair[1].0
                )));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn start_time(&self) -> f64 {
        self.points[0].0
    }

    pub fn end_time(&self) -> f64 {
        self.points[self.points.len() - 1].0
    }

    /// Temperature at time `t`, piecewise linear, clamped at the
    /// schedule ends.
    pub fn temperature_at(&self, t: f64) -> f64 {
        let pts = &self.points;
        if t <= pts[0].0 {
            return pts[0].1;
        }
        if t >= pts[pts.len() - 1].0 {
            return pts[pts.len() - 1].1;
        }
        for pair in pts.windows(2) {
            let (t0, y0) = pair[0];
            let (t1, y1) = pair[1];
            if t <= t1 {
                return y0 + (y1 - y0) * (t - t0) / (t1 - t0);
            }
        }
        pts[pts.len() - 1].1
    }
}

/// Time-indexed table of named yield channels from one detailed-model
/// run. Channel vectors all share the time index length.
#[derive(Clone, Debug)]
pub struct RunResult {
    time: Vec<f64>,
    channels: BTreeMap<String, Vec<f64>>,
}

impl RunResult {
    pub fn new(time: Vec<f64>, channels: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        if time.is_empty() {
            return Err(CalibrationError::config("run result has empty time index"));
        }
        for (name, values) in &channels {
            if values.len() != time.len() {
                return Err(CalibrationError::config(format!(
                    "channel {} has {} values for {} time points",
                    name,
                    values.len(),
                    time.len()
                )));
            }
        }
        Ok(Self { time, channels })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(|v| v.as_slice())
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|s| s.as_str())
    }
}

/// One run's target curve for the species being fitted.
#[derive(Clone, Debug)]
pub struct TargetCondition {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub operating_conditions: OperatingCondition,
}

impl TargetCondition {
    pub fn new(t: Vec<f64>, y: Vec<f64>, operating_conditions: OperatingCondition) -> Result<Self> {
        if t.is_empty() {
            return Err(CalibrationError::config("target condition has no points"));
        }
        if t.len() != y.len() {
            return Err(CalibrationError::config(format!(
                "target condition has {} time points but {} values",
                t.len(),
                y.len()
            )));
        }
        for pair in t.windows(2) {
            if pair[1] <= pair[0] {
                return Err(CalibrationError::config(format!(
                    "target times must be strictly increasing ({} then {})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self {
            t,
            y,
            operating_conditions,
        })
    }
}

/// All target curves for one fit, keyed by run identifier. Iteration
/// order is the run-id order (BTreeMap), which keeps fitness
/// accumulation and reporting deterministic.
#[derive(Clone, Debug, Default)]
pub struct TargetDataset {
    runs: BTreeMap<String, TargetCondition>,
}

impl TargetDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, run: impl Into<String>, target: TargetCondition) {
        self.runs.insert(run.into(), target);
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetCondition)> {
        self.runs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, run: &str) -> Option<&TargetCondition> {
        self.runs.get(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_interpolation() {
        let oc = OperatingCondition::new(vec![(0.0, 300.0), (0.1, 1300.0), (0.5, 1300.0)]).unwrap();
        assert_eq!(oc.temperature_at(-1.0), 300.0);
        assert_eq!(oc.temperature_at(0.05), 800.0);
        assert_eq!(oc.temperature_at(0.3), 1300.0);
        assert_eq!(oc.temperature_at(9.0), 1300.0);
    }

    #[test]
    fn test_schedule_rejects_non_increasing() {
        assert!(OperatingCondition::new(vec![(0.0, 300.0), (0.0, 400.0)]).is_err());
        assert!(OperatingCondition::new(vec![]).is_err());
    }

    #[test]
    fn test_target_condition_length_mismatch() {
        let oc = OperatingCondition::new(vec![(0.0, 300.0), (1.0, 1000.0)]).unwrap();
        assert!(TargetCondition::new(vec![0.0, 1.0], vec![0.0], oc).is_err());
    }

    #[test]
    fn test_run_result_channel_length_check() {
        let mut channels = BTreeMap::new();
        channels.insert("volatiles".to_string(), vec![0.0, 0.1]);
        assert!(RunResult::new(vec![0.0, 0.5, 1.0], channels).is_err());
    }
}

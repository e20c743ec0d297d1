//! Run orchestration: iterate configured operating-condition runs
//! against a detailed model and narrow its wide multi-species output
//! to the single-species target curves the calibrator needs.
//!
//! Runs execute sequentially so a failure is attributable to a
//! specific run; any failing run aborts dataset construction (a
//! partial dataset would bias the fit).

use crate::config::Fuel;
use crate::detailed::DetailedModel;
use crate::error::{CalibrationError, Result};
use crate::target::{OperatingCondition, RunResult, TargetCondition, TargetDataset};

pub struct RunOrchestrator<'a> {
    model: &'a dyn DetailedModel,
    fuel: &'a Fuel,
    pressure: f64,
}

impl<'a> RunOrchestrator<'a> {
    pub fn new(model: &'a dyn DetailedModel, fuel: &'a Fuel, pressure: f64) -> Self {
        Self {
            model,
            fuel,
            pressure,
        }
    }

    /// Run every configured operating condition and collect the full
    /// yield tables, keyed by run identifier.
    pub fn run_all(
        &self,
        operating_conditions: &[(String, OperatingCondition)],
    ) -> Result<Vec<(String, RunResult)>> {
        let mut results = Vec::with_capacity(operating_conditions.len());
        for (run, oc) in operating_conditions {
            let result = self
                .model
                .simulate(run, self.fuel, self.pressure, oc)
                .map_err(|e| match e {
                    err @ CalibrationError::Simulation { .. } => err,
                    other => CalibrationError::simulation(run.clone(), other.to_string()),
                })?;
            results.push((run.clone(), result));
        }
        Ok(results)
    }

    /// Simulate every run and narrow to the calibration targets for
    /// one species.
    pub fn build_target_dataset(
        &self,
        species: &str,
        operating_conditions: &[(String, OperatingCondition)],
    ) -> Result<TargetDataset> {
        let results = self.run_all(operating_conditions)?;
        Self::narrow(species, &results, operating_conditions)
    }

    /// Narrow previously collected run results to one species' target
    /// curves. Separate from `build_target_dataset` so several fits
    /// can share one set of run results.
    pub fn narrow(
        species: &str,
        results: &[(String, RunResult)],
        operating_conditions: &[(String, OperatingCondition)],
    ) -> Result<TargetDataset> {
        if results.is_empty() {
            return Err(CalibrationError::config("no runs configured"));
        }
        let mut dataset = TargetDataset::new();
        for (run, result) in results {
            let oc = operating_conditions
                .iter()
                .find(|(name, _)| name == run)
                .map(|(_, oc)| oc.clone())
                .ok_or_else(|| {
                    CalibrationError::simulation(run.clone(), "no operating condition for run")
                })?;
            let y = result.channel(species).ok_or_else(|| {
                CalibrationError::simulation(
                    run.clone(),
                    format!("species '{}' not in run result", species),
                )
            })?;
            let target = TargetCondition::new(result.time().to_vec(), y.to_vec(), oc)
                .map_err(|e| CalibrationError::simulation(run.clone(), e.to_string()))?;
            dataset.insert(run.clone(), target);
        }
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fuel;
    use std::collections::BTreeMap;

    /// Fake detailed model: analytic yield curve, fails on request.
    struct FakeModel {
        fail_on: Option<String>,
    }

    impl DetailedModel for FakeModel {
        fn simulate(
            &self,
            run: &str,
            _fuel: &Fuel,
            _pressure: f64,
            _oc: &OperatingCondition,
        ) -> Result<RunResult> {
            if self.fail_on.as_deref() == Some(run) {
                return Err(CalibrationError::simulation(run, "solver blew up"));
            }
            let time = vec![0.0, 0.5, 1.0];
            let mut channels = BTreeMap::new();
            channels.insert("volatiles".to_string(), vec![0.0, 0.3, 0.5]);
            channels.insert("tar".to_string(), vec![0.0, 0.1, 0.2]);
            RunResult::new(time, channels)
        }
    }

    fn conditions(n: usize) -> Vec<(String, OperatingCondition)> {
        (0..n)
            .map(|i| {
                (
                    format!("run{}", i),
                    OperatingCondition::new(vec![(0.0, 300.0), (1.0, 1200.0)]).unwrap(),
                )
            })
            .collect()
    }

    fn fuel() -> Fuel {
        Fuel::default()
    }

    #[test]
    fn test_builds_dataset_for_all_runs() {
        let model = FakeModel { fail_on: None };
        let fuel = fuel();
        let orch = RunOrchestrator::new(&model, &fuel, 101_325.0);
        let ocs = conditions(3);
        let ds = orch.build_target_dataset("volatiles", &ocs).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.get("run1").unwrap().y, vec![0.0, 0.3, 0.5]);
    }

    #[test]
    fn test_failing_run_aborts_with_run_id() {
        let model = FakeModel {
            fail_on: Some("run1".to_string()),
        };
        let fuel = fuel();
        let orch = RunOrchestrator::new(&model, &fuel, 101_325.0);
        let err = orch.run_all(&conditions(3)).unwrap_err();
        match err {
            CalibrationError::Simulation { run, .. } => assert_eq!(run, "run1"),
            other => panic!("expected Simulation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_species_is_simulation_error() {
        let model = FakeModel { fail_on: None };
        let fuel = fuel();
        let orch = RunOrchestrator::new(&model, &fuel, 101_325.0);
        let ocs = conditions(2);
        let err = orch.build_target_dataset("char", &ocs).unwrap_err();
        assert!(matches!(err, CalibrationError::Simulation { .. }));
    }
}

//! Detailed-model boundary.
//!
//! The detailed pyrolysis solvers themselves are external programs;
//! the core only needs a black box that turns (fuel, pressure,
//! operating conditions) into a time-indexed yield table. The
//! `tabulated` model replays recorded solver output from per-run CSV
//! files, which is how detailed results enter the pipeline here.
//! Model names are resolved through an explicit registry at
//! configuration-load time.

use crate::config::Fuel;
use crate::error::{CalibrationError, Result};
use crate::target::{OperatingCondition, RunResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub trait DetailedModel: Send + Sync {
    /// Produce the yield table for one run. `run` is the run
    /// identifier (used for data lookup and error tagging).
    fn simulate(
        &self,
        run: &str,
        fuel: &Fuel,
        pressure: f64,
        operating_conditions: &OperatingCondition,
    ) -> Result<RunResult>;
}

/// Resolve a detailed-model name from configuration.
pub fn resolve(name: &str, data_path: &Path) -> Result<Box<dyn DetailedModel>> {
    match name {
        "tabulated" => Ok(Box::new(TabulatedModel::new(data_path))),
        other => Err(CalibrationError::config(format!(
            "unknown detailed model '{}' (available: tabulated)",
            other
        ))),
    }
}

/// Replays recorded detailed-model output from `<dir>/<run>.csv`.
///
/// Expected layout: a header line `t,<channel>,<channel>,...` followed
/// by numeric rows. Times must be strictly increasing.
pub struct TabulatedModel {
    dir: PathBuf,
}

impl TabulatedModel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_table(&self, run: &str) -> Result<RunResult> {
        let path = self.dir.join(format!("{}.csv", run));
        let file = File::open(&path).map_err(|e| CalibrationError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut lines = BufReader::new(file).lines();

        let header = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                return Err(CalibrationError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
            None => {
                return Err(CalibrationError::simulation(run, "empty yield table"));
            }
        };
        let columns: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();
        if columns.first().map(|c| c.as_str()) != Some("t") {
            return Err(CalibrationError::simulation(
                run,
                format!("first column of {} must be 't'", path.display()),
            ));
        }

        let mut time = Vec::new();
        let mut series: Vec<Vec<f64>> = vec![Vec::new(); columns.len() - 1];
        for (lineno, line) in lines.enumerate() {
            let line = line.map_err(|e| CalibrationError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != columns.len() {
                return Err(CalibrationError::simulation(
                    run,
                    format!("line {}: expected {} fields", lineno + 2, columns.len()),
                ));
            }
            for (i, field) in fields.iter().enumerate() {
                let v: f64 = field.trim().parse().map_err(|_| {
                    CalibrationError::simulation(
                        run,
                        format!("line {}: bad number '{}'", lineno + 2, field),
                    )
                })?;
                if i == 0 {
                    time.push(v);
                } else {
                    series[i - 1].push(v);
                }
            }
        }

        for pair in time.windows(2) {
            if pair[1] <= pair[0] {
                return Err(CalibrationError::simulation(
                    run,
                    format!(
                        "times in {} must be strictly increasing ({} then {})",
                        path.display(),
                        pair[0],
                        pair[1]
                    ),
                ));
            }
        }

        let mut channels = BTreeMap::new();
        for (name, values) in columns.iter().skip(1).zip(series) {
            channels.insert(name.clone(), values);
        }
        RunResult::new(time, channels)
            .map_err(|e| CalibrationError::simulation(run, e.to_string()))
    }
}

impl DetailedModel for TabulatedModel {
    fn simulate(
        &self,
        run: &str,
        _fuel: &Fuel,
        _pressure: f64,
        _operating_conditions: &OperatingCondition,
    ) -> Result<RunResult> {
        self.read_table(run)
    }
}

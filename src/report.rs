//! Result artifacts: convergence-log CSV, per-run target-vs-fit curve
//! CSV, and a JSON bundle carrying the manifest, best parameters and
//! the full convergence log. Formats are for downstream plotting and
//! archival; the core stays agnostic to them.

use crate::empirical::ModelFamily;
use crate::evolution::{ConvergenceRecord, FitResult};
use crate::target::TargetDataset;
use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SCHEMA_VERSION: &str = "1.0.0";
pub const PROGRAM_ID: &str = "PYROCAL";

#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub program_id: String,
    pub program_version: String,
    pub platform: String,
    pub timestamp_unix: u64,
    pub config_hash: String,
}

impl Manifest {
    pub fn new(config_text: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            program_id: PROGRAM_ID.to_string(),
            program_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            timestamp_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            config_hash: compute_hash(config_text),
        }
    }
}

pub fn compute_hash(data: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// One run's target curve next to the best-fit prediction.
#[derive(Clone, Debug, Serialize)]
pub struct RunCurves {
    pub run: String,
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub y_fit: Vec<f64>,
}

/// Evaluate the best-fit model over every run's target grid.
pub fn predicted_curves(
    family: &dyn ModelFamily,
    best: &[f64],
    targets: &TargetDataset,
) -> Vec<RunCurves> {
    let model = family.build(best);
    targets
        .iter()
        .map(|(run, target)| RunCurves {
            run: run.to_string(),
            t: target.t.clone(),
            y: target.y.clone(),
            y_fit: model.evaluate(&target.t, &target.operating_conditions),
        })
        .collect()
}

#[derive(Serialize)]
pub struct BestParameter {
    pub name: String,
    pub value: f64,
}

/// JSON result bundle for one fit.
#[derive(Serialize)]
pub struct FitBundle<'a> {
    pub manifest: Manifest,
    pub model: &'a str,
    pub fit: &'a str,
    pub species: &'a str,
    pub best_parameters: Vec<BestParameter>,
    pub best_fitness: f64,
    pub generations: usize,
    pub convergence: &'a [ConvergenceRecord],
    pub curves: &'a [RunCurves],
}

impl<'a> FitBundle<'a> {
    pub fn new(
        manifest: Manifest,
        model: &'a str,
        fit: &'a str,
        species: &'a str,
        result: &'a FitResult,
        curves: &'a [RunCurves],
    ) -> Self {
        let best_parameters = result
            .names
            .iter()
            .zip(result.best.iter())
            .map(|(name, &value)| BestParameter {
                name: name.clone(),
                value,
            })
            .collect();
        Self {
            manifest,
            model,
            fit,
            species,
            best_parameters,
            best_fitness: result.best_fitness,
            generations: result.log.len(),
            curves,
            convergence: &result.log,
        }
    }
}

pub fn write_bundle(path: &Path, bundle: &FitBundle) -> Result<()> {
    let json = serde_json::to_string_pretty(bundle)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn write_convergence_csv(path: &Path, log: &[ConvergenceRecord]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "generation,min,max,avg,std")?;
    for rec in log {
        writeln!(
            w,
            "{},{:.6e},{:.6e},{:.6e},{:.6e}",
            rec.generation, rec.min, rec.max, rec.avg, rec.std
        )?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_curves_csv(path: &Path, curves: &[RunCurves]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "run,t,y,y_fit")?;
    for c in curves {
        for i in 0..c.t.len() {
            writeln!(
                w,
                "{},{:.6e},{:.6e},{:.6e}",
                c.run, c.t[i], c.y[i], c.y_fit[i]
            )?;
        }
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_hash_stable() {
        assert_eq!(compute_hash("abc"), compute_hash("abc"));
        assert_ne!(compute_hash("abc"), compute_hash("abd"));
    }
}

//! TOML configuration: fuel description, operating conditions,
//! detailed models and their fits. Mirrors the structure of the
//! original input deck; every section is validated up front with the
//! offending field named, and model/method names are resolved against
//! explicit registries at load time.

use crate::detailed;
use crate::empirical::{self, ModelFamily};
use crate::error::{CalibrationError, Result};
use crate::evolution::{Encoding, EvolutionConfig};
use crate::fitness::Normalization;
use crate::params::{ParameterSpec, ParameterSpace};
use crate::target::OperatingCondition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    pub fuel: Fuel,
    pub operating_conditions: OperatingConditions,
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Fuel {
    #[serde(default)]
    pub name: String,
    /// Higher heating value, MJ/kg.
    #[serde(default)]
    pub hhv: f64,
    /// Dry density, kg/m3.
    #[serde(default)]
    pub rho_dry: f64,
    pub ultimate_analysis: UltimateAnalysis,
    pub proximate_analysis: ProximateAnalysis,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UltimateAnalysis {
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "H")]
    pub h: f64,
    #[serde(rename = "O")]
    pub o: f64,
    #[serde(rename = "N")]
    pub n: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProximateAnalysis {
    #[serde(rename = "FC")]
    pub fc: f64,
    #[serde(rename = "VM")]
    pub vm: f64,
    #[serde(rename = "Ash")]
    pub ash: f64,
    #[serde(rename = "Moist")]
    pub moist: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperatingConditions {
    pub runs: usize,
    /// Shared pressure, Pa.
    pub pressure: f64,
    /// Per-run heating schedules keyed `run0`, `run1`, ... as
    /// (time, temperature) point lists.
    #[serde(flatten)]
    pub schedules: BTreeMap<String, Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub active: bool,
    /// Directory holding this model's per-run data (tabulated model).
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default)]
    pub fit: BTreeMap<String, FitSettings>,
}

fn default_data_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FitSettings {
    /// Empirical model family name (registry: sfor, c2sm).
    pub model: String,
    /// Yield channel to fit.
    pub species: String,
    /// Fitting method; only "evolve" is implemented.
    pub method: String,
    pub parameters_min: Vec<f64>,
    pub parameters_max: Vec<f64>,
    pub parameters_init: Vec<f64>,
    pub npop: usize,
    pub ngen: usize,
    pub mu: usize,
    pub lambda_: usize,
    pub cxpb: f64,
    pub mutpb: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// "real" or "binary".
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Bits per parameter (binary encoding only).
    #[serde(default = "default_bits")]
    pub bits: u32,
    /// "none" or "range" per-run error normalization.
    #[serde(default = "default_normalization")]
    pub normalization: String,
}

fn default_seed() -> u64 {
    42
}

fn default_encoding() -> String {
    "real".to_string()
}

fn default_bits() -> u32 {
    16
}

fn default_normalization() -> String {
    "none".to_string()
}

impl OperatingConditions {
    /// Ordered (run id, schedule) pairs for runs 0..runs.
    pub fn resolve(&self) -> Result<Vec<(String, OperatingCondition)>> {
        let mut out = Vec::with_capacity(self.runs);
        for n in 0..self.runs {
            let key = format!("run{}", n);
            let points = self.schedules.get(&key).ok_or_else(|| {
                CalibrationError::config(format!(
                    "operating_conditions.{} missing (runs = {})",
                    key, self.runs
                ))
            })?;
            let oc = OperatingCondition::new(points.iter().map(|p| (p[0], p[1])).collect())
                .map_err(|e| {
                    CalibrationError::config(format!("operating_conditions.{}: {}", key, e))
                })?;
            out.push((key, oc));
        }
        Ok(out)
    }
}

impl FitSettings {
    /// Resolve the empirical model family from the registry.
    pub fn family(&self) -> Result<&'static dyn ModelFamily> {
        empirical::resolve(&self.model)
    }

    /// Build the parameter space for this fit: the family defines
    /// name order, the configuration supplies bounds and init values.
    pub fn parameter_space(&self) -> Result<ParameterSpace> {
        let family = self.family()?;
        let names = family.parameter_names();
        for (label, values) in [
            ("parameters_min", &self.parameters_min),
            ("parameters_max", &self.parameters_max),
            ("parameters_init", &self.parameters_init),
        ] {
            if values.len() != names.len() {
                return Err(CalibrationError::config(format!(
                    "{} has {} entries, model '{}' needs {} ({})",
                    label,
                    values.len(),
                    self.model,
                    names.len(),
                    names.join(", ")
                )));
            }
        }
        let specs = names
            .iter()
            .enumerate()
            .map(|(i, name)| ParameterSpec {
                name: name.to_string(),
                min: self.parameters_min[i],
                max: self.parameters_max[i],
                init: self.parameters_init[i],
            })
            .collect();
        ParameterSpace::define(specs)
    }

    pub fn encoding(&self) -> Result<Encoding> {
        match self.encoding.as_str() {
            "real" => Ok(Encoding::Real),
            "binary" => Ok(Encoding::Binary { bits: self.bits }),
            other => Err(CalibrationError::config(format!(
                "encoding must be 'real' or 'binary', got '{}'",
                other
            ))),
        }
    }

    pub fn normalization(&self) -> Result<Normalization> {
        match self.normalization.as_str() {
            "none" => Ok(Normalization::None),
            "range" => Ok(Normalization::Range),
            other => Err(CalibrationError::config(format!(
                "normalization must be 'none' or 'range', got '{}'",
                other
            ))),
        }
    }

    pub fn evolution_config(&self) -> Result<EvolutionConfig> {
        if self.method != "evolve" {
            return Err(CalibrationError::UnsupportedMethod(self.method.clone()));
        }
        let config = EvolutionConfig {
            npop: self.npop,
            ngen: self.ngen,
            mu: self.mu,
            lambda_: self.lambda_,
            cxpb: self.cxpb,
            mutpb: self.mutpb,
            seed: self.seed,
            encoding: self.encoding()?,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn check_fraction_sum(section: &str, parts: &[(&str, f64)]) -> Result<()> {
    let mut sum = 0.0;
    for (name, v) in parts {
        if !(0.0..=1.0).contains(v) {
            return Err(CalibrationError::config(format!(
                "{}.{} must be in [0, 1], got {}",
                section, name, v
            )));
        }
        sum += v;
    }
    if (sum - 1.0).abs() > 1e-2 {
        return Err(CalibrationError::config(format!(
            "{} fractions must sum to 1, got {:.4}",
            section, sum
        )));
    }
    Ok(())
}

impl Root {
    pub fn from_toml(text: &str) -> Result<Self> {
        let root: Root = toml::from_str(text)
            .map_err(|e| CalibrationError::config(format!("config parse failed: {}", e)))?;
        root.validate()?;
        Ok(root)
    }

    pub fn validate(&self) -> Result<()> {
        check_fraction_sum(
            "fuel.ultimate_analysis",
            &[
                ("C", self.fuel.ultimate_analysis.c),
                ("H", self.fuel.ultimate_analysis.h),
                ("O", self.fuel.ultimate_analysis.o),
                ("N", self.fuel.ultimate_analysis.n),
            ],
        )?;
        check_fraction_sum(
            "fuel.proximate_analysis",
            &[
                ("FC", self.fuel.proximate_analysis.fc),
                ("VM", self.fuel.proximate_analysis.vm),
                ("Ash", self.fuel.proximate_analysis.ash),
                ("Moist", self.fuel.proximate_analysis.moist),
            ],
        )?;
        if self.operating_conditions.pressure <= 0.0 {
            return Err(CalibrationError::config(
                "operating_conditions.pressure must be positive",
            ));
        }
        if self.operating_conditions.runs == 0 {
            return Err(CalibrationError::config(
                "operating_conditions.runs must be >= 1",
            ));
        }
        self.operating_conditions.resolve()?;

        for (model_name, model) in &self.models {
            // unknown detailed-model names fail here, not at run time
            detailed::resolve(model_name, std::path::Path::new(&model.data_path))?;
            for (fit_name, fit) in &model.fit {
                let context = format!("models.{}.fit.{}", model_name, fit_name);
                if fit.method != "evolve" {
                    return Err(CalibrationError::UnsupportedMethod(fit.method.clone()));
                }
                fit.parameter_space()
                    .map_err(|e| CalibrationError::config(format!("{}: {}", context, e)))?;
                fit.normalization()
                    .map_err(|e| CalibrationError::config(format!("{}: {}", context, e)))?;
                fit.evolution_config()
                    .map_err(|e| CalibrationError::config(format!("{}: {}", context, e)))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
[fuel]
name = "hv-bituminous"
hhv = 29.0
rho_dry = 1310.0

[fuel.ultimate_analysis]
C = 0.75
H = 0.05
O = 0.15
N = 0.05

[fuel.proximate_analysis]
FC = 0.45
VM = 0.40
Ash = 0.10
Moist = 0.05

[operating_conditions]
runs = 2
pressure = 101325.0
run0 = [[0.0, 300.0], [0.05, 1300.0], [0.5, 1300.0]]
run1 = [[0.0, 300.0], [0.02, 1600.0], [0.5, 1600.0]]

[models.tabulated]
active = true
data_path = "data/runs"

[models.tabulated.fit.volatiles-sfor]
model = "sfor"
species = "volatiles"
method = "evolve"
parameters_min = [1e4, 5e7, 0.3]
parameters_max = [1e9, 2e8, 0.8]
parameters_init = [1e6, 1e8, 0.5]
npop = 40
ngen = 30
mu = 20
lambda_ = 40
cxpb = 0.6
mutpb = 0.2
seed = 42
"#;

    #[test]
    fn test_example_parses_and_validates() {
        let root = Root::from_toml(EXAMPLE).unwrap();
        assert_eq!(root.operating_conditions.runs, 2);
        let ocs = root.operating_conditions.resolve().unwrap();
        assert_eq!(ocs[1].0, "run1");
        let fit = &root.models["tabulated"].fit["volatiles-sfor"];
        assert_eq!(fit.parameter_space().unwrap().names(), vec!["A", "E", "y0"]);
    }

    #[test]
    fn test_missing_run_schedule_rejected() {
        let bad = EXAMPLE.replace("run1 = ", "run9 = ");
        let err = Root::from_toml(&bad).unwrap_err();
        assert!(err.to_string().contains("run1"));
    }

    #[test]
    fn test_unknown_detailed_model_rejected_at_load() {
        let bad = EXAMPLE
            .replace("[models.tabulated]", "[models.cpd]")
            .replace(
                "[models.tabulated.fit.volatiles-sfor]",
                "[models.cpd.fit.volatiles-sfor]",
            );
        let err = Root::from_toml(&bad).unwrap_err();
        assert!(err.to_string().contains("cpd"), "got: {}", err);
    }

    #[test]
    fn test_unknown_empirical_model_rejected() {
        let bad = EXAMPLE.replace("model = \"sfor\"", "model = \"fgdvc\"");
        assert!(Root::from_toml(&bad).is_err());
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let bad = EXAMPLE.replace("method = \"evolve\"", "method = \"minimize\"");
        let err = Root::from_toml(&bad).unwrap_err();
        assert!(matches!(err, CalibrationError::UnsupportedMethod(ref m) if m == "minimize"));
    }

    #[test]
    fn test_bad_fraction_sum_rejected() {
        let bad = EXAMPLE.replace("C = 0.75", "C = 0.95");
        assert!(Root::from_toml(&bad).is_err());
    }

    #[test]
    fn test_inverted_init_rejected() {
        let bad = EXAMPLE.replace(
            "parameters_init = [1e6, 1e8, 0.5]",
            "parameters_init = [1e6, 1e8, 0.9]",
        );
        assert!(Root::from_toml(&bad).is_err());
    }
}

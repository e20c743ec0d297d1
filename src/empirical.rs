//! Empirical surrogate models.
//!
//! Cheap parametric models of volatile release, evaluated along a
//! run's heating schedule. Each family declares its parameter names in
//! canonical order; the calibrator constructs one model instance per
//! candidate parameter vector and evaluates it at the target time
//! points. Families are resolved through an explicit registry at
//! configuration-load time.

use crate::error::{CalibrationError, Result};
use crate::target::OperatingCondition;

/// Universal gas constant, J/(kmol K). Activation energies are
/// J/kmol throughout, matching the 1e7..1e8 magnitudes used in
/// configurations.
pub const R_GAS: f64 = 8314.462_618;

/// Sub-steps per output interval for the kinetic integration.
const SUBSTEPS: usize = 32;

pub trait EmpiricalModel: Send + Sync {
    /// Predicted yield at each time point, aligned to `t`.
    fn evaluate(&self, t: &[f64], operating_conditions: &OperatingCondition) -> Vec<f64>;
}

/// A named empirical model family: parameter schema plus a typed
/// factory from parameter vector to model instance.
pub trait ModelFamily: Send + Sync {
    fn name(&self) -> &'static str;
    fn parameter_names(&self) -> &'static [&'static str];
    fn build(&self, params: &[f64]) -> Box<dyn EmpiricalModel>;
}

/// Resolve an empirical model family by configuration name.
pub fn resolve(name: &str) -> Result<&'static dyn ModelFamily> {
    match name {
        "sfor" => Ok(&SforFamily),
        "c2sm" => Ok(&C2smFamily),
        other => Err(CalibrationError::config(format!(
            "unknown empirical model '{}' (available: sfor, c2sm)",
            other
        ))),
    }
}

fn arrhenius(a: f64, e: f64, temp: f64) -> f64 {
    a * (-e / (R_GAS * temp)).exp()
}

// ============================================================================
// SFOR: single first-order reaction
// ============================================================================

/// Single first-order reaction model.
///
/// dy/dt = k(T) (y0 - y) with k = A exp(-E / RT), y(t_start) = 0.
/// Parameters: A [1/s], E [J/kmol], y0 [-].
pub struct SforFamily;

impl ModelFamily for SforFamily {
    fn name(&self) -> &'static str {
        "sfor"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["A", "E", "y0"]
    }

    fn build(&self, params: &[f64]) -> Box<dyn EmpiricalModel> {
        Box::new(Sfor {
            a: params[0],
            e: params[1],
            y0: params[2],
        })
    }
}

struct Sfor {
    a: f64,
    e: f64,
    y0: f64,
}

impl EmpiricalModel for Sfor {
    fn evaluate(&self, t: &[f64], oc: &OperatingCondition) -> Vec<f64> {
        let mut out = Vec::with_capacity(t.len());
        if t.is_empty() {
            return out;
        }
        let mut time = oc.start_time().min(t[0]);
        let mut y = 0.0;
        for &t_out in t {
            let span = t_out - time;
            if span > 0.0 {
                let dt = span / SUBSTEPS as f64;
                for i in 0..SUBSTEPS {
                    let t_mid = time + (i as f64 + 0.5) * dt;
                    let k = arrhenius(self.a, self.e, oc.temperature_at(t_mid));
                    // exact update for constant k over the sub-step
                    y = self.y0 - (self.y0 - y) * (-k * dt).exp();
                }
                time = t_out;
            }
            out.push(y);
        }
        out
    }
}

// ============================================================================
// C2SM: competing two-step model
// ============================================================================

/// Kobayashi competing two-step model.
///
/// Raw fuel c is consumed by two parallel reactions with rates k1, k2
/// and stoichiometric yields y1, y2:
///   dc/dt = -(k1 + k2) c
///   dy/dt = (y1 k1 + y2 k2) c
/// Parameters: A1, E1, y1, A2, E2, y2.
pub struct C2smFamily;

impl ModelFamily for C2smFamily {
    fn name(&self) -> &'static str {
        "c2sm"
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        &["A1", "E1", "y1", "A2", "E2", "y2"]
    }

    fn build(&self, params: &[f64]) -> Box<dyn EmpiricalModel> {
        Box::new(C2sm {
            a1: params[0],
            e1: params[1],
            y1: params[2],
            a2: params[3],
            e2: params[4],
            y2: params[5],
        })
    }
}

struct C2sm {
    a1: f64,
    e1: f64,
    y1: f64,
    a2: f64,
    e2: f64,
    y2: f64,
}

impl EmpiricalModel for C2sm {
    fn evaluate(&self, t: &[f64], oc: &OperatingCondition) -> Vec<f64> {
        let mut out = Vec::with_capacity(t.len());
        if t.is_empty() {
            return out;
        }
        let mut time = oc.start_time().min(t[0]);
        let mut c = 1.0;
        let mut y = 0.0;
        for &t_out in t {
            let span = t_out - time;
            if span > 0.0 {
                let dt = span / SUBSTEPS as f64;
                for i in 0..SUBSTEPS {
                    let t_mid = time + (i as f64 + 0.5) * dt;
                    let temp = oc.temperature_at(t_mid);
                    let k1 = arrhenius(self.a1, self.e1, temp);
                    let k2 = arrhenius(self.a2, self.e2, temp);
                    let k = k1 + k2;
                    if k > 0.0 {
                        let consumed = c * (1.0 - (-k * dt).exp());
                        y += (self.y1 * k1 + self.y2 * k2) / k * consumed;
                        c -= consumed;
                    }
                }
                time = t_out;
            }
            out.push(y);
        }
        out
    }
}

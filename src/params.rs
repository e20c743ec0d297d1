//! Parameter space definition and genotype decoding.
//!
//! The ordered list of `ParameterSpec` entries is the single source of
//! truth for parameter names, bounds and initial values. The same
//! ordering is used by the genotype encodings, the empirical model
//! constructors and all reporting.

use crate::error::{CalibrationError, Result};

/// One bounded, named parameter.
#[derive(Clone, Debug)]
pub struct ParameterSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub init: f64,
}

/// What to do when a decoded value falls outside its bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundsPolicy {
    /// Reject with `OutOfBounds`.
    Strict,
    /// Clip to the nearest bound.
    Clamp,
}

/// Ordered, validated set of parameter specs.
#[derive(Clone, Debug)]
pub struct ParameterSpace {
    specs: Vec<ParameterSpec>,
    policy: BoundsPolicy,
}

impl ParameterSpace {
    pub fn define(specs: Vec<ParameterSpec>) -> Result<Self> {
        Self::with_policy(specs, BoundsPolicy::Strict)
    }

    pub fn with_policy(specs: Vec<ParameterSpec>, policy: BoundsPolicy) -> Result<Self> {
        if specs.is_empty() {
            return Err(CalibrationError::config("parameter space is empty"));
        }
        for spec in &specs {
            if !spec.min.is_finite() || !spec.max.is_finite() || !spec.init.is_finite() {
                return Err(CalibrationError::config(format!(
                    "parameter {}: bounds and init must be finite",
                    spec.name
                )));
            }
            if spec.min > spec.max {
                return Err(CalibrationError::config(format!(
                    "parameter {}: min={} > max={}",
                    spec.name, spec.min, spec.max
                )));
            }
            if spec.init < spec.min || spec.init > spec.max {
                return Err(CalibrationError::config(format!(
                    "parameter {}: init={} outside [{}, {}]",
                    spec.name, spec.init, spec.min, spec.max
                )));
            }
        }
        for i in 0..specs.len() {
            for j in (i + 1)..specs.len() {
                if specs[i].name == specs[j].name {
                    return Err(CalibrationError::config(format!(
                        "duplicate parameter name: {}",
                        specs[i].name
                    )));
                }
            }
        }
        Ok(Self { specs, policy })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn initial(&self) -> Vec<f64> {
        self.specs.iter().map(|s| s.init).collect()
    }

    pub fn bounds(&self, i: usize) -> (f64, f64) {
        (self.specs[i].min, self.specs[i].max)
    }

    /// Validate (or clamp) a real-valued vector against the bounds.
    /// Identity on values already within bounds.
    pub fn decode_real(&self, vector: &[f64]) -> Result<Vec<f64>> {
        if vector.len() != self.specs.len() {
            return Err(CalibrationError::config(format!(
                "parameter vector length {} != space dimension {}",
                vector.len(),
                self.specs.len()
            )));
        }
        let mut out = Vec::with_capacity(vector.len());
        for (spec, &v) in self.specs.iter().zip(vector.iter()) {
            if v < spec.min || v > spec.max {
                match self.policy {
                    BoundsPolicy::Strict => {
                        return Err(CalibrationError::OutOfBounds {
                            name: spec.name.clone(),
                            value: v,
                            min: spec.min,
                            max: spec.max,
                        });
                    }
                    BoundsPolicy::Clamp => out.push(v.max(spec.min).min(spec.max)),
                }
            } else {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Decode a binary chromosome into a real vector.
    ///
    /// The chromosome is split into equal `bits`-wide fields, one per
    /// parameter, each read as a big-endian unsigned integer and
    /// mapped linearly from [0, 2^bits - 1] onto [min, max]. The
    /// all-zero field decodes to exactly `min`, the all-one field to
    /// exactly `max`.
    pub fn decode_binary(&self, chromosome: &[bool], bits: u32) -> Result<Vec<f64>> {
        if bits == 0 || bits > 63 {
            return Err(CalibrationError::config(format!(
                "bits per parameter must be in [1, 63], got {}",
                bits
            )));
        }
        let expected = self.specs.len() * bits as usize;
        if chromosome.len() != expected {
            return Err(CalibrationError::config(format!(
                "chromosome length {} != {} parameters x {} bits",
                chromosome.len(),
                self.specs.len(),
                bits
            )));
        }
        let scale = ((1u64 << bits) - 1) as f64;
        let mut out = Vec::with_capacity(self.specs.len());
        for (i, spec) in self.specs.iter().enumerate() {
            let field = &chromosome[i * bits as usize..(i + 1) * bits as usize];
            let mut value = 0u64;
            for &bit in field {
                value = (value << 1) | bit as u64;
            }
            out.push(spec.min + (value as f64 / scale) * (spec.max - spec.min));
        }
        Ok(out)
    }
}

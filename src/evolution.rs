//! (mu, lambda) evolutionary calibration driver.
//!
//! Population-based stochastic search over the empirical-model
//! parameter space. Supports real-valued and binary-encoded
//! chromosomes; survivor selection is strictly comma-style (only
//! offspring form the next generation, parents are discarded), while
//! the best individual ever seen is tracked separately and reported.
//!
//! All random draws happen on the controlling thread in a fixed
//! order. Fitness evaluation is pure and may be fanned out across a
//! worker pool; results are collected by individual index, never by
//! completion order, so the worker count changes wall-clock time only.

use crate::error::{CalibrationError, Result};
use crate::fitness::PENALTY;
use crate::params::ParameterSpace;
use crate::rng::Lcg;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

/// Genotype encoding of candidate parameter vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Bounded real vector, one gene per parameter.
    Real,
    /// Fixed-width bit string, `bits` per parameter, linearly mapped
    /// into the parameter bounds.
    Binary { bits: u32 },
}

/// Evolution settings.
#[derive(Clone, Debug)]
pub struct EvolutionConfig {
    /// Population size.
    pub npop: usize,
    /// Number of generations.
    pub ngen: usize,
    /// Breeding pool size (best of the evaluated pool).
    pub mu: usize,
    /// Offspring produced per generation.
    pub lambda_: usize,
    /// Probability an offspring is produced by crossover.
    pub cxpb: f64,
    /// Probability an offspring is produced by mutation.
    pub mutpb: f64,
    /// Seed for the deterministic random source.
    pub seed: u64,
    pub encoding: Encoding,
    /// Blend crossover spread (real encoding).
    pub blend_alpha: f64,
    /// Gaussian mutation sigma as a fraction of the parameter range
    /// (real encoding).
    pub sigma_frac: f64,
    /// Per-gene (or per-bit) probability inside the mutation
    /// operator.
    pub indpb: f64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            npop: 40,
            ngen: 30,
            mu: 20,
            lambda_: 40,
            cxpb: 0.6,
            mutpb: 0.2,
            seed: 42,
            encoding: Encoding::Real,
            blend_alpha: 0.5,
            sigma_frac: 0.1,
            indpb: 0.2,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.npop == 0 {
            return Err(CalibrationError::config("npop must be > 0"));
        }
        if self.ngen == 0 {
            return Err(CalibrationError::config("ngen must be > 0"));
        }
        if self.mu == 0 || self.mu > self.npop {
            return Err(CalibrationError::config(format!(
                "mu must be in [1, npop], got mu={} npop={}",
                self.mu, self.npop
            )));
        }
        if self.lambda_ < self.npop {
            return Err(CalibrationError::config(format!(
                "lambda_ must be >= npop (comma selection), got lambda_={} npop={}",
                self.lambda_, self.npop
            )));
        }
        for (name, p) in [("cxpb", self.cxpb), ("mutpb", self.mutpb)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CalibrationError::config(format!(
                    "{} must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        if self.cxpb + self.mutpb > 1.0 {
            return Err(CalibrationError::config(format!(
                "cxpb + mutpb must be <= 1, got {}",
                self.cxpb + self.mutpb
            )));
        }
        for (name, p) in [
            ("blend_alpha", self.blend_alpha),
            ("sigma_frac", self.sigma_frac),
        ] {
            if !p.is_finite() || p < 0.0 {
                return Err(CalibrationError::config(format!(
                    "{} must be non-negative, got {}",
                    name, p
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.indpb) {
            return Err(CalibrationError::config(format!(
                "indpb must be in [0, 1], got {}",
                self.indpb
            )));
        }
        if let Encoding::Binary { bits } = self.encoding {
            if bits == 0 || bits > 63 {
                return Err(CalibrationError::config(format!(
                    "bits must be in [1, 63], got {}",
                    bits
                )));
            }
        }
        Ok(())
    }
}

/// Genotype payload of one candidate.
#[derive(Clone, Debug, PartialEq)]
pub enum Genes {
    Real(Vec<f64>),
    Binary(Vec<bool>),
}

/// Candidate solution. Fitness is unset until evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct Individual {
    pub genes: Genes,
    pub fitness: Option<f64>,
}

impl Individual {
    fn new(genes: Genes) -> Self {
        Self {
            genes,
            fitness: None,
        }
    }
}

/// Per-generation fitness statistics. One record per completed
/// generation.
#[derive(Clone, Debug, Serialize)]
pub struct ConvergenceRecord {
    pub generation: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub std: f64,
}

/// Final calibration output: best-ever parameter vector (canonical
/// order, named), its fitness and the full convergence log.
#[derive(Clone, Debug)]
pub struct FitResult {
    pub names: Vec<String>,
    pub best: Vec<f64>,
    pub best_fitness: f64,
    pub log: Vec<ConvergenceRecord>,
}

/// The genetic-algorithm driver.
pub struct Evolution {
    config: EvolutionConfig,
    space: ParameterSpace,
    rng: Lcg,
}

impl Evolution {
    pub fn configure(space: ParameterSpace, config: EvolutionConfig) -> Result<Self> {
        config.validate()?;
        let rng = Lcg::new(config.seed);
        Ok(Self { config, space, rng })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    fn decode(&self, ind: &Individual) -> Result<Vec<f64>> {
        match (&ind.genes, self.config.encoding) {
            (Genes::Real(x), Encoding::Real) => Ok(x.clone()),
            (Genes::Binary(bits), Encoding::Binary { bits: width }) => {
                self.space.decode_binary(bits, width)
            }
            _ => Err(CalibrationError::config(
                "individual encoding does not match configured encoding",
            )),
        }
    }

    fn random_individual(&mut self) -> Individual {
        match self.config.encoding {
            Encoding::Real => {
                let genes = (0..self.space.len())
                    .map(|i| {
                        let (lo, hi) = self.space.bounds(i);
                        self.rng.range(lo, hi)
                    })
                    .collect();
                Individual::new(Genes::Real(genes))
            }
            Encoding::Binary { bits } => {
                let n = self.space.len() * bits as usize;
                let genes = (0..n).map(|_| self.rng.bit()).collect();
                Individual::new(Genes::Binary(genes))
            }
        }
    }

    /// Blend crossover (real) or two-point crossover (binary).
    fn crossover(&mut self, a: &Individual, b: &Individual) -> (Individual, Individual) {
        match (&a.genes, &b.genes) {
            (Genes::Real(x1), Genes::Real(x2)) => {
                let mut c1 = x1.clone();
                let mut c2 = x2.clone();
                let alpha = self.config.blend_alpha;
                for i in 0..c1.len() {
                    let gamma = (1.0 + 2.0 * alpha) * self.rng.uniform() - alpha;
                    let (lo, hi) = self.space.bounds(i);
                    c1[i] = ((1.0 - gamma) * x1[i] + gamma * x2[i]).max(lo).min(hi);
                    c2[i] = (gamma * x1[i] + (1.0 - gamma) * x2[i]).max(lo).min(hi);
                }
                (
                    Individual::new(Genes::Real(c1)),
                    Individual::new(Genes::Real(c2)),
                )
            }
            (Genes::Binary(x1), Genes::Binary(x2)) => {
                let mut c1 = x1.clone();
                let mut c2 = x2.clone();
                let n = c1.len();
                if n >= 2 {
                    let p1 = self.rng.below(n);
                    let p2 = self.rng.below(n);
                    let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
                    for i in lo..hi {
                        c1[i] = x2[i];
                        c2[i] = x1[i];
                    }
                }
                (
                    Individual::new(Genes::Binary(c1)),
                    Individual::new(Genes::Binary(c2)),
                )
            }
            _ => (a.clone(), b.clone()),
        }
    }

    /// Per-gene Gaussian perturbation clipped to bounds (real), or
    /// per-bit flip (binary).
    fn mutate(&mut self, ind: &Individual) -> Individual {
        match &ind.genes {
            Genes::Real(x) => {
                let mut genes = x.clone();
                for (i, g) in genes.iter_mut().enumerate() {
                    if self.rng.uniform() < self.config.indpb {
                        let (lo, hi) = self.space.bounds(i);
                        let sigma = self.config.sigma_frac * (hi - lo);
                        *g = (*g + self.rng.gauss() * sigma).max(lo).min(hi);
                    }
                }
                Individual::new(Genes::Real(genes))
            }
            Genes::Binary(bits) => {
                let mut genes = bits.clone();
                for b in genes.iter_mut() {
                    if self.rng.uniform() < self.config.indpb {
                        *b = !*b;
                    }
                }
                Individual::new(Genes::Binary(genes))
            }
        }
    }

    /// Produce one offspring var-or style: exactly one of crossover,
    /// mutation or reproduction, chosen with probability cxpb / mutpb
    /// / remainder. Parents are drawn uniformly from the breeding
    /// pool (the mu best of the current population).
    fn breed_one(&mut self, pool: &[Individual]) -> Individual {
        let roll = self.rng.uniform();
        if roll < self.config.cxpb {
            let a = self.rng.below(pool.len());
            let b = self.rng.below(pool.len());
            let (child, _) = self.crossover(&pool[a], &pool[b]);
            child
        } else if roll < self.config.cxpb + self.config.mutpb {
            let a = self.rng.below(pool.len());
            self.mutate(&pool[a])
        } else {
            let a = self.rng.below(pool.len());
            let mut clone = pool[a].clone();
            clone.fitness = None;
            clone
        }
    }

    fn evaluate_all<F>(
        &self,
        pop: &mut [Individual],
        eval: &F,
        pool: Option<&rayon::ThreadPool>,
    ) -> Result<()>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let decoded = pop
            .iter()
            .map(|ind| self.decode(ind))
            .collect::<Result<Vec<_>>>()?;
        let guard = |f: f64| if f.is_finite() { f } else { PENALTY };
        // order-preserving collect keeps results indexed by individual
        let fits: Vec<f64> = match pool {
            Some(workers) => {
                workers.install(|| decoded.par_iter().map(|p| guard(eval(p))).collect())
            }
            None => decoded.iter().map(|p| guard(eval(p))).collect(),
        };
        for (ind, f) in pop.iter_mut().zip(fits) {
            ind.fitness = Some(f);
        }
        Ok(())
    }

    /// Sort ascending by fitness; stable, so equal-fitness ties keep
    /// creation order and the result is identical for any worker
    /// count.
    fn sort_by_fitness(pop: &mut [Individual]) {
        pop.sort_by(|a, b| {
            let fa = a.fitness.unwrap_or(PENALTY);
            let fb = b.fitness.unwrap_or(PENALTY);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        });
    }

    fn statistics(generation: usize, pop: &[Individual]) -> ConvergenceRecord {
        let n = pop.len() as f64;
        let fits: Vec<f64> = pop.iter().map(|i| i.fitness.unwrap_or(PENALTY)).collect();
        let min = fits.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = fits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg = fits.iter().sum::<f64>() / n;
        let var = fits.iter().map(|f| (f - avg) * (f - avg)).sum::<f64>() / n;
        ConvergenceRecord {
            generation,
            min,
            max,
            avg,
            std: var.sqrt(),
        }
    }

    /// Run the full evolution: exactly `ngen` breeding generations,
    /// returning the best individual ever seen (decoded) and one
    /// convergence record per generation.
    pub fn run<F>(&mut self, eval: &F, n_workers: usize) -> Result<FitResult>
    where
        F: Fn(&[f64]) -> f64 + Sync,
    {
        let workers = if n_workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n_workers)
                    .build()
                    .map_err(|e| {
                        CalibrationError::config(format!("worker pool setup failed: {}", e))
                    })?,
            )
        } else {
            None
        };

        // generation 0
        let mut population: Vec<Individual> =
            (0..self.config.npop).map(|_| self.random_individual()).collect();
        self.evaluate_all(&mut population, eval, workers.as_ref())?;

        let mut best: Option<Individual> = None;
        let track_best = |pop: &[Individual], best: &mut Option<Individual>| {
            for ind in pop {
                let better = match best {
                    Some(b) => ind.fitness.unwrap_or(PENALTY) < b.fitness.unwrap_or(PENALTY),
                    None => true,
                };
                if better {
                    *best = Some(ind.clone());
                }
            }
        };
        track_best(&population, &mut best);

        let mut log = Vec::with_capacity(self.config.ngen);
        for generation in 1..=self.config.ngen {
            Self::sort_by_fitness(&mut population);
            let pool: Vec<Individual> = population[..self.config.mu].to_vec();

            let mut offspring: Vec<Individual> = (0..self.config.lambda_)
                .map(|_| self.breed_one(&pool))
                .collect();
            self.evaluate_all(&mut offspring, eval, workers.as_ref())?;
            track_best(&offspring, &mut best);

            // comma selection: next generation comes from offspring only
            Self::sort_by_fitness(&mut offspring);
            offspring.truncate(self.config.npop);
            population = offspring;

            log.push(Self::statistics(generation, &population));
        }

        let best = best.expect("population is never empty");
        Ok(FitResult {
            names: self.space.names(),
            best: self.decode(&best)?,
            best_fitness: best.fitness.unwrap_or(PENALTY),
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterSpec;

    fn space_1d() -> ParameterSpace {
        ParameterSpace::define(vec![ParameterSpec {
            name: "p".into(),
            min: 0.0,
            max: 10.0,
            init: 5.0,
        }])
        .unwrap()
    }

    fn sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 3.0) * (v - 3.0)).sum()
    }

    #[test]
    fn test_rejects_zero_generations() {
        let cfg = EvolutionConfig {
            ngen: 0,
            ..Default::default()
        };
        assert!(Evolution::configure(space_1d(), cfg).is_err());
    }

    #[test]
    fn test_rejects_bad_probability() {
        let cfg = EvolutionConfig {
            cxpb: 1.4,
            ..Default::default()
        };
        assert!(Evolution::configure(space_1d(), cfg).is_err());
        let cfg = EvolutionConfig {
            cxpb: 0.7,
            mutpb: 0.7,
            ..Default::default()
        };
        assert!(Evolution::configure(space_1d(), cfg).is_err());
    }

    #[test]
    fn test_log_length_and_ordering() {
        let cfg = EvolutionConfig {
            npop: 12,
            ngen: 7,
            mu: 6,
            lambda_: 12,
            seed: 3,
            ..Default::default()
        };
        let mut ga = Evolution::configure(space_1d(), cfg).unwrap();
        let result = ga.run(&sphere, 1).unwrap();
        assert_eq!(result.log.len(), 7);
        for rec in &result.log {
            assert!(rec.min <= rec.avg && rec.avg <= rec.max);
            assert!(rec.std >= 0.0);
        }
    }

    #[test]
    fn test_converges_on_sphere() {
        let cfg = EvolutionConfig {
            npop: 40,
            ngen: 40,
            mu: 20,
            lambda_: 40,
            seed: 42,
            ..Default::default()
        };
        let mut ga = Evolution::configure(space_1d(), cfg).unwrap();
        let result = ga.run(&sphere, 1).unwrap();
        assert!(
            (result.best[0] - 3.0).abs() < 0.2,
            "best={} fitness={}",
            result.best[0],
            result.best_fitness
        );
    }

    #[test]
    fn test_binary_encoding_converges() {
        let cfg = EvolutionConfig {
            npop: 40,
            ngen: 40,
            mu: 20,
            lambda_: 40,
            seed: 7,
            encoding: Encoding::Binary { bits: 12 },
            ..Default::default()
        };
        let mut ga = Evolution::configure(space_1d(), cfg).unwrap();
        let result = ga.run(&sphere, 1).unwrap();
        assert!((result.best[0] - 3.0).abs() < 0.2);
    }

    #[test]
    fn test_best_ever_is_global_minimum_seen() {
        let cfg = EvolutionConfig {
            npop: 10,
            ngen: 5,
            mu: 5,
            lambda_: 10,
            seed: 11,
            ..Default::default()
        };
        let mut ga = Evolution::configure(space_1d(), cfg).unwrap();
        let result = ga.run(&sphere, 1).unwrap();
        let log_min = result
            .log
            .iter()
            .map(|r| r.min)
            .fold(f64::INFINITY, f64::min);
        assert!(result.best_fitness <= log_min);
    }

    #[test]
    fn test_determinism_across_worker_counts() {
        let cfg = EvolutionConfig {
            npop: 16,
            ngen: 10,
            mu: 8,
            lambda_: 16,
            seed: 99,
            ..Default::default()
        };
        let mut a = Evolution::configure(space_1d(), cfg.clone()).unwrap();
        let mut b = Evolution::configure(space_1d(), cfg).unwrap();
        let ra = a.run(&sphere, 1).unwrap();
        let rb = b.run(&sphere, 4).unwrap();
        assert_eq!(ra.best[0].to_bits(), rb.best[0].to_bits());
        assert_eq!(ra.best_fitness.to_bits(), rb.best_fitness.to_bits());
        assert_eq!(ra.log.len(), rb.log.len());
        for (x, y) in ra.log.iter().zip(rb.log.iter()) {
            assert_eq!(x.min.to_bits(), y.min.to_bits());
            assert_eq!(x.avg.to_bits(), y.avg.to_bits());
            assert_eq!(x.std.to_bits(), y.std.to_bits());
        }
    }

    #[test]
    fn test_penalty_candidates_are_selected_against() {
        // half the domain evaluates to NaN; the search must still
        // settle in the finite half
        let nan_sphere = |x: &[f64]| -> f64 {
            if x[0] > 5.0 {
                f64::NAN
            } else {
                (x[0] - 3.0) * (x[0] - 3.0)
            }
        };
        let cfg = EvolutionConfig {
            npop: 30,
            ngen: 30,
            mu: 15,
            lambda_: 30,
            seed: 5,
            ..Default::default()
        };
        let mut ga = Evolution::configure(space_1d(), cfg).unwrap();
        let result = ga.run(&nan_sphere, 1).unwrap();
        assert!(result.best_fitness < PENALTY);
        assert!(result.best[0] <= 5.0);
    }
}

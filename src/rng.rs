//! Deterministic random source for the evolutionary search.
//!
//! A seeded linear congruential generator, passed explicitly to the
//! calibrator. All stochastic draws happen on the controlling thread,
//! so a fixed seed reproduces the exact same populations regardless of
//! how many workers evaluate fitness.

/// Linear congruential generator (deterministic).
#[derive(Clone, Debug)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Uniform draw in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) as f64) / ((1u64 << 31) as f64)
    }

    /// Uniform draw in [lo, hi).
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.uniform() * (hi - lo)
    }

    /// Random integer in [0, n).
    pub fn below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let i = (self.uniform() * n as f64) as usize;
        i.min(n - 1)
    }

    /// Random bit.
    pub fn bit(&mut self) -> bool {
        self.uniform() < 0.5
    }

    /// Standard normal draw (Box-Muller).
    pub fn gauss(&mut self) -> f64 {
        let mut u1 = self.uniform();
        if u1 <= f64::MIN_POSITIVE {
            u1 = f64::MIN_POSITIVE;
        }
        let u2 = self.uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_in_unit_interval() {
        let mut rng = Lcg::new(42);
        for _ in 0..10_000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Lcg::new(7);
        let mut b = Lcg::new(7);
        for _ in 0..100 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
    }

    #[test]
    fn test_below_bounds() {
        let mut rng = Lcg::new(1);
        for _ in 0..1000 {
            assert!(rng.below(7) < 7);
        }
    }
}

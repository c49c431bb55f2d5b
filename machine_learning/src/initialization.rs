use rand::Rng;
use rand_distr::{Distribution, Uniform, uniform::Error as UniformError};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, arch::layers::Dense};

/// How the parameters of a fresh network are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSpec {
    Uniform { low: f32, high: f32 },
    XavierUniform,
}

impl Default for InitSpec {
    fn default() -> Self {
        Self::Uniform {
            low: -0.2,
            high: 0.2,
        }
    }
}

impl InitSpec {
    /// Checks that the distribution can be sampled from.
    pub fn validate(&self) -> Result<()> {
        if let InitSpec::Uniform { low, high } = *self {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(MlErr::InvalidSpec(format!(
                    "uniform initialization needs low < high, got [{low}, {high})"
                )));
            }
        }

        Ok(())
    }

    /// Draws the parameters for every layer, in layer order.
    ///
    /// # Arguments
    /// * `layers` - The layers to initialize.
    /// * `rng` - The random number generator to sample from.
    ///
    /// # Returns
    /// A buffer with exactly as many parameters as the layers hold.
    pub fn generate<R: Rng>(&self, layers: &[Dense], rng: &mut R) -> Result<Vec<f32>> {
        let total = layers.iter().map(Dense::size).sum();
        let mut params = Vec::with_capacity(total);

        for layer in layers {
            let (fan_in, fan_out) = layer.dim();
            let limit = layer.size();

            let mut weight_gen = match *self {
                InitSpec::Uniform { low, high } => RandWeightGen::uniform(limit, low, high),
                InitSpec::XavierUniform => RandWeightGen::xavier_uniform(limit, fan_in, fan_out),
            }
            .map_err(|e| MlErr::InvalidSpec(format!("invalid initialization range: {e}")))?;

            while let Some(chunk) = weight_gen.sample(rng, limit) {
                params.extend(chunk);
            }
        }

        Ok(params)
    }
}

/// A weight generator that follows a certain probabilistic distribution.
pub struct RandWeightGen<D: Distribution<f32>> {
    distribution: D,
    remaining: usize,
}

impl<D: Distribution<f32>> RandWeightGen<D> {
    /// Creates a new `RandWeightGen` weight generator.
    ///
    /// # Arguments
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(distribution: D, limit: usize) -> Self {
        Self {
            distribution,
            remaining: limit,
        }
    }

    /// Samples at most `n` numbers, `None` once the limit has been reached.
    pub fn sample<R: Rng>(&mut self, rng: &mut R, mut n: usize) -> Option<Vec<f32>> {
        if self.remaining == 0 {
            return None;
        }

        n = n.min(self.remaining);
        self.remaining -= n;
        Some((0..n).map(|_| self.distribution.sample(rng)).collect())
    }
}

impl RandWeightGen<Uniform<f32>> {
    /// Creates a new `RandWeightGen` weight generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The incluive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(limit: usize, low: f32, high: f32) -> std::result::Result<Self, UniformError> {
        Ok(Self::new(Uniform::new(low, high)?, limit))
    }

    /// Creates a new `RandWeightGen` weight generator using Xavier uniform initialization.
    ///
    /// # Arguments
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units in the weight tensor.
    /// * `fan_out` - The number of output units in the weight tensor.
    pub fn xavier_uniform(
        limit: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> std::result::Result<Self, UniformError> {
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        Self::uniform(limit, -range, range)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn layers() -> Vec<Dense> {
        vec![Dense::new((5, 10), None), Dense::new((10, 1), None)]
    }

    #[test]
    fn generates_every_parameter_inside_the_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = InitSpec::default().generate(&layers(), &mut rng).unwrap();

        assert_eq!(params.len(), 6 * 10 + 11);
        assert!(params.iter().all(|p| (-0.2..0.2).contains(p)));
    }

    #[test]
    fn same_seed_same_parameters() {
        let spec = InitSpec::XavierUniform;
        let a = spec.generate(&layers(), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = spec.generate(&layers(), &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn empty_range_is_rejected() {
        let spec = InitSpec::Uniform { low: 1., high: 1. };
        let err = spec.generate(&layers(), &mut StdRng::seed_from_u64(0));

        assert!(matches!(err, Err(MlErr::InvalidSpec(_))));
    }

    #[test]
    fn generator_stops_at_its_limit() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut weight_gen = RandWeightGen::uniform(5, 0., 1.).unwrap();

        assert_eq!(weight_gen.sample(&mut rng, 3).map(|v| v.len()), Some(3));
        assert_eq!(weight_gen.sample(&mut rng, 3).map(|v| v.len()), Some(2));
        assert!(weight_gen.sample(&mut rng, 3).is_none());
    }
}

use super::Optimizer;
use crate::{MlErr, Result};

#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - The fraction of the previous step carried over into the next one.
    ///
    /// # Returns
    /// A new `GradientDescentWithMomentum` instance.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        if grad.len() != params.len() || grad.len() != self.velocity.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.velocity.len(),
            });
        }

        let lr = self.learning_rate;
        let mu = self.momentum;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                *v = (mu * *v) + g;
                *p -= lr * *v;
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_accumulates_between_steps() {
        let mut params = [0.0];
        let mut optimizer = GradientDescentWithMomentum::new(1, 1.0, 0.5);

        optimizer.update_params(&mut params, &[1.0]).unwrap();
        assert_eq!(params, [-1.0]);

        // v = 0.5 * 1 + 1
        optimizer.update_params(&mut params, &[1.0]).unwrap();
        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn rejects_a_gradient_of_another_size() {
        let mut params = [0.0, 0.0];
        let mut optimizer = GradientDescentWithMomentum::new(2, 1.0, 0.5);

        assert!(optimizer.update_params(&mut params, &[1.0]).is_err());
    }
}

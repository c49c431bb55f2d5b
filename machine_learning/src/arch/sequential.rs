use ndarray::{Array2, ArrayView2};

use super::{Model, layers::Dense, loss::LossFn};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Makes a forward pass through the network, caching what `backward` needs.
    ///
    /// # Arguments
    /// * `params` - The parameters of every layer, in layer order.
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;

        let mut a = x.to_owned();
        let mut offset = 0;

        for layer in &mut self.layers {
            let size = layer.size();
            a = layer.forward(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Makes a read-only forward pass, safe to call from many threads at once.
    pub fn infer(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;

        let mut a = x.to_owned();
        let mut offset = 0;

        for layer in &self.layers {
            let size = layer.size();
            a = layer.infer(&params[offset..offset + size], a.view())?;
            offset += size;
        }

        Ok(a)
    }

    /// Propagates `d` from the last layer to the first one, filling `grad`.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], mut d: Array2<f32>) -> Result<()> {
        self.check_len("sequential parameters", params.len())?;
        self.check_len("sequential gradient", grad.len())?;

        let mut end = params.len();

        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(())
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();

        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    // NOTE: the returned loss is the mean of the losses measured on each batch right before its
    // update, not a fresh pass over the data with the final parameters.
    fn backprop<'a, L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            grad.fill(0.0);

            let y_pred = self.forward(params, x)?;
            total_loss += loss_fn.loss(y_pred.view(), y);
            num_batches += 1;

            let d = loss_fn.loss_prime(y_pred.view(), y);
            self.backward(params, grad, d)?;
            optimizer.update_params(params, grad)?;
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        arch::{activations::ActFn, loss::Mse},
        optimization::GradientDescent,
    };

    fn net() -> Sequential {
        Sequential::new([
            Dense::new((2, 3), Some(ActFn::default())),
            Dense::new((3, 1), Some(ActFn::default())),
        ])
    }

    #[test]
    fn size_is_the_sum_of_the_layers() {
        assert_eq!(net().size(), 3 * 3 + 4);
    }

    #[test]
    fn forward_and_infer_agree() {
        let params: Vec<f32> = (0..13).map(|i| i as f32 * 0.05 - 0.3).collect();
        let x = array![[0.1, 0.9], [0.5, 0.5]];

        let mut model = net();
        let y = model.forward(&params, x.view()).unwrap();

        assert_eq!(y.dim(), (2, 1));
        assert_eq!(model.infer(&params, x.view()).unwrap(), y);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let mut params: Vec<f32> = (0..13).map(|i| (i as f32 * 0.37).sin() * 0.5).collect();
        let x = array![[0.3, -0.7]];
        let y = array![[0.8]];
        let mut model = net();

        let y_pred = model.forward(&params, x.view()).unwrap();
        let d = Mse.loss_prime(y_pred.view(), y.view());
        let mut grad = vec![0.; 13];
        model.backward(&params, &mut grad, d).unwrap();

        let h = 1e-2;
        for i in 0..params.len() {
            let p = params[i];
            params[i] = p + h;
            let up = Mse.loss(model.infer(&params, x.view()).unwrap().view(), y.view());
            params[i] = p - h;
            let down = Mse.loss(model.infer(&params, x.view()).unwrap().view(), y.view());
            params[i] = p;

            let numeric = (up - down) / (2. * h);
            assert!((numeric - grad[i]).abs() < 1e-3, "param {i}: {numeric} vs {}", grad[i]);
        }
    }

    #[test]
    fn backprop_reduces_the_loss() {
        let mut params: Vec<f32> = (0..13).map(|i| (i as f32).cos() * 0.2).collect();
        let mut grad = vec![0.; 13];
        let mut model = net();
        let mut optimizer = GradientDescent::new(0.5);

        let x = array![[0., 0.], [0., 1.], [1., 0.], [1., 1.]];
        let y = array![[0.], [0.], [0.], [1.]];
        let batches = || x.outer_iter().zip(y.outer_iter()).map(|(x, y)| {
            (x.insert_axis(ndarray::Axis(0)), y.insert_axis(ndarray::Axis(0)))
        });

        let first = model
            .backprop(&mut params, &mut grad, &Mse, &mut optimizer, batches())
            .unwrap();

        let mut last = first;
        for _ in 0..500 {
            last = model
                .backprop(&mut params, &mut grad, &Mse, &mut optimizer, batches())
                .unwrap();
        }

        assert!(last < first, "{last} >= {first}");
    }
}

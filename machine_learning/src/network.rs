use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::{
    MlErr, Result,
    arch::{Model, Sequential, activations::ActFn, layers::Dense},
};

/// The shape of a fully connected network: its layer widths and the activation every dense
/// layer applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub input: usize,
    pub hidden: Vec<usize>,
    pub output: usize,
    pub act_fn: ActFn,
}

impl Topology {
    /// Returns every layer width, from the input to the output.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden.len() + 2);
        sizes.push(self.input);
        sizes.extend(&self.hidden);
        sizes.push(self.output);
        sizes
    }

    /// Checks that no layer is zero-width.
    pub fn validate(&self) -> Result<()> {
        if let Some(i) = self.sizes().iter().position(|&n| n == 0) {
            return Err(MlErr::InvalidSpec(format!("layer {i} has no units")));
        }

        Ok(())
    }

    /// Builds the `Sequential` model this topology describes.
    pub fn build(&self) -> Sequential {
        let sizes = self.sizes();

        Sequential::new(
            sizes
                .windows(2)
                .map(|w| Dense::new((w[0], w[1]), Some(self.act_fn))),
        )
    }

    /// Returns the amount of parameters a network with this topology has.
    pub fn num_params(&self) -> usize {
        self.sizes().windows(2).map(|w| (w[0] + 1) * w[1]).sum()
    }
}

/// A network ready for inference: its topology plus the trained parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedNetwork {
    topology: Topology,
    params: Vec<f32>,
}

impl TrainedNetwork {
    /// Creates a new `TrainedNetwork`.
    ///
    /// # Returns
    /// An error if the amount of parameters doesn't match the topology.
    pub fn new(topology: Topology, params: Vec<f32>) -> Result<Self> {
        let network = Self { topology, params };
        network.validate()?;
        Ok(network)
    }

    /// Checks the invariants a deserialized network may have lost.
    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;

        let expected = self.topology.num_params();
        if self.params.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "network parameters",
                got: self.params.len(),
                expected,
            });
        }

        if let Some(i) = self.params.iter().position(|p| !p.is_finite()) {
            return Err(MlErr::InvalidSpec(format!("parameter {i} is not finite")));
        }

        Ok(())
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Runs a single sample through the network.
    ///
    /// # Arguments
    /// * `input` - Exactly `topology.input` values.
    ///
    /// # Returns
    /// The `topology.output` values the network yields.
    pub fn run(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.topology.input {
            return Err(MlErr::SizeMismatch {
                what: "network input",
                got: input.len(),
                expected: self.topology.input,
            });
        }

        let model = self.topology.build();
        debug_assert_eq!(model.size(), self.params.len());

        let x = ArrayView2::from_shape((1, input.len()), input).map_err(|_| {
            MlErr::SizeMismatch {
                what: "network input",
                got: input.len(),
                expected: self.topology.input,
            }
        })?;

        let y = model.infer(&self.params, x)?;
        Ok(y.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology {
            input: 5,
            hidden: vec![10],
            output: 1,
            act_fn: ActFn::default(),
        }
    }

    #[test]
    fn counts_weights_and_biases() {
        assert_eq!(topology().sizes(), [5, 10, 1]);
        assert_eq!(topology().num_params(), 6 * 10 + 11);
        assert_eq!(topology().build().size(), 71);
    }

    #[test]
    fn rejects_params_of_the_wrong_length() {
        assert!(TrainedNetwork::new(topology(), vec![0.; 70]).is_err());
        assert!(TrainedNetwork::new(topology(), vec![0.; 71]).is_ok());
    }

    #[test]
    fn zero_weights_yield_half_through_a_sigmoid() {
        let network = TrainedNetwork::new(topology(), vec![0.; 71]).unwrap();
        let y = network.run(&[0.2, 0.4, 0.4, 0.2, 0.2]).unwrap();

        assert_eq!(y.len(), 1);
        assert!((y[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn run_checks_the_input_width() {
        let network = TrainedNetwork::new(topology(), vec![0.; 71]).unwrap();
        assert!(network.run(&[1., 2.]).is_err());
    }

    #[test]
    fn survives_a_json_round_trip() {
        let params = (0..71).map(|i| i as f32 / 71.).collect();
        let network = TrainedNetwork::new(topology(), params).unwrap();

        let json = serde_json::to_string(&network).unwrap();
        let back: TrainedNetwork = serde_json::from_str(&json).unwrap();

        assert_eq!(back, network);
        assert!(back.validate().is_ok());
    }
}

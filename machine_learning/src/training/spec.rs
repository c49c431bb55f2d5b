use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, arch::activations::ActFn, initialization::InitSpec};

/// The specification for the `Trainer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSpec {
    pub hidden_layers: Vec<usize>,
    pub max_iterations: usize,
    pub error_threshold: f32,
    pub learning_rate: f32,
    pub momentum: f32,
    pub act_fn: ActFn,
    pub init: InitSpec,
    pub batch_size: NonZeroUsize,
    pub log_period: NonZeroUsize,
    pub seed: Option<u64>,
}

impl Default for TrainerSpec {
    fn default() -> Self {
        Self {
            hidden_layers: vec![10],
            max_iterations: 5000,
            error_threshold: 0.005,
            learning_rate: 0.3,
            momentum: 0.1,
            act_fn: ActFn::default(),
            init: InitSpec::default(),
            batch_size: NonZeroUsize::MIN,
            log_period: NonZeroUsize::new(10).unwrap_or(NonZeroUsize::MIN),
            seed: None,
        }
    }
}

impl TrainerSpec {
    /// Checks the hyper-parameters before anything gets allocated.
    pub fn validate(&self) -> Result<()> {
        if let Some(i) = self.hidden_layers.iter().position(|&n| n == 0) {
            return Err(MlErr::InvalidSpec(format!("hidden layer {i} has no units")));
        }

        if self.max_iterations == 0 {
            return Err(MlErr::InvalidSpec("max_iterations must be greater than 0".into()));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(MlErr::InvalidSpec(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }

        if !(0.0..1.0).contains(&self.momentum) {
            return Err(MlErr::InvalidSpec(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }

        if !(self.error_threshold.is_finite() && self.error_threshold >= 0.) {
            return Err(MlErr::InvalidSpec(format!(
                "error_threshold must be a non-negative number, got {}",
                self.error_threshold
            )));
        }

        self.init.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let spec = TrainerSpec::default();

        assert_eq!(spec.hidden_layers, [10]);
        assert_eq!(spec.max_iterations, 5000);
        assert_eq!(spec.error_threshold, 0.005);
        assert_eq!(spec.log_period.get(), 10);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_their_default() {
        let spec: TrainerSpec =
            serde_json::from_str(r#"{ "hidden_layers": [4, 3], "seed": 9 }"#).unwrap();

        assert_eq!(spec.hidden_layers, [4, 3]);
        assert_eq!(spec.seed, Some(9));
        assert_eq!(spec.max_iterations, 5000);
    }

    #[test]
    fn invalid_hyper_parameters() {
        let cases = [
            TrainerSpec {
                hidden_layers: vec![3, 0],
                ..Default::default()
            },
            TrainerSpec {
                max_iterations: 0,
                ..Default::default()
            },
            TrainerSpec {
                learning_rate: 0.,
                ..Default::default()
            },
            TrainerSpec {
                momentum: 1.,
                ..Default::default()
            },
            TrainerSpec {
                error_threshold: f32::NAN,
                ..Default::default()
            },
            TrainerSpec {
                init: InitSpec::Uniform {
                    low: 0.5,
                    high: 0.5,
                },
                ..Default::default()
            },
            TrainerSpec {
                init: InitSpec::Uniform {
                    low: 1.,
                    high: -1.,
                },
                ..Default::default()
            },
        ];

        for spec in cases {
            assert!(matches!(spec.validate(), Err(MlErr::InvalidSpec(_))), "{spec:?}");
        }
    }
}

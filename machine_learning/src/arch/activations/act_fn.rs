use serde::{Deserialize, Serialize};

use super::Sigmoid;

/// The activation function applied element-wise after a dense layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Tanh,
    Relu,
    LeakyRelu { alpha: f32 },
}

impl Default for ActFn {
    fn default() -> Self {
        Self::Sigmoid(Default::default())
    }
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.f(z),
            Self::Tanh => z.tanh(),
            Self::Relu => z.max(0.),
            Self::LeakyRelu { alpha } => {
                if z > 0. {
                    z
                } else {
                    alpha * z
                }
            }
        }
    }

    pub fn df(&self, z: f32) -> f32 {
        match self {
            Self::Sigmoid(a) => a.df(z),
            Self::Tanh => 1. - z.tanh().powi(2),
            Self::Relu => {
                if z > 0. {
                    1.
                } else {
                    0.
                }
            }
            Self::LeakyRelu { alpha } => {
                if z > 0. {
                    1.
                } else {
                    *alpha
                }
            }
        }
    }
}

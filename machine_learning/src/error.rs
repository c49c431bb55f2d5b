use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EmptyDataset,
    Interrupted {
        iteration: usize,
    },
    Diverged {
        iteration: usize,
    },
    InvalidSpec(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::EmptyDataset => write!(f, "The dataset has no samples to train on"),
            MlErr::Interrupted { iteration } => {
                write!(f, "Training was interrupted at iteration {iteration}")
            }
            MlErr::Diverged { iteration } => {
                write!(f, "The training error stopped being finite at iteration {iteration}")
            }
            MlErr::InvalidSpec(msg) => write!(f, "Invalid trainer specification: {msg}"),
        }
    }
}

impl Error for MlErr {}

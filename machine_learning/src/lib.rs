pub mod arch;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod network;
pub mod optimization;
pub mod training;

pub use dataset::Dataset;
pub use error::{MlErr, Result};
pub use network::{Topology, TrainedNetwork};
pub use training::{Progress, ProgressListener, TrainOutcome, Trainer, TrainerSpec};

use std::sync::atomic::AtomicBool;

use log::info;
use machine_learning::{MlErr, Progress, ProgressListener, Trainer, TrainerSpec, TrainedNetwork};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{BuiltDataset, TrainingExample},
    encoder::{INPUT_SIZE, OUTPUT_SIZE},
    error::TrainError,
};

/// Hyper-parameters of a training run, see `TrainerSpec` for the defaults.
pub type TrainerConfig = TrainerSpec;

/// A trained network plus what the run reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub network: TrainedNetwork,
    pub iterations: usize,
    pub error: f32,
    pub examples: usize,
}

impl TrainedModel {
    /// Runs an encoded input through the network.
    pub fn run(&self, input: &[f32; INPUT_SIZE]) -> Result<[f32; OUTPUT_SIZE], MlErr> {
        let output = self.network.run(input)?;
        let got = output.len();

        output.try_into().map_err(|_| MlErr::SizeMismatch {
            what: "network output",
            got,
            expected: OUTPUT_SIZE,
        })
    }

    /// Checks the invariants a deserialized model may have lost.
    pub fn validate(&self) -> Result<(), String> {
        self.network.validate().map_err(|e| e.to_string())?;

        let topology = self.network.topology();
        if topology.input != INPUT_SIZE || topology.output != OUTPUT_SIZE {
            return Err(format!(
                "expected a {INPUT_SIZE} -> {OUTPUT_SIZE} network, got {} -> {}",
                topology.input, topology.output
            ));
        }

        if !self.error.is_finite() {
            return Err(format!("final error {} is not finite", self.error));
        }

        Ok(())
    }
}

/// Trains price models over encoded examples.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    trainer: Trainer,
}

impl ModelTrainer {
    /// Creates a new `ModelTrainer`.
    ///
    /// # Returns
    /// An error if the configuration is invalid.
    pub fn new(config: TrainerConfig) -> Result<Self, TrainError> {
        Ok(Self {
            trainer: Trainer::new(config)?,
        })
    }

    pub fn config(&self) -> &TrainerConfig {
        self.trainer.spec()
    }

    /// Trains a fresh network over `examples`.
    ///
    /// # Arguments
    /// * `examples` - The encoded training set.
    /// * `listener` - Observes the run's progress.
    /// * `cancel` - Stops the run when set, no model is produced.
    ///
    /// # Returns
    /// The trained model, `TrainError::EmptyDataset` before touching any network if `examples`
    /// is empty, or `TrainError::Cancelled`.
    pub fn train<P>(
        &self,
        examples: &[TrainingExample],
        listener: &mut P,
        cancel: &AtomicBool,
    ) -> Result<TrainedModel, TrainError>
    where
        P: ProgressListener,
    {
        if examples.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let built = BuiltDataset {
            examples: examples.to_vec(),
            ..Default::default()
        };
        let dataset = built.to_dataset()?;

        let mut logged = |progress: Progress| {
            info!(
                "iteration {}, training error: {}",
                progress.iteration, progress.error
            );
            listener.on_progress(progress);
        };

        let outcome = self.trainer.train(&dataset, &mut logged, cancel)?;

        Ok(TrainedModel {
            network: outcome.network,
            iterations: outcome.iterations,
            error: outcome.error,
            examples: examples.len(),
        })
    }
}

/// Trains with `config`, logging progress and without cancellation.
pub fn train(examples: &[TrainingExample], config: TrainerConfig) -> Result<TrainedModel, TrainError> {
    if examples.is_empty() {
        return Err(TrainError::EmptyDataset);
    }

    ModelTrainer::new(config)?.train(examples, &mut |_: Progress| {}, &AtomicBool::new(false))
}

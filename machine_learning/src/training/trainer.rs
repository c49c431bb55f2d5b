use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};

use super::{Progress, ProgressListener, TrainerSpec};
use crate::{
    MlErr, Result,
    arch::{Model, Sequential, loss::Mse},
    dataset::Dataset,
    network::{Topology, TrainedNetwork},
    optimization::{GradientDescent, GradientDescentWithMomentum, Optimizer},
};

/// What a finished training run yields.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOutcome {
    pub network: TrainedNetwork,
    pub iterations: usize,
    pub error: f32,
}

/// Trains fully connected networks following a `TrainerSpec`.
///
/// Every iteration is a full pass over the dataset, in order, updating the parameters after
/// each batch. The run stops as soon as the iteration error drops below the threshold or the
/// iteration budget is spent.
#[derive(Debug, Clone)]
pub struct Trainer {
    spec: TrainerSpec,
}

impl Trainer {
    /// Creates a new `Trainer`.
    ///
    /// # Returns
    /// An error if the specification is invalid.
    pub fn new(spec: TrainerSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &TrainerSpec {
        &self.spec
    }

    /// Trains a new network over `dataset`.
    ///
    /// # Arguments
    /// * `dataset` - The samples to learn from.
    /// * `listener` - Gets notified every `log_period` iterations and on the last one.
    /// * `interrupt` - Checked every `log_period` iterations, stops the run when set.
    ///
    /// # Returns
    /// The trained network or an error, `MlErr::EmptyDataset` if there's nothing to learn.
    pub fn train<P>(
        &self,
        dataset: &Dataset,
        listener: &mut P,
        interrupt: &AtomicBool,
    ) -> Result<TrainOutcome>
    where
        P: ProgressListener,
    {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let topology = Topology {
            input: dataset.x_size(),
            hidden: self.spec.hidden_layers.clone(),
            output: dataset.y_size(),
            act_fn: self.spec.act_fn,
        };
        topology.validate()?;

        let model = topology.build();
        let mut rng = self.generate_rng();
        let params = self.spec.init.generate(model.layers(), &mut rng)?;
        let nparams = params.len();

        info!(
            "training a {:?} network on {} samples",
            topology.sizes(),
            dataset.len()
        );

        let (params, iterations, error) = if self.spec.momentum > 0. {
            let optimizer = GradientDescentWithMomentum::new(
                nparams,
                self.spec.learning_rate,
                self.spec.momentum,
            );
            self.run(model, params, optimizer, dataset, listener, interrupt)?
        } else {
            let optimizer = GradientDescent::new(self.spec.learning_rate);
            self.run(model, params, optimizer, dataset, listener, interrupt)?
        };

        info!("training finished after {iterations} iterations with error {error}");

        Ok(TrainOutcome {
            network: TrainedNetwork::new(topology, params)?,
            iterations,
            error,
        })
    }

    fn run<O, P>(
        &self,
        mut model: Sequential,
        mut params: Vec<f32>,
        mut optimizer: O,
        dataset: &Dataset,
        listener: &mut P,
        interrupt: &AtomicBool,
    ) -> Result<(Vec<f32>, usize, f32)>
    where
        O: Optimizer,
        P: ProgressListener,
    {
        let TrainerSpec {
            max_iterations,
            error_threshold,
            batch_size,
            log_period,
            ..
        } = self.spec;

        let loss_fn = Mse::new();
        let mut grad = vec![0.; params.len()];
        let mut error = f32::INFINITY;
        let mut iteration = 0;

        while iteration < max_iterations && error >= error_threshold {
            if iteration % log_period.get() == 0 && interrupt.load(Ordering::Acquire) {
                return Err(MlErr::Interrupted { iteration });
            }

            let batches = dataset.batches(batch_size);
            error = model.backprop(&mut params, &mut grad, &loss_fn, &mut optimizer, batches)?;
            iteration += 1;

            if !error.is_finite() {
                return Err(MlErr::Diverged { iteration });
            }

            let last = error < error_threshold || iteration == max_iterations;
            if last || iteration % log_period.get() == 0 {
                debug!("iteration {iteration}: error {error}");
                listener.on_progress(Progress { iteration, error });
            }
        }

        Ok((params, iteration, error))
    }

    fn generate_rng(&self) -> StdRng {
        match self.spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

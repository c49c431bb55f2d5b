//! The parse, build, train and persist session running in the background.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info, warn};
use machine_learning::Progress;
use parking_lot::RwLock;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    config::PipelineConfig,
    dataset::{BuiltDataset, DatasetBuilder},
    error::{PipelineError, TrainError},
    parser::RecordParser,
    prediction::{ModelSlot, PredictionService},
    store::{DatasetStore, ModelStore},
    trainer::ModelTrainer,
};

/// What a run reports while it goes.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    DatasetReady {
        examples: usize,
        dropped: usize,
        cached: bool,
    },
    Progress(Progress),
    ModelReady {
        iterations: usize,
        error: f32,
        cached: bool,
    },
    Finished(PipelineReport),
    Failed(String),
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub examples: usize,
    pub dropped: usize,
    pub dataset_cached: bool,
    pub model_cached: bool,
    pub iterations: usize,
    pub error: f32,
}

struct Shared {
    models: ModelStore,
    datasets: DatasetStore,
    config: PipelineConfig,
    dataset: RwLock<Option<Arc<BuiltDataset>>>,
    predictions: Arc<PredictionService>,
    running: AtomicBool,
}

/// Owns the stores and the live model of a session.
#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    /// Creates a new `Pipeline`, loading whatever the stores already hold.
    ///
    /// # Arguments
    /// * `models` - The slot of the trained model.
    /// * `datasets` - The slot of the built dataset.
    /// * `config` - The session's configuration.
    ///
    /// # Returns
    /// The pipeline or an error if the config is invalid or a stored value can't be loaded.
    pub fn init(
        models: ModelStore,
        datasets: DatasetStore,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let slot = ModelSlot::new();
        if let Some(model) = models.load()? {
            info!("loaded a stored model trained for {} iterations", model.iterations);
            slot.install(model);
        }

        let dataset = datasets.load()?.filter(|d| !d.is_empty()).map(Arc::new);
        if let Some(dataset) = &dataset {
            info!("loaded a stored dataset of {} examples", dataset.len());
        }

        Ok(Self {
            shared: Arc::new(Shared {
                models,
                datasets,
                config,
                dataset: RwLock::new(dataset),
                predictions: Arc::new(PredictionService::new(slot)),
                running: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// The prediction service backed by this pipeline's live model.
    pub fn predictions(&self) -> Arc<PredictionService> {
        self.shared.predictions.clone()
    }

    pub fn has_model(&self) -> bool {
        self.shared.predictions.slot().is_loaded()
    }

    pub fn dataset(&self) -> Option<Arc<BuiltDataset>> {
        self.shared.dataset.read().clone()
    }

    /// Starts a run over `raw` on a blocking task of the current tokio runtime.
    ///
    /// A loaded model skips training unless `retrain` is set. When training, a non-blank `raw`
    /// is always parsed into a fresh dataset, otherwise the stored one is reused. An empty
    /// dataset is never stored.
    ///
    /// # Returns
    /// A handle to the run, or `PipelineError::Busy` if another run is active.
    pub fn spawn<R: Into<Vec<u8>>>(&self, raw: R) -> Result<PipelineHandle, PipelineError> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::Busy);
        }

        let guard = RunGuard(self.shared.clone());
        let raw = raw.into();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, events) = mpsc::unbounded_channel();

        let task = {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let result = guard.0.run(&raw, &cancel, &tx);

                match &result {
                    Ok(report) => emit(&tx, PipelineEvent::Finished(report.clone())),
                    Err(e) => {
                        warn!("pipeline run failed: {e}");
                        emit(&tx, PipelineEvent::Failed(e.to_string()));
                    }
                }

                result
            })
        };

        Ok(PipelineHandle {
            events,
            cancel,
            task,
        })
    }
}

struct RunGuard(Arc<Shared>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

impl Shared {
    fn run(
        &self,
        raw: &[u8],
        cancel: &AtomicBool,
        events: &UnboundedSender<PipelineEvent>,
    ) -> Result<PipelineReport, PipelineError> {
        let cancelled = || cancel.load(Ordering::Acquire);

        if cancelled() {
            return Err(TrainError::Cancelled.into());
        }

        let slot = self.predictions.slot();
        let cached_model = slot.get().filter(|_| !self.config.retrain);
        let fresh_input = raw.iter().any(|b| !b.is_ascii_whitespace());

        let cached_dataset = if cached_model.is_none() && fresh_input {
            None
        } else {
            self.cached_dataset()
        };

        let (dataset, dataset_cached) = match cached_dataset {
            Some(dataset) => (dataset, true),
            None => (self.build_dataset(raw)?, false),
        };

        emit(
            events,
            PipelineEvent::DatasetReady {
                examples: dataset.len(),
                dropped: dataset.dropped,
                cached: dataset_cached,
            },
        );

        let (model, model_cached) = match cached_model {
            Some(model) => (model, true),
            None => {
                if dataset.is_empty() {
                    return Err(TrainError::EmptyDataset.into());
                }

                if cancelled() {
                    return Err(TrainError::Cancelled.into());
                }

                let trainer = ModelTrainer::new(self.config.trainer.clone())?;
                let mut listener = |progress: Progress| emit(events, PipelineEvent::Progress(progress));
                let model = trainer.train(&dataset.examples, &mut listener, cancel)?;

                self.models.save(&model)?;
                (slot.install(model), false)
            }
        };

        emit(
            events,
            PipelineEvent::ModelReady {
                iterations: model.iterations,
                error: model.error,
                cached: model_cached,
            },
        );

        Ok(PipelineReport {
            examples: dataset.len(),
            dropped: dataset.dropped,
            dataset_cached,
            model_cached,
            iterations: model.iterations,
            error: model.error,
        })
    }

    fn cached_dataset(&self) -> Option<Arc<BuiltDataset>> {
        if self.config.rebuild_dataset {
            return None;
        }

        self.dataset.read().clone().filter(|d| !d.is_empty())
    }

    /// Parses and builds a dataset out of `raw`, storing it only when it holds examples.
    fn build_dataset(&self, raw: &[u8]) -> Result<Arc<BuiltDataset>, PipelineError> {
        let records = RecordParser::new(self.config.parse)?.parse_bytes(raw)?;
        let dataset = Arc::new(DatasetBuilder.build(&records));

        if dataset.is_empty() {
            warn!("no valid examples in the input, keeping the stored dataset");
            return Ok(dataset);
        }

        self.datasets.save(&dataset)?;
        *self.dataset.write() = Some(dataset.clone());
        Ok(dataset)
    }
}

/// Events are purely observational, a run goes on when nobody listens.
fn emit(events: &UnboundedSender<PipelineEvent>, event: PipelineEvent) {
    if events.send(event).is_err() {
        debug!("dropping a pipeline event, the receiver is gone");
    }
}

/// A run in progress.
pub struct PipelineHandle {
    events: UnboundedReceiver<PipelineEvent>,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<Result<PipelineReport, PipelineError>>,
}

impl PipelineHandle {
    /// Asks the run to stop. Honoured before training and between training iterations, a
    /// cancelled run never persists a model.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Waits for the next event, `None` once the run is over and every event was received.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Waits for the run to end.
    pub async fn wait(self) -> Result<PipelineReport, PipelineError> {
        self.task
            .await
            .map_err(|e| PipelineError::Aborted(e.to_string()))?
    }
}

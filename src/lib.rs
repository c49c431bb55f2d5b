//! House price regression: parse delimited records, encode them, train a small feed-forward
//! network and serve predictions out of a persisted model.

pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod prediction;
pub mod record;
pub mod store;
pub mod trainer;

pub use config::PipelineConfig;
pub use dataset::{BuiltDataset, DatasetBuilder, TrainingExample};
pub use error::{
    ConfigError, EncodeError, ParseError, PipelineError, PredictError, StoreError, TrainError,
};
pub use normalize::{DisplayTable, MinMaxNormalizer, NormalizationStats};
pub use parser::{ParseOptions, RecordParser};
pub use pipeline::{Pipeline, PipelineEvent, PipelineHandle, PipelineReport};
pub use prediction::{ModelSlot, Prediction, PredictionRecord, PredictionRequest, PredictionService};
pub use record::RawRecord;
pub use store::{DatasetStore, DisplayStore, FileKv, KvStore, MemoryKv, ModelStore, SlotStore};
pub use trainer::{ModelTrainer, TrainedModel, TrainerConfig};

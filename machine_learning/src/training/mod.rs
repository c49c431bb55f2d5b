mod progress;
mod spec;
mod trainer;

pub use progress::{Progress, ProgressListener};
pub use spec::TrainerSpec;
pub use trainer::{TrainOutcome, Trainer};

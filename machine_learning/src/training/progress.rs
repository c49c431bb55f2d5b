/// A snapshot of the training, reported every `log_period` iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: usize,
    pub error: f32,
}

/// Observes a training run. Listeners can't alter the run.
pub trait ProgressListener {
    fn on_progress(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressListener for F {
    fn on_progress(&mut self, progress: Progress) {
        self(progress)
    }
}

use std::time::Duration;

use crate::execution::BatchScore;

/// Something that happened during training. Epochs and batches are zero based.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    BatchStarted {
        epoch: usize,
        batch: usize,
    },
    /// The angles right after a batch's update.
    Params {
        epoch: usize,
        batch: usize,
        params: Vec<f64>,
    },
    BatchCompleted {
        epoch: usize,
        batch: usize,
        loss: f64,
        gradient: Vec<f64>,
        elapsed: Duration,
    },
    /// The score of the whole validation set after `step` batches of `epoch`.
    Validation {
        epoch: usize,
        step: usize,
        score: BatchScore,
    },
    EpochCompleted {
        epoch: usize,
        mean_loss: f64,
    },
}

/// Receives every `TrainingEvent` of a run, in order.
pub trait Recorder {
    fn record(&mut self, event: &TrainingEvent);
}

impl Recorder for Vec<TrainingEvent> {
    fn record(&mut self, event: &TrainingEvent) {
        self.push(event.clone());
    }
}

impl Recorder for () {
    fn record(&mut self, _: &TrainingEvent) {}
}

impl<R: Recorder + ?Sized> Recorder for &mut R {
    fn record(&mut self, event: &TrainingEvent) {
        (**self).record(event)
    }
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn record(&mut self, event: &TrainingEvent) {
        (**self).record(event)
    }
}

//! Online training of structured models
//!
//! This module contains the training loop, the learning rate schedules and
//! the family of perceptron update rules.

mod schedule;
mod trainer;

// Re-export public types
pub use self::schedule::LearnRateSchedule;
pub use self::trainer::{
    AwayFromWorse, Comparison, EpochStats, LossAugmentedParams, Perceptron, PerceptronParams,
    TowardBetter, Trainer, TrainerParams, TrainingListener, UpdateRule,
};

//! Online learning of structured linear models
//!
//! This library provides the pieces to train linear models over sparse
//! features whose outputs are structures (label sequences, assignments, ...)
//! with perceptron-style online algorithms and averaged weights.
//!
//! A task plugs in through three traits: [`Structure`] for its outputs,
//! [`Model`] for its weights and update, and [`Inference`] for decoding.
//! The [`task`] module ships two ready-made tasks.
//!
//! # Examples
//!
//! ## Training a sequence labeler
//!
//! ```
//! use structlearn::task::{SequenceInput, SequenceModel, SequenceOutput, Viterbi};
//! use structlearn::train::Trainer;
//! use structlearn::{FeatureEncoding, Inference, MapEncoding, Structure};
//!
//! let mut attributes = MapEncoding::new();
//! let mut encode = |words: &[&str]| -> SequenceInput {
//!     SequenceInput::new(
//!         words
//!             .iter()
//!             .map(|w| attributes.put(w.to_string()).into_iter().collect())
//!             .collect(),
//!     )
//! };
//!
//! let inputs = vec![encode(&["walk", "shop"]), encode(&["shop", "clean"])];
//! let outputs = vec![SequenceOutput::new(vec![0, 1]), SequenceOutput::new(vec![1, 1])];
//!
//! let mut trainer = Trainer::perceptron(SequenceModel::new(2), Viterbi::new()).with_num_epochs(5)?;
//! trainer.train(&inputs, &outputs)?;
//!
//! let model = trainer.into_model();
//! let mut predicted = outputs[0].create_new();
//! Viterbi::new().inference(&model, &inputs[0], &mut predicted)?;
//! # Ok::<(), structlearn::Error>(())
//! ```

mod context;
mod encoding;
mod error;
mod inference;
mod model;
mod parameter;

/// Ready-made tasks
pub mod task;
/// Online training algorithms
pub mod train;

// Re-export main types
pub use self::context::{Context, Reset};
pub use self::encoding::{FeatureEncoding, MapEncoding};
pub use self::error::{Error, Result};
pub use self::inference::Inference;
pub use self::model::{Model, SparseModel, Structure};
pub use self::parameter::AveragedParameter;

// Re-export training types for convenience
pub use self::train::{AwayFromWorse, LearnRateSchedule, Perceptron, TowardBetter, Trainer};

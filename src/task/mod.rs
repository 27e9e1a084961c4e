//! Ready-made tasks: models and inference for common output structures.

pub mod assignment;
pub mod sequence;

pub use self::assignment::{Argmax, AssignmentInput, AssignmentModel, AssignmentOutput};
pub use self::sequence::{SequenceInput, SequenceModel, SequenceOutput, Viterbi};

use crate::error::Result;
use crate::model::Model;

/// Task-specific decoding used by the training loop.
///
/// Every method must be deterministic for identical weights and input;
/// implementations document their tie-breaking policy.
pub trait Inference<M: Model> {
    /// Fill `output` with the highest scoring structure for `input`.
    fn inference(&self, model: &M, input: &M::Input, output: &mut M::Output) -> Result<()>;

    /// Fill `output` with the structure maximizing
    /// `score + loss_weight * loss(structure, reference)`.
    ///
    /// A positive `loss_weight` favours high-loss structures, a negative one
    /// low-loss structures.
    fn loss_augmented_inference(
        &self,
        model: &M,
        input: &M::Input,
        reference: &M::Output,
        output: &mut M::Output,
        loss_weight: f64,
    ) -> Result<()>;

    /// Copy the known entries of `partial` into `output` and fill the
    /// unknown ones with the highest scoring values consistent with them.
    fn partial_inference(
        &self,
        model: &M,
        input: &M::Input,
        partial: &M::Output,
        output: &mut M::Output,
    ) -> Result<()>;
}

use super::{Comparison, Perceptron, Trainer, UpdateRule};
use crate::error::Result;
use crate::inference::Inference;
use crate::model::Model;

/// Plain perceptron parameters. The rule has none beyond the shared
/// [`TrainerParams`](super::TrainerParams).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptronParams;

impl UpdateRule for Perceptron {
    type Params = PerceptronParams;

    const NAME: &'static str = "Perceptron";

    fn compare<M, I>(
        _params: &Self::Params,
        inference: &I,
        model: &M,
        input: &M::Input,
        _reference: &M::Output,
        predicted: &mut M::Output,
    ) -> Result<Comparison<M::Output>>
    where
        M: Model,
        I: Inference<M>,
    {
        inference.inference(model, input, predicted)?;
        Ok(Comparison::ReferenceOverPredicted)
    }
}

impl<M, I> Trainer<M, I, Perceptron>
where
    M: Model,
    I: Inference<M>,
{
    /// Create a new plain perceptron trainer
    pub fn perceptron(model: M, inference: I) -> Self {
        Self::new(model, inference)
    }
}

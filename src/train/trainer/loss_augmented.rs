use super::{AwayFromWorse, Comparison, Trainer, TowardBetter, UpdateRule};
use crate::error::{Error, Result};
use crate::inference::Inference;
use crate::model::{Model, Structure};

/// Parameters of the loss-augmented perceptrons.
#[derive(Debug, Clone)]
pub struct LossAugmentedParams {
    loss_weight: f64,
}

impl Default for LossAugmentedParams {
    fn default() -> Self {
        Self { loss_weight: 1.0 }
    }
}

impl LossAugmentedParams {
    /// Weight of the loss term added to the score during loss-augmented
    /// inference.
    pub fn loss_weight(&self) -> f64 {
        self.loss_weight
    }

    pub fn set_loss_weight(&mut self, loss_weight: f64) -> Result<()> {
        if !(loss_weight.is_finite() && loss_weight >= 0.0) {
            return Err(Error::param("loss_weight must be non-negative"));
        }
        self.loss_weight = loss_weight;
        Ok(())
    }
}

fn set_loss_param(params: &mut LossAugmentedParams, name: &str, value: &str) -> Result<bool> {
    match name {
        "loss_weight" => {
            let loss_weight = value
                .trim()
                .parse()
                .map_err(|_| Error::param(format!("invalid value for {}: {}", name, value)))?;
            params.set_loss_weight(loss_weight)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn get_loss_param(params: &LossAugmentedParams, name: &str) -> Option<String> {
    match name {
        "loss_weight" => Some(params.loss_weight().to_string()),
        _ => None,
    }
}

impl UpdateRule for AwayFromWorse {
    type Params = LossAugmentedParams;

    const NAME: &'static str = "AwayFromWorse";

    /// The loss-augmented search favours high-loss structures; the update
    /// moves toward the plain prediction and away from that worse structure.
    fn compare<M, I>(
        params: &Self::Params,
        inference: &I,
        model: &M,
        input: &M::Input,
        reference: &M::Output,
        predicted: &mut M::Output,
    ) -> Result<Comparison<M::Output>>
    where
        M: Model,
        I: Inference<M>,
    {
        let mut worse = reference.create_new();
        inference.loss_augmented_inference(
            model,
            input,
            reference,
            &mut worse,
            params.loss_weight(),
        )?;
        inference.inference(model, input, predicted)?;
        Ok(Comparison::PredictedOver(worse))
    }

    fn set_param(params: &mut Self::Params, name: &str, value: &str) -> Result<bool> {
        set_loss_param(params, name, value)
    }

    fn get_param(params: &Self::Params, name: &str) -> Option<String> {
        get_loss_param(params, name)
    }
}

impl UpdateRule for TowardBetter {
    type Params = LossAugmentedParams;

    const NAME: &'static str = "TowardBetter";

    /// The loss term enters the search with a negative sign so it favours
    /// low-loss structures; the update moves toward that better structure
    /// and away from the plain prediction.
    fn compare<M, I>(
        params: &Self::Params,
        inference: &I,
        model: &M,
        input: &M::Input,
        reference: &M::Output,
        predicted: &mut M::Output,
    ) -> Result<Comparison<M::Output>>
    where
        M: Model,
        I: Inference<M>,
    {
        let mut better = reference.create_new();
        inference.loss_augmented_inference(
            model,
            input,
            reference,
            &mut better,
            -params.loss_weight(),
        )?;
        inference.inference(model, input, predicted)?;
        Ok(Comparison::OverPredicted(better))
    }

    fn set_param(params: &mut Self::Params, name: &str, value: &str) -> Result<bool> {
        set_loss_param(params, name, value)
    }

    fn get_param(params: &Self::Params, name: &str) -> Option<String> {
        get_loss_param(params, name)
    }
}

impl<M, I> Trainer<M, I, AwayFromWorse>
where
    M: Model,
    I: Inference<M>,
{
    /// Create a new away-from-worse trainer
    pub fn away_from_worse(model: M, inference: I) -> Self {
        Self::new(model, inference)
    }

    /// Set loss weight (builder pattern)
    pub fn with_loss_weight(mut self, loss_weight: f64) -> Result<Self> {
        self.rule_params_mut().set_loss_weight(loss_weight)?;
        Ok(self)
    }
}

impl<M, I> Trainer<M, I, TowardBetter>
where
    M: Model,
    I: Inference<M>,
{
    /// Create a new toward-better trainer
    pub fn toward_better(model: M, inference: I) -> Self {
        Self::new(model, inference)
    }

    /// Set loss weight (builder pattern)
    pub fn with_loss_weight(mut self, loss_weight: f64) -> Result<Self> {
        self.rule_params_mut().set_loss_weight(loss_weight)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_weight_validation() {
        let mut params = LossAugmentedParams::default();
        assert_eq!(params.loss_weight(), 1.0);
        assert!(params.set_loss_weight(-0.5).is_err());
        assert!(params.set_loss_weight(f64::INFINITY).is_err());
        assert!(params.set_loss_weight(0.0).is_ok());
        assert!(params.set_loss_weight(2.5).is_ok());
        assert_eq!(params.loss_weight(), 2.5);
    }

    #[test]
    fn test_loss_param_by_name() {
        let mut params = LossAugmentedParams::default();
        assert!(set_loss_param(&mut params, "loss_weight", "0.25").unwrap());
        assert_eq!(get_loss_param(&params, "loss_weight").as_deref(), Some("0.25"));
        assert!(!set_loss_param(&mut params, "c", "1.0").unwrap());
        assert!(set_loss_param(&mut params, "loss_weight", "abc").is_err());
    }
}

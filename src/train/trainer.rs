use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::schedule::LearnRateSchedule;
use crate::error::{Error, Result};
use crate::inference::Inference;
use crate::model::{Model, Structure};

mod loss_augmented;
mod perceptron;

pub use self::loss_augmented::LossAugmentedParams;
pub use self::perceptron::PerceptronParams;

/// Update rule marker for the plain structured perceptron.
#[derive(Debug, Clone, Copy)]
pub struct Perceptron;

/// Update rule marker for the loss-augmented perceptron that moves away from
/// high-loss structures.
#[derive(Debug, Clone, Copy)]
pub struct AwayFromWorse;

/// Update rule marker for the loss-augmented perceptron that moves toward
/// low-loss structures.
#[derive(Debug, Clone, Copy)]
pub struct TowardBetter;

/// The pair of structures an update compares, as chosen by an [`UpdateRule`].
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison<O> {
    /// Move toward the reference, away from the prediction.
    ReferenceOverPredicted,
    /// Move toward the prediction, away from the given structure.
    PredictedOver(O),
    /// Move toward the given structure, away from the prediction.
    OverPredicted(O),
}

/// Policy deciding which inferred structures drive an update.
pub trait UpdateRule {
    type Params: Default + Clone + fmt::Debug;

    /// Short name used in log messages
    const NAME: &'static str;

    /// Run the inference calls of this rule for one example.
    ///
    /// `predicted` always receives the plain (undistorted) prediction.
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
        I: Inference<M>;

    /// Set a rule specific parameter by name.
    ///
    /// Returns `Ok(false)` if the rule has no parameter with that name.
    fn set_param(_params: &mut Self::Params, _name: &str, _value: &str) -> Result<bool> {
        Ok(false)
    }

    /// Get a rule specific parameter by name.
    fn get_param(_params: &Self::Params, _name: &str) -> Option<String> {
        None
    }
}

/// Summary of one pass over the training set.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    /// Zero-based epoch number
    pub epoch: usize,
    /// Sum of the per-example losses
    pub loss: f64,
    /// Number of examples visited
    pub num_examples: usize,
    /// Number of examples with a non-zero loss
    pub num_mistakes: usize,
}

/// Hooks called by [`Trainer::train_with_listener`] around every epoch.
///
/// Returning `false` from either hook stops training.
pub trait TrainingListener<M> {
    fn before_epoch(&mut self, _epoch: usize) -> bool {
        true
    }

    fn after_epoch(&mut self, _model: &M, _stats: &EpochStats) -> bool {
        true
    }
}

impl<M> TrainingListener<M> for () {}

/// Parameters shared by every update rule.
///
/// Deserialized values go through the same checks as the setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrainerParams")]
pub struct TrainerParams {
    num_epochs: usize,
    learning_rate: f64,
    schedule: LearnRateSchedule,
    partially_annotated: bool,
    average_weights: bool,
    shuffle_seed: Option<u64>,
}

impl Default for TrainerParams {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            learning_rate: 1.0,
            schedule: LearnRateSchedule::None,
            partially_annotated: false,
            average_weights: true,
            shuffle_seed: None,
        }
    }
}

impl TrainerParams {
    pub fn num_epochs(&self) -> usize {
        self.num_epochs
    }

    pub fn set_num_epochs(&mut self, num_epochs: usize) -> Result<()> {
        if num_epochs < 1 {
            return Err(Error::param("num_epochs must be at least 1"));
        }
        self.num_epochs = num_epochs;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::param("learning_rate must be positive"));
        }
        self.learning_rate = learning_rate;
        Ok(())
    }

    pub fn schedule(&self) -> LearnRateSchedule {
        self.schedule
    }

    pub fn set_schedule(&mut self, schedule: LearnRateSchedule) {
        self.schedule = schedule;
    }

    pub fn partially_annotated(&self) -> bool {
        self.partially_annotated
    }

    /// Fill unknown entries of the correct outputs by partial inference
    /// before every update.
    pub fn set_partially_annotated(&mut self, enabled: bool) {
        self.partially_annotated = enabled;
    }

    pub fn average_weights(&self) -> bool {
        self.average_weights
    }

    pub fn set_average_weights(&mut self, enabled: bool) {
        self.average_weights = enabled;
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    /// Shuffle the example order before every epoch with the given seed.
    /// `None` keeps the dataset order.
    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }
}

/// Unchecked form of [`TrainerParams`] as read from a config file
#[derive(Deserialize)]
#[serde(default)]
struct RawTrainerParams {
    num_epochs: usize,
    learning_rate: f64,
    schedule: LearnRateSchedule,
    partially_annotated: bool,
    average_weights: bool,
    shuffle_seed: Option<u64>,
}

impl Default for RawTrainerParams {
    fn default() -> Self {
        let params = TrainerParams::default();
        Self {
            num_epochs: params.num_epochs,
            learning_rate: params.learning_rate,
            schedule: params.schedule,
            partially_annotated: params.partially_annotated,
            average_weights: params.average_weights,
            shuffle_seed: params.shuffle_seed,
        }
    }
}

impl TryFrom<RawTrainerParams> for TrainerParams {
    type Error = Error;

    fn try_from(raw: RawTrainerParams) -> Result<Self> {
        let mut params = TrainerParams::default();
        params.set_num_epochs(raw.num_epochs)?;
        params.set_learning_rate(raw.learning_rate)?;
        params.set_schedule(raw.schedule);
        params.set_partially_annotated(raw.partially_annotated);
        params.set_average_weights(raw.average_weights);
        params.set_shuffle_seed(raw.shuffle_seed);
        Ok(params)
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::param(format!("invalid value for {}: {}", name, value)))
}

/// Online structured trainer.
///
/// Owns the model being trained, the task inference and the iteration
/// counter. The update rule `R` decides which structures each update
/// compares.
#[derive(Debug)]
pub struct Trainer<M, I, R>
where
    M: Model,
    I: Inference<M>,
    R: UpdateRule,
{
    /// Model being trained
    model: M,
    /// Task specific decoding
    inference: I,
    /// Training parameters
    params: TrainerParams,
    /// Update rule parameters
    rule_params: R::Params,
    /// Number of processed examples
    iteration: u64,
    rule: PhantomData<R>,
}

impl<M, I, R> Trainer<M, I, R>
where
    M: Model,
    I: Inference<M>,
    R: UpdateRule,
{
    /// Create a new trainer starting from `model`
    pub fn new(model: M, inference: I) -> Self {
        Self {
            model,
            inference,
            params: TrainerParams::default(),
            rule_params: R::Params::default(),
            iteration: 0,
            rule: PhantomData,
        }
    }

    /// Get training parameters
    pub fn params(&self) -> &TrainerParams {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut TrainerParams {
        &mut self.params
    }

    /// Get update rule parameters
    pub fn rule_params(&self) -> &R::Params {
        &self.rule_params
    }

    /// Get update rule parameters for mutation
    pub fn rule_params_mut(&mut self) -> &mut R::Params {
        &mut self.rule_params
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn inference(&self) -> &I {
        &self.inference
    }

    /// Number of examples processed so far
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Set the base learning rate
    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        self.params.set_learning_rate(learning_rate)
    }

    /// Learning rate the next example will be trained with
    pub fn learning_rate(&self) -> f64 {
        self.params
            .schedule()
            .rate(self.params.learning_rate(), self.iteration + 1)
    }

    /// Set number of epochs (builder pattern)
    pub fn with_num_epochs(mut self, num_epochs: usize) -> Result<Self> {
        self.params.set_num_epochs(num_epochs)?;
        Ok(self)
    }

    /// Set base learning rate (builder pattern)
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Result<Self> {
        self.params.set_learning_rate(learning_rate)?;
        Ok(self)
    }

    /// Set learning rate schedule (builder pattern)
    pub fn with_schedule(mut self, schedule: LearnRateSchedule) -> Self {
        self.params.set_schedule(schedule);
        self
    }

    /// Enable partially annotated examples (builder pattern)
    pub fn with_partially_annotated(mut self, enabled: bool) -> Self {
        self.params.set_partially_annotated(enabled);
        self
    }

    /// Enable weight averaging after the last epoch (builder pattern)
    pub fn with_averaging(mut self, enabled: bool) -> Self {
        self.params.set_average_weights(enabled);
        self
    }

    /// Set shuffle seed (builder pattern)
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.params.set_shuffle_seed(seed);
        self
    }

    /// Set a parameter by name
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "num_epochs" => self.params.set_num_epochs(parse_value(name, value)?),
            "learning_rate" => self.params.set_learning_rate(parse_value(name, value)?),
            "schedule" => {
                self.params.set_schedule(value.trim().parse()?);
                Ok(())
            }
            "partially_annotated" => {
                self.params.set_partially_annotated(parse_value(name, value)?);
                Ok(())
            }
            "average_weights" => {
                self.params.set_average_weights(parse_value(name, value)?);
                Ok(())
            }
            "shuffle_seed" => {
                let seed = match value.trim() {
                    "none" | "" => None,
                    v => Some(parse_value(name, v)?),
                };
                self.params.set_shuffle_seed(seed);
                Ok(())
            }
            _ => {
                if R::set_param(&mut self.rule_params, name, value)? {
                    Ok(())
                } else {
                    Err(Error::param(format!("unknown parameter: {}", name)))
                }
            }
        }
    }

    /// Get a parameter value by name
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "num_epochs" => self.params.num_epochs().to_string(),
            "learning_rate" => self.params.learning_rate().to_string(),
            "schedule" => self.params.schedule().to_string(),
            "partially_annotated" => self.params.partially_annotated().to_string(),
            "average_weights" => self.params.average_weights().to_string(),
            "shuffle_seed" => match self.params.shuffle_seed() {
                Some(seed) => seed.to_string(),
                None => "none".to_string(),
            },
            _ => R::get_param(&self.rule_params, name)
                .ok_or_else(|| Error::param(format!("unknown parameter: {}", name)))?,
        };
        Ok(value)
    }

    /// Train on a single example.
    ///
    /// `predicted` is a placeholder that receives the model prediction made
    /// before the update. Returns the loss reported by the model update.
    ///
    /// On an inference or data error no parameter has been changed. The
    /// iteration counter is only advanced on success.
    pub fn train_example(
        &mut self,
        input: &M::Input,
        correct: &M::Output,
        predicted: &mut M::Output,
    ) -> Result<f64> {
        let learning_rate = self.learning_rate();

        let reference = if self.params.partially_annotated() {
            let mut filled = correct.create_new();
            self.inference
                .partial_inference(&self.model, input, correct, &mut filled)?;
            Cow::Owned(filled)
        } else {
            Cow::Borrowed(correct)
        };

        let comparison = R::compare(
            &self.rule_params,
            &self.inference,
            &self.model,
            input,
            &*reference,
            predicted,
        )?;

        let loss = match &comparison {
            Comparison::ReferenceOverPredicted => {
                self.model
                    .update(input, &*reference, predicted, learning_rate)?
            }
            Comparison::PredictedOver(worse) => {
                self.model.update(input, predicted, worse, learning_rate)?
            }
            Comparison::OverPredicted(better) => {
                self.model.update(input, better, predicted, learning_rate)?
            }
        };
        if !(loss >= 0.0) {
            return Err(Error::invariant(format!(
                "model update returned loss {}",
                loss
            )));
        }

        self.model.sum_updates(self.iteration)?;
        self.iteration += 1;

        Ok(loss)
    }

    /// Train over the whole dataset for the configured number of epochs,
    /// then average the weights if enabled.
    pub fn train(&mut self, inputs: &[M::Input], outputs: &[M::Output]) -> Result<()> {
        self.train_with_listener(inputs, outputs, &mut ())
    }

    /// Same as [`train`](Self::train), reporting every epoch to `listener`.
    pub fn train_with_listener<L>(
        &mut self,
        inputs: &[M::Input],
        outputs: &[M::Output],
        listener: &mut L,
    ) -> Result<()>
    where
        L: TrainingListener<M>,
    {
        if inputs.len() != outputs.len() {
            return Err(Error::data(format!(
                "{} inputs but {} outputs",
                inputs.len(),
                outputs.len()
            )));
        }
        if inputs.is_empty() {
            return Err(Error::data("no training data"));
        }

        let num_epochs = self.params.num_epochs();
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut rng = self.params.shuffle_seed().map(StdRng::seed_from_u64);

        info!(
            "Training {} examples for {} epochs with {}...",
            inputs.len(),
            num_epochs,
            R::NAME
        );

        for epoch in 0..num_epochs {
            if !listener.before_epoch(epoch) {
                warn!("Training stopped before epoch {}", epoch + 1);
                break;
            }

            if let Some(rng) = rng.as_mut() {
                order.shuffle(rng);
            }

            let mut loss = 0.0;
            let mut num_mistakes = 0;
            for &idx in &order {
                let correct = &outputs[idx];
                let mut predicted = correct.create_new();
                let example_loss = self.train_example(&inputs[idx], correct, &mut predicted)?;
                if example_loss > 0.0 {
                    debug!("Example {}: loss = {}", idx, example_loss);
                    num_mistakes += 1;
                }
                loss += example_loss;
            }

            let stats = EpochStats {
                epoch,
                loss,
                num_examples: order.len(),
                num_mistakes,
            };
            info!(
                "Epoch {}: loss = {:.6}, mistakes = {}/{}, parameters = {}",
                epoch + 1,
                stats.loss,
                stats.num_mistakes,
                stats.num_examples,
                self.model.num_parameters()
            );

            if !listener.after_epoch(&self.model, &stats) {
                warn!("Training stopped after epoch {}", epoch + 1);
                break;
            }
        }

        if self.params.average_weights() && self.iteration > 0 {
            info!("Averaging weights over {} iterations", self.iteration);
            self.model.average(self.iteration)?;
        }

        info!("Training completed.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_params_defaults() {
        let params = TrainerParams::default();
        assert_eq!(params.num_epochs(), 10);
        assert_eq!(params.learning_rate(), 1.0);
        assert_eq!(params.schedule(), LearnRateSchedule::None);
        assert!(!params.partially_annotated());
        assert!(params.average_weights());
        assert_eq!(params.shuffle_seed(), None);
    }

    #[test]
    fn test_trainer_params_validation() {
        let mut params = TrainerParams::default();
        assert!(params.set_num_epochs(0).is_err());
        assert!(params.set_learning_rate(0.0).is_err());
        assert!(params.set_learning_rate(-1.0).is_err());
        assert!(params.set_learning_rate(f64::NAN).is_err());
        assert!(params.set_learning_rate(0.1).is_ok());
        assert_eq!(params.learning_rate(), 0.1);
    }

    #[test]
    fn test_trainer_params_serde() {
        let params: TrainerParams =
            serde_json::from_str(r#"{"num_epochs": 3, "schedule": "square_root"}"#).unwrap();
        assert_eq!(params.num_epochs(), 3);
        assert_eq!(params.schedule(), LearnRateSchedule::SquareRoot);
        // Missing fields fall back to the defaults
        assert_eq!(params.learning_rate(), 1.0);

        let json = serde_json::to_string(&params).unwrap();
        let back: TrainerParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_trainer_params_serde_validates() {
        let err = serde_json::from_str::<TrainerParams>(r#"{"learning_rate": -0.5}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("learning_rate must be positive"), "{}", err);

        let err = serde_json::from_str::<TrainerParams>(r#"{"num_epochs": 0}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("num_epochs must be at least 1"), "{}", err);
    }

    #[derive(Debug, Clone)]
    struct Slot;

    impl Structure for Slot {
        fn create_new(&self) -> Self {
            Slot
        }
    }

    /// Model whose update breaks the loss contract
    #[derive(Debug, Clone)]
    struct NegativeLoss {
        summed: u64,
    }

    impl Model for NegativeLoss {
        type Input = ();
        type Output = Slot;

        fn update(&mut self, _: &(), _: &Slot, _: &Slot, _: f64) -> Result<f64> {
            Ok(-1.0)
        }

        fn sum_updates(&mut self, _iteration: u64) -> Result<()> {
            self.summed += 1;
            Ok(())
        }

        fn average(&mut self, _num_iterations: u64) -> Result<()> {
            Ok(())
        }

        fn num_parameters(&self) -> usize {
            0
        }
    }

    struct Noop;

    impl Inference<NegativeLoss> for Noop {
        fn inference(&self, _: &NegativeLoss, _: &(), _: &mut Slot) -> Result<()> {
            Ok(())
        }

        fn loss_augmented_inference(
            &self,
            _: &NegativeLoss,
            _: &(),
            _: &Slot,
            _: &mut Slot,
            _: f64,
        ) -> Result<()> {
            Ok(())
        }

        fn partial_inference(&self, _: &NegativeLoss, _: &(), _: &Slot, _: &mut Slot) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_negative_loss_is_rejected() {
        let mut trainer = Trainer::perceptron(NegativeLoss { summed: 0 }, Noop);
        let result = trainer.train_example(&(), &Slot, &mut Slot);
        assert!(matches!(result, Err(Error::Invariant(_))));
        assert_eq!(trainer.iteration(), 0);
        assert_eq!(trainer.model().summed, 0);
    }
}

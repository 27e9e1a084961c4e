//! Linear-chain sequence labeling.
//!
//! Every token carries a list of basic attribute codes. The model scores a
//! label sequence with emission features, one per `(attribute, label)` pair,
//! and transition features, one per `(previous label, label)` pair where the
//! first token transits from a dedicated start state.

use std::cell::{RefCell, RefMut};

use crate::context::{Context, Reset};
use crate::error::{Error, Result};
use crate::inference::Inference;
use crate::model::{Model, SparseModel, Structure};

/// A token sequence
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceInput {
    /// Attribute codes of every token
    tokens: Vec<Vec<u32>>,
}

impl SequenceInput {
    pub fn new(tokens: Vec<Vec<u32>>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Attribute codes of token `t`
    pub fn attributes(&self, t: usize) -> &[u32] {
        &self.tokens[t]
    }
}

/// A label sequence. `None` marks a label that is not annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceOutput {
    labels: Vec<Option<u32>>,
}

impl SequenceOutput {
    /// A fully annotated sequence
    pub fn new(labels: Vec<u32>) -> Self {
        Self {
            labels: labels.into_iter().map(Some).collect(),
        }
    }

    /// A partially annotated sequence
    pub fn partial(labels: Vec<Option<u32>>) -> Self {
        Self { labels }
    }

    /// A sequence of `len` unknown labels
    pub fn unknown(len: usize) -> Self {
        Self {
            labels: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, t: usize) -> Option<u32> {
        self.labels[t]
    }

    pub fn set_label(&mut self, t: usize, label: Option<u32>) {
        self.labels[t] = label;
    }

    pub fn labels(&self) -> &[Option<u32>] {
        &self.labels
    }

    /// Returns `true` if every label is known
    pub fn is_complete(&self) -> bool {
        self.labels.iter().all(Option::is_some)
    }
}

impl Structure for SequenceOutput {
    fn create_new(&self) -> Self {
        Self::unknown(self.len())
    }
}

impl From<Vec<u32>> for SequenceOutput {
    fn from(labels: Vec<u32>) -> Self {
        Self::new(labels)
    }
}

/// Emission and transition weights of a sequence labeler.
#[derive(Debug, Clone)]
pub struct SequenceModel {
    num_labels: u32,
    /// Emission weights per label, keyed by attribute code
    emission: Vec<SparseModel>,
    /// Transition weights per source label, keyed by target label. The last
    /// entry holds the transitions out of the start state.
    transition: Vec<SparseModel>,
}

impl SequenceModel {
    pub fn new(num_labels: u32) -> Self {
        let labels = num_labels as usize;
        Self {
            num_labels,
            emission: (0..labels).map(|_| SparseModel::new()).collect(),
            transition: (0..=labels).map(|_| SparseModel::new()).collect(),
        }
    }

    /// Rebuild a model from per-label emission weights and per-source
    /// transition weights, e.g. when loading a saved model.
    ///
    /// `transition` needs one entry per label followed by the start state.
    pub fn from_parts(emission: Vec<SparseModel>, transition: Vec<SparseModel>) -> Result<Self> {
        if transition.len() != emission.len() + 1 {
            return Err(Error::data(format!(
                "{} transition sources for {} labels",
                transition.len(),
                emission.len()
            )));
        }
        let num_labels = u32::try_from(emission.len())
            .map_err(|_| Error::data(format!("too many labels: {}", emission.len())))?;
        Ok(Self {
            num_labels,
            emission,
            transition,
        })
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    /// Emission weights of `label`
    pub fn emission(&self, label: u32) -> &SparseModel {
        &self.emission[label as usize]
    }

    /// Transition weights out of `from`, keyed by target label; `None` is
    /// the start state.
    pub fn transition(&self, from: Option<u32>) -> &SparseModel {
        &self.transition[Self::source(self.num_labels, from)]
    }

    pub fn num_transition_parameters(&self) -> usize {
        self.transition.iter().map(SparseModel::num_parameters).sum()
    }

    /// Returns `true` once the weights have been averaged
    pub fn is_averaged(&self) -> bool {
        self.transition.iter().all(SparseModel::is_averaged)
    }

    fn source(num_labels: u32, from: Option<u32>) -> usize {
        from.unwrap_or(num_labels) as usize
    }

    pub fn emission_score(&self, input: &SequenceInput, t: usize, label: u32) -> f64 {
        self.emission[label as usize].score(input.attributes(t))
    }

    pub fn transition_score(&self, from: Option<u32>, to: u32) -> f64 {
        self.transition(from).weight(to)
    }

    /// Total score of a fully labeled sequence
    pub fn sequence_score(&self, input: &SequenceInput, labels: &[u32]) -> f64 {
        let mut prev = None;
        let mut score = 0.0;
        for (t, &label) in labels.iter().enumerate() {
            score += self.transition_score(prev, label) + self.emission_score(input, t, label);
            prev = Some(label);
        }
        score
    }

    fn check_labels(&self, output: &SequenceOutput) -> Result<()> {
        match output
            .labels()
            .iter()
            .flatten()
            .find(|&&label| label >= self.num_labels)
        {
            Some(label) => Err(Error::data(format!(
                "label {} out of range for {} labels",
                label, self.num_labels
            ))),
            None => Ok(()),
        }
    }

    /// Source of the transition into token `t`: `Some(None)` for the start
    /// state, `None` when the previous label is unknown.
    fn previous(output: &SequenceOutput, t: usize) -> Option<Option<u32>> {
        if t == 0 {
            Some(None)
        } else {
            output.label(t - 1).map(Some)
        }
    }
}

impl Model for SequenceModel {
    type Input = SequenceInput;
    type Output = SequenceOutput;

    /// Updates emission features at mislabeled tokens and transition
    /// features on edges whose label pair differs. Unknown correct labels
    /// are skipped. The loss is the number of mislabeled tokens.
    fn update(
        &mut self,
        input: &SequenceInput,
        correct: &SequenceOutput,
        predicted: &SequenceOutput,
        learning_rate: f64,
    ) -> Result<f64> {
        if correct.len() != input.len() || predicted.len() != input.len() {
            return Err(Error::data(format!(
                "sequence of {} tokens with {} correct and {} predicted labels",
                input.len(),
                correct.len(),
                predicted.len()
            )));
        }
        self.check_labels(correct)?;
        self.check_labels(predicted)?;

        let mut loss = 0.0;
        for t in 0..input.len() {
            let correct_label = match correct.label(t) {
                Some(label) => label,
                None => continue,
            };
            let predicted_label = predicted.label(t);

            if predicted_label != Some(correct_label) {
                loss += 1.0;
                let attrs = input.attributes(t);
                self.emission[correct_label as usize].update_features(attrs, learning_rate)?;
                if let Some(label) = predicted_label {
                    self.emission[label as usize].update_features(attrs, -learning_rate)?;
                }
            }

            let correct_prev = match Self::previous(correct, t) {
                Some(prev) => prev,
                None => continue,
            };
            let predicted_prev = Self::previous(predicted, t);
            if predicted_prev == Some(correct_prev) && predicted_label == Some(correct_label) {
                continue;
            }
            let source = Self::source(self.num_labels, correct_prev);
            self.transition[source].update_feature(correct_label, learning_rate)?;
            if let (Some(prev), Some(label)) = (predicted_prev, predicted_label) {
                let source = Self::source(self.num_labels, prev);
                self.transition[source].update_feature(label, -learning_rate)?;
            }
        }

        Ok(loss)
    }

    fn sum_updates(&mut self, iteration: u64) -> Result<()> {
        for params in self.emission.iter_mut().chain(self.transition.iter_mut()) {
            params.sum_updates(iteration)?;
        }
        Ok(())
    }

    fn average(&mut self, num_iterations: u64) -> Result<()> {
        for params in self.emission.iter_mut().chain(self.transition.iter_mut()) {
            params.average(num_iterations)?;
        }
        Ok(())
    }

    fn num_parameters(&self) -> usize {
        self.emission
            .iter()
            .map(SparseModel::num_parameters)
            .sum::<usize>()
            + self.num_transition_parameters()
    }
}

/// Viterbi decoding for [`SequenceModel`].
///
/// Loss-augmented search uses the Hamming loss over the annotated tokens of
/// the reference. Ties are broken toward the lowest label index.
///
/// The lattice buffers are kept between calls and only grow, so one decoder
/// should be reused for a whole training run.
#[derive(Debug, Clone)]
pub struct Viterbi {
    ctx: RefCell<Context>,
}

impl Default for Viterbi {
    fn default() -> Self {
        Self::new()
    }
}

impl Viterbi {
    pub fn new() -> Self {
        Self {
            ctx: RefCell::new(Context::new(0, 0)),
        }
    }

    /// Number of tokens the lattice buffers can hold without reallocating
    pub fn capacity(&self) -> u32 {
        self.ctx.borrow().capacity()
    }

    /// Fill the lattice with the scores of `model` on `input`.
    fn lattice(&self, model: &SequenceModel, input: &SequenceInput) -> RefMut<'_, Context> {
        let l = model.num_labels();
        let mut ctx = self.ctx.borrow_mut();
        if ctx.num_labels != l {
            *ctx = Context::new(l, input.len() as u32);
        } else {
            ctx.set_num_items(input.len() as u32);
        }
        ctx.reset(Reset::ALL);

        for t in 0..input.len() {
            for label in 0..l {
                ctx.state[[t, label as usize]] += model.emission_score(input, t, label);
            }
        }
        for from in 0..=l {
            let prev = if from == l { None } else { Some(from) };
            for (to, weight) in model.transition(prev).parameters() {
                if to < l {
                    ctx.trans[[from as usize, to as usize]] += weight;
                }
            }
        }
        ctx
    }

    fn check_shape(input: &SequenceInput, output: &SequenceOutput, what: &str) -> Result<()> {
        if output.len() != input.len() {
            return Err(Error::inference(format!(
                "{} has {} labels for {} tokens",
                what,
                output.len(),
                input.len()
            )));
        }
        Ok(())
    }

    fn decode(ctx: &mut Context, output: &mut SequenceOutput) -> Result<()> {
        let (labels, score) = ctx.viterbi();
        if !labels.is_empty() && score == f64::NEG_INFINITY {
            return Err(Error::inference("no feasible label sequence"));
        }
        for (t, label) in labels.into_iter().enumerate() {
            output.set_label(t, Some(label));
        }
        Ok(())
    }
}

impl Inference<SequenceModel> for Viterbi {
    fn inference(
        &self,
        model: &SequenceModel,
        input: &SequenceInput,
        output: &mut SequenceOutput,
    ) -> Result<()> {
        Self::check_shape(input, output, "output")?;
        let mut ctx = self.lattice(model, input);
        Self::decode(&mut *ctx, output)
    }

    fn loss_augmented_inference(
        &self,
        model: &SequenceModel,
        input: &SequenceInput,
        reference: &SequenceOutput,
        output: &mut SequenceOutput,
        loss_weight: f64,
    ) -> Result<()> {
        Self::check_shape(input, reference, "reference")?;
        Self::check_shape(input, output, "output")?;
        let mut ctx = self.lattice(model, input);
        for t in 0..input.len() {
            if let Some(reference_label) = reference.label(t) {
                for label in 0..model.num_labels() {
                    if label != reference_label {
                        ctx.state[[t, label as usize]] += loss_weight;
                    }
                }
            }
        }
        Self::decode(&mut *ctx, output)
    }

    fn partial_inference(
        &self,
        model: &SequenceModel,
        input: &SequenceInput,
        partial: &SequenceOutput,
        output: &mut SequenceOutput,
    ) -> Result<()> {
        Self::check_shape(input, partial, "partial output")?;
        Self::check_shape(input, output, "output")?;
        let mut ctx = self.lattice(model, input);
        for t in 0..input.len() {
            if let Some(fixed) = partial.label(t) {
                if fixed >= model.num_labels() {
                    return Err(Error::inference(format!(
                        "fixed label {} out of range for {} labels",
                        fixed,
                        model.num_labels()
                    )));
                }
                for label in 0..model.num_labels() {
                    if label != fixed {
                        ctx.state[[t, label as usize]] = f64::NEG_INFINITY;
                    }
                }
            }
        }
        Self::decode(&mut *ctx, output)
    }
}

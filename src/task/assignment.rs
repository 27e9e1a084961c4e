//! Independent multiple-choice decisions.
//!
//! An input is a list of decision points. Each point offers a list of
//! candidates and every candidate carries the feature codes that fire when
//! it is chosen, e.g. a quotation choosing its speaker among the mentions
//! around it. Points do not interact, so inference is a per-point argmax.

use crate::error::{Error, Result};
use crate::inference::Inference;
use crate::model::{Model, SparseModel, Structure};

/// Decision points with their candidate features
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentInput {
    /// `points[i][c]` holds the feature codes of candidate `c` at point `i`
    points: Vec<Vec<Vec<u32>>>,
}

impl AssignmentInput {
    pub fn new(points: Vec<Vec<Vec<u32>>>) -> Self {
        Self { points }
    }

    /// Number of decision points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_candidates(&self, point: usize) -> usize {
        self.points[point].len()
    }

    pub fn features(&self, point: usize, candidate: usize) -> &[u32] {
        &self.points[point][candidate]
    }
}

/// Chosen candidate of every point, `None` when unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentOutput {
    choices: Vec<Option<usize>>,
}

impl AssignmentOutput {
    pub fn new(choices: Vec<usize>) -> Self {
        Self {
            choices: choices.into_iter().map(Some).collect(),
        }
    }

    pub fn partial(choices: Vec<Option<usize>>) -> Self {
        Self { choices }
    }

    pub fn unknown(len: usize) -> Self {
        Self {
            choices: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn choice(&self, point: usize) -> Option<usize> {
        self.choices[point]
    }

    pub fn set_choice(&mut self, point: usize, choice: Option<usize>) {
        self.choices[point] = choice;
    }

    pub fn choices(&self) -> &[Option<usize>] {
        &self.choices
    }
}

impl Structure for AssignmentOutput {
    fn create_new(&self) -> Self {
        Self::unknown(self.len())
    }
}

/// One weight per feature code, shared by all candidates.
#[derive(Debug, Clone, Default)]
pub struct AssignmentModel {
    params: SparseModel,
}

impl AssignmentModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parameters(params: SparseModel) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SparseModel {
        &self.params
    }

    /// Score of choosing `candidate` at `point`
    pub fn score(&self, input: &AssignmentInput, point: usize, candidate: usize) -> f64 {
        self.params.score(input.features(point, candidate))
    }

    fn check(&self, input: &AssignmentInput, output: &AssignmentOutput) -> Result<()> {
        if output.len() != input.len() {
            return Err(Error::data(format!(
                "{} choices for {} decision points",
                output.len(),
                input.len()
            )));
        }
        for (point, choice) in output.choices().iter().enumerate() {
            if let Some(c) = *choice {
                if c >= input.num_candidates(point) {
                    return Err(Error::data(format!(
                        "choice {} out of range at point {} with {} candidates",
                        c,
                        point,
                        input.num_candidates(point)
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Model for AssignmentModel {
    type Input = AssignmentInput;
    type Output = AssignmentOutput;

    /// The loss is the number of points whose known correct choice differs
    /// from the predicted one.
    fn update(
        &mut self,
        input: &AssignmentInput,
        correct: &AssignmentOutput,
        predicted: &AssignmentOutput,
        learning_rate: f64,
    ) -> Result<f64> {
        self.check(input, correct)?;
        self.check(input, predicted)?;

        let mut loss = 0.0;
        for point in 0..input.len() {
            let correct_choice = match correct.choice(point) {
                Some(c) => c,
                None => continue,
            };
            let predicted_choice = predicted.choice(point);
            if predicted_choice == Some(correct_choice) {
                continue;
            }
            loss += 1.0;
            self.params
                .update_features(input.features(point, correct_choice), learning_rate)?;
            if let Some(c) = predicted_choice {
                self.params
                    .update_features(input.features(point, c), -learning_rate)?;
            }
        }
        Ok(loss)
    }

    fn sum_updates(&mut self, iteration: u64) -> Result<()> {
        self.params.sum_updates(iteration)
    }

    fn average(&mut self, num_iterations: u64) -> Result<()> {
        self.params.average(num_iterations)
    }

    fn num_parameters(&self) -> usize {
        self.params.num_parameters()
    }
}

/// Per-point argmax for [`AssignmentModel`]. Ties go to the lowest
/// candidate index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argmax;

impl Argmax {
    fn decide<F>(input: &AssignmentInput, output: &mut AssignmentOutput, score: F) -> Result<()>
    where
        F: Fn(usize, usize) -> f64,
    {
        if output.len() != input.len() {
            return Err(Error::inference(format!(
                "output has {} choices for {} decision points",
                output.len(),
                input.len()
            )));
        }
        for point in 0..input.len() {
            let mut best = None;
            let mut best_score = f64::NEG_INFINITY;
            for candidate in 0..input.num_candidates(point) {
                let s = score(point, candidate);
                if best.is_none() || s > best_score {
                    best = Some(candidate);
                    best_score = s;
                }
            }
            match best {
                Some(c) => output.set_choice(point, Some(c)),
                None => {
                    return Err(Error::inference(format!(
                        "decision point {} has no candidates",
                        point
                    )))
                }
            }
        }
        Ok(())
    }
}

impl Inference<AssignmentModel> for Argmax {
    fn inference(
        &self,
        model: &AssignmentModel,
        input: &AssignmentInput,
        output: &mut AssignmentOutput,
    ) -> Result<()> {
        Self::decide(input, output, |point, c| model.score(input, point, c))
    }

    fn loss_augmented_inference(
        &self,
        model: &AssignmentModel,
        input: &AssignmentInput,
        reference: &AssignmentOutput,
        output: &mut AssignmentOutput,
        loss_weight: f64,
    ) -> Result<()> {
        if reference.len() != input.len() {
            return Err(Error::inference(format!(
                "reference has {} choices for {} decision points",
                reference.len(),
                input.len()
            )));
        }
        Self::decide(input, output, |point, c| {
            let score = model.score(input, point, c);
            match reference.choice(point) {
                Some(r) if r != c => score + loss_weight,
                _ => score,
            }
        })
    }

    fn partial_inference(
        &self,
        model: &AssignmentModel,
        input: &AssignmentInput,
        partial: &AssignmentOutput,
        output: &mut AssignmentOutput,
    ) -> Result<()> {
        if partial.len() != input.len() {
            return Err(Error::inference(format!(
                "partial output has {} choices for {} decision points",
                partial.len(),
                input.len()
            )));
        }
        for (point, choice) in partial.choices().iter().enumerate() {
            if let Some(c) = *choice {
                if c >= input.num_candidates(point) {
                    return Err(Error::inference(format!(
                        "fixed choice {} out of range at point {}",
                        c, point
                    )));
                }
            }
        }
        Self::decide(input, output, |point, c| match partial.choice(point) {
            Some(fixed) if fixed != c => f64::NEG_INFINITY,
            _ => model.score(input, point, c),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_points() -> AssignmentInput {
        AssignmentInput::new(vec![
            vec![vec![0], vec![1, 2]],
            vec![vec![2], vec![0], vec![3]],
        ])
    }

    #[test]
    fn test_argmax_lowest_index_on_ties() {
        let model = AssignmentModel::new();
        let input = two_points();
        let mut output = AssignmentOutput::unknown(2);
        Argmax.inference(&model, &input, &mut output).unwrap();
        assert_eq!(output, AssignmentOutput::new(vec![0, 0]));
    }

    #[test]
    fn test_update_and_decode() {
        let mut model = AssignmentModel::new();
        let input = two_points();
        let correct = AssignmentOutput::new(vec![1, 2]);
        let predicted = AssignmentOutput::new(vec![0, 2]);
        let loss = model.update(&input, &correct, &predicted, 1.0).unwrap();
        assert_eq!(loss, 1.0);
        assert_eq!(model.params().weight(1), 1.0);
        assert_eq!(model.params().weight(2), 1.0);
        assert_eq!(model.params().weight(0), -1.0);
        assert_eq!(model.params().weight(3), 0.0);

        let mut output = correct.create_new();
        Argmax.inference(&model, &input, &mut output).unwrap();
        // Point 1 now prefers candidate 0 (feature 2)
        assert_eq!(output, AssignmentOutput::new(vec![1, 0]));
    }

    #[test]
    fn test_update_rejects_out_of_range_choice() {
        let mut model = AssignmentModel::new();
        let input = two_points();
        let correct = AssignmentOutput::new(vec![2, 0]);
        let predicted = AssignmentOutput::new(vec![0, 0]);
        assert!(matches!(
            model.update(&input, &correct, &predicted, 1.0),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(model.num_parameters(), 0);
    }

    #[test]
    fn test_no_candidates_fails() {
        let model = AssignmentModel::new();
        let input = AssignmentInput::new(vec![vec![vec![0]], vec![]]);
        let mut output = AssignmentOutput::unknown(2);
        assert!(matches!(
            Argmax.inference(&model, &input, &mut output),
            Err(Error::Inference(_))
        ));
    }

    #[test]
    fn test_loss_augmented_and_partial() {
        let model = AssignmentModel::new();
        let input = two_points();
        let reference = AssignmentOutput::new(vec![0, 1]);

        let mut worse = reference.create_new();
        Argmax
            .loss_augmented_inference(&model, &input, &reference, &mut worse, 1.0)
            .unwrap();
        assert_eq!(worse, AssignmentOutput::new(vec![1, 0]));

        let mut better = reference.create_new();
        Argmax
            .loss_augmented_inference(&model, &input, &reference, &mut better, -1.0)
            .unwrap();
        assert_eq!(better, reference);

        let partial = AssignmentOutput::partial(vec![None, Some(2)]);
        let mut filled = partial.create_new();
        Argmax
            .partial_inference(&model, &input, &partial, &mut filled)
            .unwrap();
        assert_eq!(filled, AssignmentOutput::new(vec![0, 2]));

        let partial = AssignmentOutput::partial(vec![Some(5), None]);
        assert!(Argmax
            .partial_inference(&model, &input, &partial, &mut filled)
            .is_err());
    }
}

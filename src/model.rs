use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::parameter::AveragedParameter;

/// An output structure (label sequence, tree, assignment).
pub trait Structure: Clone {
    /// A structure of the same shape with every entry unknown, used as a
    /// placeholder for inference results.
    fn create_new(&self) -> Self;
}

/// A linear model over sparse features, trained online.
///
/// Implementations are bound to one task through the associated input and
/// output types.
pub trait Model: Clone {
    type Input;
    type Output: Structure;

    /// Move the weights toward `correct` and away from `predicted` by
    /// `learning_rate` at every decision point where the two differ.
    ///
    /// Returns the (non-negative) loss of `predicted` against `correct`.
    fn update(
        &mut self,
        input: &Self::Input,
        correct: &Self::Output,
        predicted: &Self::Output,
        learning_rate: f64,
    ) -> Result<f64>;

    /// Fold the parameters touched since the previous call into their
    /// running averages. Called once per processed example.
    fn sum_updates(&mut self, iteration: u64) -> Result<()>;

    /// Replace every weight by its average over `num_iterations`.
    fn average(&mut self, num_iterations: u64) -> Result<()>;

    /// Number of parameters the model holds
    fn num_parameters(&self) -> usize;
}

/// Sparse parameter store keyed by feature code.
///
/// Parameters are created on their first update; reading an unknown code
/// yields a zero weight. Codes updated since the last
/// [`sum_updates`](Self::sum_updates) are tracked so that only they are
/// folded into their averages.
#[derive(Debug, Default)]
pub struct SparseModel {
    parameters: HashMap<u32, AveragedParameter>,
    touched: HashSet<u32>,
    averaged: bool,
}

impl SparseModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a model from (code, weight) pairs, e.g. when loading a saved
    /// model.
    pub fn from_parameters<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        Self {
            parameters: weights
                .into_iter()
                .map(|(code, weight)| (code, AveragedParameter::new(weight)))
                .collect(),
            touched: HashSet::new(),
            averaged: false,
        }
    }

    /// Weight of `code`, zero when the parameter does not exist.
    #[inline]
    pub fn weight(&self, code: u32) -> f64 {
        self.parameters.get(&code).map_or(0.0, AveragedParameter::get)
    }

    /// Sum of the weights of `codes`.
    pub fn score(&self, codes: &[u32]) -> f64 {
        codes.iter().map(|&code| self.weight(code)).sum()
    }

    pub fn parameter(&self, code: u32) -> Option<&AveragedParameter> {
        self.parameters.get(&code)
    }

    /// Iterate over (code, weight) pairs, in no particular order.
    pub fn parameters(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.parameters.iter().map(|(&code, param)| (code, param.get()))
    }

    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Number of parameters updated since the last `sum_updates`
    pub fn num_touched(&self) -> usize {
        self.touched.len()
    }

    pub fn is_averaged(&self) -> bool {
        self.averaged
    }

    /// Add `delta` to the weight of `code`, creating the parameter if needed.
    pub fn update_feature(&mut self, code: u32, delta: f64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("update after average"));
        }
        self.parameters.entry(code).or_default().update(delta)?;
        self.touched.insert(code);
        Ok(())
    }

    /// Apply `delta` to every code in `codes`.
    pub fn update_features(&mut self, codes: &[u32], delta: f64) -> Result<()> {
        for &code in codes {
            self.update_feature(code, delta)?;
        }
        Ok(())
    }

    /// Fold the touched parameters into their running averages at
    /// `iteration` and forget them.
    pub fn sum_updates(&mut self, iteration: u64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("sum after average"));
        }
        for code in self.touched.drain() {
            if let Some(param) = self.parameters.get_mut(&code) {
                param.sum(iteration)?;
            }
        }
        Ok(())
    }

    /// Average every parameter over `num_iterations`. Can only be done once.
    pub fn average(&mut self, num_iterations: u64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("model averaged twice"));
        }
        for param in self.parameters.values_mut() {
            param.average(num_iterations)?;
        }
        self.touched.clear();
        self.averaged = true;
        Ok(())
    }

    /// Add the weights of `other`, scaled by `weight`, to the running sums of
    /// this model.
    pub fn sum_model(&mut self, other: &SparseModel, weight: f64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("sum_model into an averaged model"));
        }
        for (code, value) in other.parameters() {
            self.parameters
                .entry(code)
                .or_default()
                .increment(value * weight);
        }
        Ok(())
    }

    /// Weighted sum of independently trained models.
    pub fn merge(models: &[(&SparseModel, f64)]) -> Result<SparseModel> {
        let mut merged = SparseModel::new();
        for &(model, weight) in models {
            merged.sum_model(model, weight)?;
        }
        merged.average(1)?;
        Ok(merged)
    }
}

impl Clone for SparseModel {
    /// Deep copy of every parameter. The set of touched parameters is not
    /// copied.
    fn clone(&self) -> Self {
        Self {
            parameters: self
                .parameters
                .iter()
                .map(|(&code, param)| (code, param.clone()))
                .collect(),
            touched: HashSet::new(),
            averaged: self.averaged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_ignores_unknown_codes() {
        let mut model = SparseModel::new();
        model.update_feature(1, 0.5).unwrap();
        model.update_feature(2, -1.0).unwrap();
        assert_eq!(model.score(&[1, 2, 99]), -0.5);
        // Reading does not create parameters
        assert_eq!(model.num_parameters(), 2);
        assert_eq!(model.weight(99), 0.0);
    }

    #[test]
    fn test_touched_set_cleared_by_sum_updates() {
        let mut model = SparseModel::new();
        model.update_features(&[1, 2, 2], 1.0).unwrap();
        assert_eq!(model.num_touched(), 2);
        model.sum_updates(0).unwrap();
        assert_eq!(model.num_touched(), 0);
        assert_eq!(model.parameter(2).unwrap().last_update_iteration(), 1);
    }

    #[test]
    fn test_average_covers_untouched_parameters() {
        let mut model = SparseModel::new();
        model.update_feature(7, 1.0).unwrap();
        model.sum_updates(0).unwrap();
        // Nothing touched at iterations 1..10
        for iteration in 1..10 {
            model.sum_updates(iteration).unwrap();
        }
        model.average(10).unwrap();
        assert!((model.weight(7) - 0.9).abs() < 1e-12);
        assert!(model.is_averaged());
    }

    #[test]
    fn test_terminal_after_average() {
        let mut model = SparseModel::new();
        model.update_feature(1, 1.0).unwrap();
        model.sum_updates(0).unwrap();
        model.average(1).unwrap();
        assert!(matches!(
            model.update_feature(1, 1.0),
            Err(Error::Invariant(_))
        ));
        assert!(model.sum_updates(1).is_err());
        assert!(model.average(1).is_err());
    }

    #[test]
    fn test_clone_is_deep() {
        let mut model = SparseModel::new();
        model.update_feature(3, 2.0).unwrap();
        let mut copy = model.clone();
        assert_eq!(copy.num_touched(), 0);
        copy.update_feature(3, 1.0).unwrap();
        assert_eq!(model.weight(3), 2.0);
        assert_eq!(copy.weight(3), 3.0);
    }

    #[test]
    fn test_from_parameters_roundtrip() {
        let model = SparseModel::from_parameters(vec![(0, 0.5), (4, -1.5)]);
        let mut weights: Vec<_> = model.parameters().collect();
        weights.sort_by_key(|&(code, _)| code);
        assert_eq!(weights, vec![(0, 0.5), (4, -1.5)]);
    }

    #[test]
    fn test_merge_weighted() {
        let a = SparseModel::from_parameters(vec![(0, 1.0), (1, 2.0)]);
        let b = SparseModel::from_parameters(vec![(1, 4.0), (2, -2.0)]);
        let merged = SparseModel::merge(&[(&a, 0.5), (&b, 0.5)]).unwrap();
        assert_eq!(merged.weight(0), 0.5);
        assert_eq!(merged.weight(1), 3.0);
        assert_eq!(merged.weight(2), -1.0);
        assert!(merged.is_averaged());
    }
}

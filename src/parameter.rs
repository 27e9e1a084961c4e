use crate::error::{Error, Result};

/// A model weight with lazily maintained running-average bookkeeping.
///
/// Training calls [`update`](Self::update) while processing an example and
/// [`sum`](Self::sum) once the example is done. A parameter that is not
/// touched keeps contributing its weight to the average implicitly; the
/// contribution is folded into `accumulated` the next time the parameter is
/// summed or when it is finally [`average`](Self::average)d.
///
/// The averaged weight is the mean of the weights in effect at the start of
/// every processed example. An update made while processing the example with
/// iteration index `t` is in effect from iteration `t + 1` on.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragedParameter {
    /// Live weight
    current: f64,
    /// Sum of the weights in effect at iterations `0..last_update_iteration`
    accumulated: f64,
    /// Weight in effect since `last_update_iteration`, not folded yet
    in_effect: f64,
    /// First iteration whose weight is not folded into `accumulated`
    last_update_iteration: u64,
    /// Set once the weight has been replaced by its average
    averaged: bool,
}

impl AveragedParameter {
    /// Create a parameter with the given initial weight.
    pub fn new(weight: f64) -> Self {
        Self {
            current: weight,
            accumulated: 0.0,
            in_effect: weight,
            last_update_iteration: 0,
            averaged: false,
        }
    }

    /// Current weight.
    #[inline]
    pub fn get(&self) -> f64 {
        self.current
    }

    /// Running sum of the folded weights.
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    /// First iteration not yet folded into the running sum.
    pub fn last_update_iteration(&self) -> u64 {
        self.last_update_iteration
    }

    /// Returns `true` once [`average`](Self::average) has been called.
    pub fn is_averaged(&self) -> bool {
        self.averaged
    }

    /// Add `delta` to the live weight.
    ///
    /// The running sum is untouched; the caller must eventually call
    /// [`sum`](Self::sum) with the iteration the update belongs to.
    pub fn update(&mut self, delta: f64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("update after average"));
        }
        self.current += delta;
        Ok(())
    }

    /// Fold the weights in effect up to and including `iteration` into the
    /// running sum, then put the live weight in effect from `iteration + 1`.
    ///
    /// Calls must use non-decreasing iterations.
    pub fn sum(&mut self, iteration: u64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("sum after average"));
        }
        let next = iteration + 1;
        if next < self.last_update_iteration {
            return Err(Error::invariant(format!(
                "sum at iteration {} after iteration {}",
                iteration,
                self.last_update_iteration - 1
            )));
        }
        self.accumulated += self.in_effect * (next - self.last_update_iteration) as f64;
        self.last_update_iteration = next;
        self.in_effect = self.current;
        Ok(())
    }

    /// Replace the live weight by its average over `num_iterations`
    /// iterations. The parameter is terminal afterwards.
    pub fn average(&mut self, num_iterations: u64) -> Result<()> {
        if self.averaged {
            return Err(Error::invariant("parameter averaged twice"));
        }
        if num_iterations == 0 {
            return Err(Error::invariant("cannot average over zero iterations"));
        }
        if num_iterations < self.last_update_iteration {
            return Err(Error::invariant(format!(
                "average over {} iterations but parameter was summed up to iteration {}",
                num_iterations,
                self.last_update_iteration - 1
            )));
        }
        self.accumulated +=
            self.in_effect * (num_iterations - self.last_update_iteration) as f64;
        self.last_update_iteration = num_iterations;
        self.current = self.accumulated / num_iterations as f64;
        self.in_effect = self.current;
        self.averaged = true;
        Ok(())
    }

    /// Add `delta` straight to the running sum. Only used when merging
    /// finished models.
    pub fn increment(&mut self, delta: f64) {
        self.accumulated += delta;
    }
}

impl Default for AveragedParameter {
    fn default() -> Self {
        Self::new(0.0)
    }
}

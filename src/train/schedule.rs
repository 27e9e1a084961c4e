use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How the learning rate decays with the number of processed examples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnRateSchedule {
    /// Constant learning rate
    #[default]
    None,
    /// `rate / t`
    Linear,
    /// `rate / t²`
    Quadratic,
    /// `rate / sqrt(t)`
    SquareRoot,
}

impl LearnRateSchedule {
    /// Learning rate for the `t`-th example (1-based).
    pub fn rate(self, base: f64, t: u64) -> f64 {
        let t = t.max(1) as f64;
        match self {
            LearnRateSchedule::None => base,
            LearnRateSchedule::Linear => base / t,
            LearnRateSchedule::Quadratic => base / (t * t),
            LearnRateSchedule::SquareRoot => base / t.sqrt(),
        }
    }
}

impl fmt::Display for LearnRateSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LearnRateSchedule::None => "none",
            LearnRateSchedule::Linear => "linear",
            LearnRateSchedule::Quadratic => "quadratic",
            LearnRateSchedule::SquareRoot => "square_root",
        };
        f.write_str(name)
    }
}

impl FromStr for LearnRateSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LearnRateSchedule::None),
            "linear" => Ok(LearnRateSchedule::Linear),
            "quadratic" => Ok(LearnRateSchedule::Quadratic),
            "square_root" | "sqrt" => Ok(LearnRateSchedule::SquareRoot),
            _ => Err(Error::param(format!("invalid value for schedule: {}", s))),
        }
    }
}

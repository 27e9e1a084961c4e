use thiserror::Error;

/// Errors produced while configuring or running a training run.
#[derive(Debug, Error)]
pub enum Error {
    /// A parameter value was rejected.
    #[error("{0}")]
    InvalidParam(String),

    /// Averaging bookkeeping was driven out of order.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// The inference algorithm could not produce an output structure.
    #[error("inference failed: {0}")]
    Inference(String),

    /// A training example is malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    pub(crate) fn param<S: Into<String>>(msg: S) -> Self {
        Error::InvalidParam(msg.into())
    }

    pub(crate) fn invariant<S: Into<String>>(msg: S) -> Self {
        Error::Invariant(msg.into())
    }

    pub(crate) fn inference<S: Into<String>>(msg: S) -> Self {
        Error::Inference(msg.into())
    }

    pub(crate) fn data<S: Into<String>>(msg: S) -> Self {
        Error::InvalidData(msg.into())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

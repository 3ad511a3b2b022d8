use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the explorer can report. None of these are fatal: the
/// driving loop decides whether to skip, retry or abort an episode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot sample {requested} transitions, only {available} stored")]
    InsufficientData { requested: usize, available: usize },

    #[error("state has {found} features, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("environment error: {0}")]
    Environment(String),

    #[error("parameter store lock was poisoned")]
    ParameterLock,

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to write metrics: {0}")]
    Metrics(#[from] polars::error::PolarsError),
}

//! Error type shared by every module of the crate.

use thiserror::Error;

/// Everything that can go wrong while training or evaluating the agent.
///
/// Simulator, Python and torch failures are fatal to the caller: nothing in
/// the crate retries them.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("direction {0:?} invalid, choose one of Up, Down, Left, Right")]
    InvalidAction(String),

    #[error("state code {0} out of range (expected 0..=15)")]
    InvalidStateCode(u8),

    #[error("replay buffer holds {available} transitions, {requested} requested")]
    InsufficientData { requested: usize, available: usize },

    #[error("no simulation session is running, call reset() first")]
    NoSession,

    #[error("simulator: {0}")]
    Simulator(String),

    #[error(transparent)]
    Python(#[from] pyo3::PyErr),

    #[error(transparent)]
    Torch(#[from] tch::TchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MixError>;

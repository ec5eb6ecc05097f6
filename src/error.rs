use thiserror::Error;

use crate::item::UniverseError;
use crate::storage::StorageError;

/// Errors surfaced by the practice engine to its caller
#[derive(Error, Debug)]
pub enum EngineError {
    /// The persistence layer could not be reached or rejected the operation.
    /// Never retried by the engine itself.
    #[error("statistics storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    /// The round configuration filtered out every item in the universe
    #[error("no items match the current round filters")]
    EmptyCandidatePool,

    #[error("round size must be at least 1")]
    InvalidRoundSize,

    #[error("no round is in progress")]
    NoRoundInProgress,

    #[error(transparent)]
    Universe(#[from] UniverseError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

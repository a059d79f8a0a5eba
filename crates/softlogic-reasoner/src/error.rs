//! Error types for term generation and optimization.

use softlogic_grounding::{AtomId, GroundingError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasonerError {
    #[error("Grounding error: {0}")]
    Grounding(#[from] GroundingError),
    #[error("Unsupported function {function}: {reason}")]
    UnsupportedFunction { function: String, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Budget {0} must be in (0, 1]")]
    InvalidBudget(f64),
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),
    #[error("Consensus index {index} out of bounds (variables: {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Atom {0} has no consensus variable")]
    UnknownVariable(AtomId),
}

pub type ReasonerResult<T> = Result<T, ReasonerError>;

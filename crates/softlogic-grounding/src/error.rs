//! Error types for grounding.

use softlogic_ir::IrError;
use thiserror::Error;

use crate::{AtomId, RuleId};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroundingError {
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
    #[error("Invalid rule {rule}: {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("Rule {0} is not registered")]
    UnknownRule(RuleId),
    #[error("Atom {0} does not exist")]
    UnknownAtom(AtomId),
    #[error("Truth value {value} for {atom} is outside [0, 1]")]
    InvalidTruthValue { atom: String, value: f64 },
    #[error("Weight {weight} is not a finite number")]
    InvalidWeight { weight: f64 },
    #[error("Atom {atom} is observed and cannot be modified")]
    ObservedAtom { atom: String },
    #[error("Predicate {predicate} is closed and cannot hold random variables")]
    ClosedPredicate { predicate: String },
    #[error("Unsupported query {query}: {reason}")]
    UnsupportedQuery { query: String, reason: String },
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type GroundingResult<T> = Result<T, GroundingError>;

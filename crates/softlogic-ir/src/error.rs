//! Error types for the IR.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("Predicate {name} not found in predicate registry")]
    PredicateNotFound { name: String },
    #[error("Predicate {name} arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("{connective} requires at least two operands, got {actual}")]
    TooFewOperands {
        connective: &'static str,
        actual: usize,
    },
    #[error("Formula is not in disjunctive normal form: {formula}")]
    NotInDnf { formula: String },
    #[error("Negation is only allowed on atoms in a DNF clause, found {formula}")]
    NegatedNonAtom { formula: String },
    #[error("DNF expansion would produce {clauses} clauses (limit {limit})")]
    DnfTooLarge { clauses: u128, limit: usize },
    #[error("Unbound variable {var} in atom {atom}")]
    UnboundVariable { var: String, atom: String },
}

pub type IrResult<T> = Result<T, IrError>;

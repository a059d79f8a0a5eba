//! # SoftLogic IR
//!
//! Terms, predicates and first-order formulas for the SoftLogic inference engine.
//!
//! ## Core Components
//!
//! - [`Term`]: variables (`?x`) and constants (`alice`)
//! - [`Predicate`] / [`PredicateRegistry`]: named relations with fixed arity,
//!   optionally closed (fully observed)
//! - [`Atom`]: a predicate applied to terms
//! - [`Formula`]: atoms combined with ∧, ∨, ¬ and →
//!
//! ## Normal Forms
//!
//! [`to_nnf`] eliminates implications and pushes negation down to atoms.
//! [`to_dnf`] then distributes conjunction over disjunction. The DNF output is
//! canonical: `to_dnf(&to_dnf(&f)) == to_dnf(&f)`.
//!
//! [`FormulaAnalysis`] splits each DNF clause into positive and negative
//! literals; grounding uses the positive literals as a query.
//!
//! ```
//! use softlogic_ir::{to_dnf, Formula, Term};
//!
//! let rule = Formula::implies(
//!     Formula::atom("Friends", vec![Term::var("a"), Term::var("b")]),
//!     Formula::atom("Knows", vec![Term::var("a"), Term::var("b")]),
//! );
//! assert!(to_dnf(&rule).is_dnf());
//! ```

mod analysis;
mod display;
mod error;
mod formula;
mod normal_forms;
mod predicate;
mod term;

use indexmap::IndexMap;

pub use analysis::{DnfClause, FormulaAnalysis};
pub use error::{IrError, IrResult};
pub use formula::{Atom, Formula};
pub use normal_forms::{dnf_clause_count, to_dnf, to_dnf_bounded, to_nnf};
pub use predicate::{Predicate, PredicateRegistry};
pub use term::{Constant, Term, Variable};

/// Binding of variable names to constants.
pub type VariableAssignment = IndexMap<Variable, Constant>;

/// Default limit on DNF clauses produced while analysing a rule.
pub const DEFAULT_MAX_DNF_CLAUSES: usize = 1024;

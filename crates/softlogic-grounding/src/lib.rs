//! # SoftLogic Grounding
//!
//! Instantiates first-order rules over a relational store of ground atoms.
//!
//! - [`Database`]: an arena of [`GroundAtom`]s addressed by [`AtomId`], with
//!   closed (fully observed) and open predicates. Implements [`AtomStore`] and
//!   [`QueryExecutor`], the two interfaces grounding needs.
//! - [`LogicalRule`] and [`ArithmeticRule`]: weighted or hard rule templates.
//! - [`ModelRegistry`]: the rules of one session, with activation state and a
//!   [`DependencyIndex`] from predicates to the rules that watch them.
//! - [`GroundingEngine`]: full and incremental grounding into a
//!   [`GroundRuleStore`], which de-duplicates ground rules.
//!
//! Ground rules carry either a weighted [`FunctionTerm`] or a
//! [`ConstraintDefinition`]; the reasoner turns them into optimization terms.

mod database;
mod engine;
mod error;
mod function;
mod ground_rule;
mod query;
mod registry;
mod rule;

pub use database::{AtomId, AtomKind, AtomStore, Database, GroundAtom};
pub use engine::{GroundingDelta, GroundingEngine, GroundingStats};
pub use error::{GroundingError, GroundingResult};
pub use function::{Comparator, ConstraintDefinition, FunctionTerm};
pub use ground_rule::{AddOutcome, GroundRule, GroundRuleId, GroundRuleKey, GroundRuleKind, GroundRuleStore, Origin};
pub use query::{query_atoms, GroundingStore, QueryExecutor, ResultList};
pub use registry::{DependencyIndex, ModelRegistry};
pub use rule::{ArithmeticExpression, ArithmeticRule, ArithmeticSummand, LogicalRule, Rule, RuleId};

//! # SoftLogic Reasoner
//!
//! Consensus ADMM over hinge-loss terms.
//!
//! Ground rules from `softlogic-grounding` are turned into [`AdmmTerm`]s by
//! the [`TermGenerator`] and collected in a [`TermStore`], which owns one
//! consensus variable per free atom. [`AdmmReasoner`] then alternates
//! parallel local minimization and consensus averaging until the primal and
//! dual residuals converge, the objective stops moving, or the iteration
//! budget runs out.
//!
//! ```no_run
//! use softlogic_reasoner::{AdmmConfig, AdmmReasoner, Reasoner, TermGenerator, TermStore};
//! # fn demo(
//! #     ground_rules: &softlogic_grounding::GroundRuleStore,
//! #     db: &mut softlogic_grounding::Database,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = TermStore::new();
//! TermGenerator::new().generate_terms(ground_rules, &*db, &mut store)?;
//! let mut reasoner = AdmmReasoner::new(AdmmConfig::default())?;
//! let report = reasoner.optimize(&mut store, None)?;
//! store.write_back(db)?;
//! println!("objective {} after {} iterations", report.objective, report.iterations);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod generator;
mod reasoner;
mod store;
mod term;

pub use config::AdmmConfig;
pub use error::{ReasonerError, ReasonerResult};
pub use generator::TermGenerator;
pub use reasoner::{
    AdmmReasoner, IterationObserver, ObjectiveSnapshot, OptimizationReport, Reasoner, ReasonerState,
    ReasonerStats, StopReason,
};
pub use store::{InitialValue, LocalRecord, TermStore};
pub use term::{AdmmTerm, Hyperplane, TermKind};

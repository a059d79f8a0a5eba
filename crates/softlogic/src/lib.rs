//! SoftLogic - soft-logic inference over weighted first-order rules
//!
//! This is the top-level umbrella crate that re-exports all SoftLogic components
//! and provides the inference applications built on them.
//!
//! # Architecture
//!
//! - **Modeling Layer**: `ir` (formulas, normal forms), `grounding` (atom
//!   store, rules, grounding engine)
//! - **Optimization Layer**: `reasoner` (ADMM terms, term store, reasoner)
//! - **Applications**: [`MpeInference`], [`LazyMpeInference`],
//!   [`OnlineSession`], configured through [`SoftLogicConfig`]

pub use softlogic_grounding as grounding;
pub use softlogic_ir as ir;
pub use softlogic_reasoner as reasoner;

pub mod config;
mod error;
pub mod inference;
#[cfg(feature = "structured-logging")]
pub mod logging;

pub use config::{GroundingConfig, InferenceConfig, SoftLogicConfig};
pub use error::{SoftLogicError, SoftLogicResult};
pub use inference::{InferenceResult, LazyMpeInference, MpeInference, OnlineSession};
#[cfg(feature = "structured-logging")]
pub use logging::{init_logging, LogFormat, LogLevel, LoggerBuilder};

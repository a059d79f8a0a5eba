use softlogic_grounding::GroundingError;
use softlogic_ir::IrError;
use softlogic_reasoner::ReasonerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoftLogicError {
    #[error("IR error: {0}")]
    Ir(#[from] IrError),
    #[error("Grounding error: {0}")]
    Grounding(#[from] GroundingError),
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type SoftLogicResult<T> = Result<T, SoftLogicError>;

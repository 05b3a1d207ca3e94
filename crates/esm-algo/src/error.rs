//! Errors raised while building and solving optimization problems

use esm_core::EsmError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Expression, model or data errors surfacing during instantiation
    #[error(transparent)]
    Core(#[from] EsmError),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Solver error: {0}")]
    Solver(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

pub type SimulationResult<T> = Result<T, SimulationError>;

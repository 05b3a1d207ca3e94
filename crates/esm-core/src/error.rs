//! Unified error type for expression compilation
//!
//! Every failure in the expression pipeline is fail-fast: builders, visitors,
//! linear arithmetic and row resolution all return [`EsmResult`] and the
//! caller propagates with `?`. Variants follow the stage that failed so that
//! callers can match on the category without parsing messages.
//!
//! # Example
//!
//! ```
//! use esm_core::{var, EsmError, EsmResult, LinearExpression};
//!
//! fn product() -> EsmResult<LinearExpression> {
//!     var("x") * var("y")
//! }
//!
//! assert!(matches!(product(), Err(EsmError::Arithmetic(_))));
//! ```

use thiserror::Error;

/// Error type for all expression, model and resolution operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EsmError {
    /// A visitor was given a node kind it cannot handle
    #[error("Unsupported expression: {0}")]
    UnsupportedNode(String),

    /// Invalid expression construction (bad instances index, shift and eval both given)
    #[error("Invalid expression: {0}")]
    Construction(String),

    /// Name resolution failures (bare parameters, double association, unresolved ports)
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Non-linear or ill-formed arithmetic on linear expressions
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// Division of an expression by a constant zero
    #[error("Division by zero: {0}")]
    ZeroDivision(String),

    /// Time operator or aggregator applied on a term already carrying one
    #[error("Composition error: {0}")]
    Composition(String),

    /// Coefficient evaluation at a row could not produce a single value
    #[error("Row resolution error: {0}")]
    RowResolution(String),

    /// Degree computation failures (division by a variable, variance)
    #[error("Degree error: {0}")]
    Degree(String),

    /// Model, network or data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Lookup of an unknown component, parameter, port or data entry
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// Reserved behavior
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Convenience type alias for Results using EsmError.
pub type EsmResult<T> = Result<T, EsmError>;

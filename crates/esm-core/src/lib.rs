//! # esm-core: Energy System Modeling Core
//!
//! Expression language, model templates and networks for building linear
//! optimization problems of energy systems.
//!
//! ## Design Philosophy
//!
//! Users write **models** once (parameters, variables, constraints, ports) and
//! instantiate them as **components** of a network:
//! - **Expressions**: immutable [`ExpressionNode`] trees for parameter
//!   arithmetic, [`LinearExpression`] for affine forms over variables
//! - **Ports**: typed interfaces through which components exchange linear
//!   expressions (a node sums the flows of everything connected to it)
//! - **Data**: a [`data::DataBase`] of constant or time/scenario series values
//!
//! Turning all of this into solver rows (port resolution, component
//! association, indexing and per-row coefficient evaluation) lives in
//! `esm-algo`.
//!
//! ## Quick Start
//!
//! ```rust
//! use esm_core::*;
//!
//! // generation <= p_max, with a cost summed over the block and averaged
//! // over scenarios
//! let max_generation = var("generation").le(param("p_max"))?;
//! let cost = (param("cost") * var("generation"))?.sum()?.expec()?;
//!
//! assert_eq!(max_generation.expression.terms.len(), 1);
//! assert_eq!(cost.terms.len(), 1);
//! # Ok::<(), EsmError>(())
//! ```
//!
//! ## Modules
//!
//! - [`expression`] - Node trees, visitors, linear expressions, evaluation
//! - [`model`] - Parameters, variables, constraints, ports and models
//! - [`network`] - Components and port connections (petgraph `UnGraph`)
//! - [`data`] - Parameter values per component
//! - [`library`] - Standard node, demand, generator, link and storage models,
//!   thermal clusters with unit commitment, multi-carrier conversion and CO2
//!   quota models

pub mod data;
pub mod error;
pub mod expression;
pub mod library;
pub mod model;
pub mod network;

pub use error::{EsmError, EsmResult};
pub use expression::{
    comp_param, comp_var, literal, param, port_field, var, ExpressionNode, IndexingStructure,
    IndexingStructureProvider, LinearExpression, RowIndex, StandaloneConstraint,
    TimeScenarioIndex, ValueProvider, ANTICIPATIVE_TIME_VARYING, CONSTANT, CONSTANT_PER_SCENARIO,
    NON_ANTICIPATIVE_TIME_VARYING, TIME_AND_SCENARIO_FREE,
};
pub use network::{Component, Network, PortRef, PortsConnection};

//! # esm-algo: Energy System Problem Building and Solving
//!
//! Instantiates the models of an `esm-core` network over a time block and a
//! set of scenarios, producing a linear problem, then solves it.
//!
//! ## Pipeline
//!
//! For every component constraint and objective contribution:
//! 1. port fields are replaced by the expressions of connected components
//! 2. parameters and variables are associated to the component
//! 3. the indexing structure decides which `(t, s)` rows are emitted
//! 4. each term expands into solver variables, with coefficients read from
//!    the [`esm_core::data::DataBase`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use esm_algo::{build_problem, solve, BuildConfig, OutputValues, SolverConfig, TimeBlock};
//! use esm_core::data::{DataBase, DataStructure};
//! use esm_core::library::{demand_model, generator_model, node_balance_model, BALANCE_PORT};
//! use esm_core::{Component, Network, PortRef};
//!
//! let node = Component::new(Arc::new(node_balance_model()?), "N");
//! let demand = Component::new(Arc::new(demand_model()?), "D");
//! let generator = Component::new(Arc::new(generator_model()?), "G");
//!
//! let mut network = Network::new("one_node");
//! network.add_node(node.clone());
//! network.add_component(demand.clone());
//! network.add_component(generator.clone());
//! network.connect(PortRef::new(&demand, BALANCE_PORT), PortRef::new(&node, BALANCE_PORT))?;
//! network.connect(PortRef::new(&generator, BALANCE_PORT), PortRef::new(&node, BALANCE_PORT))?;
//!
//! let mut database = DataBase::new();
//! database.add_data("D", "demand", DataStructure::Constant(100.0));
//! database.add_data("G", "p_max", DataStructure::Constant(100.0));
//! database.add_data("G", "cost", DataStructure::Constant(30.0));
//!
//! let block = TimeBlock::first(0, 1);
//! let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())?;
//! let solution = solve(&problem, &SolverConfig::default())?;
//! let output = OutputValues::from_solution(&problem, &solution)?;
//! println!("cost: {}\n{}", solution.objective_value, output);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`context`] - Variable registry, port expressions, data-backed providers
//! - [`resolver`] - Per-row expansion of linear expressions
//! - [`problem`] - Problem building
//! - [`solver`] - good_lp backends: clarabel for LPs, HiGHS for MILPs
//!   (features `solver-clarabel`, `solver-highs`)
//! - [`output`] - Solved values per component and variable

pub mod config;
pub mod context;
pub mod error;
pub mod logging;
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
pub mod output;
pub mod problem;
pub mod resolver;
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
pub mod solver;
pub mod strategy;
pub mod time_block;

pub use config::{BuildConfig, SolverConfig};
pub use context::{BlockBorderManagement, OptimizationContext, VariableId};
pub use error::{SimulationError, SimulationResult};
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
pub use output::{OutputComponent, OutputValue, OutputValues, OutputVariable};
pub use problem::{
    build_problem, LinearProblem, OptimizationProblem, ProblemConstraint, ProblemVariable,
};
pub use resolver::{LinearExpressionResolver, ResolvedLinearExpression, ResolvedTerm};
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
pub use solver::{solve, ProblemSolution, SolveStatus, SolverKind};
pub use strategy::ProblemStrategy;
pub use time_block::TimeBlock;

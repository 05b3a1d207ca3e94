//! Expression trees and their linearization
//!
//! Two layers:
//! - [`ExpressionNode`]: immutable trees of literals, parameters and operators.
//!   They hold coefficients, constants, bounds and time index expressions.
//! - [`LinearExpression`]: the affine form over decision variables built from
//!   those trees, in which constraints and objectives are written.
//!
//! Node trees are processed by [`ExpressionVisitor`]s: printing, equality,
//! degree, indexing structure, component association and per-row evaluation.

mod context;
mod degree;
mod equality;
mod evaluate;
mod indexing;
mod linear;
mod node;
mod operators;
mod print;
mod value_provider;
mod visitor;

pub use context::add_component_context;
pub use degree::{compute_degree, is_constant, is_linear};
pub use equality::{expressions_equal, expressions_equal_with_tolerance, EqualityVisitor};
pub use evaluate::{get_time_ids_from_instances_index, resolve_coefficient};
pub use indexing::{
    compute_indexation, IndexingStructure, IndexingStructureProvider, RowIndex,
    ANTICIPATIVE_TIME_VARYING, CONSTANT, CONSTANT_PER_SCENARIO, NON_ANTICIPATIVE_TIME_VARYING,
    TIME_AND_SCENARIO_FREE,
};
pub use linear::{
    comp_var, linear_expressions_equal, port_field, sum_expressions, var, LinearExpression,
    PortFieldId, PortFieldKey, PortFieldTerm, ScenarioAggregator, StandaloneConstraint, Term,
    TermKey, TimeOperator, TimeSum,
};
pub use node::{
    comp_param, literal, param, Comparator, ExpressionNode, ExpressionRange, InstancesTimeIndex,
    PortFieldAggregatorName, ScenarioOperatorName, TimeAggregatorName, TimeOperatorName, EPS,
};
pub use operators::{add, divide, multiply, negate, subtract};
pub use print::print_expr;
pub use value_provider::{TimeScenarioIndex, ValueProvider};
pub use visitor::{visit, ExpressionVisitor};

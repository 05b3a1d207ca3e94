//! Expression tree nodes
//!
//! [`ExpressionNode`] is the immutable AST every model-level expression is
//! written in. Children are shared through [`Arc`], so cloning a tree is cheap
//! and transformed copies reuse the subtrees they do not touch.
//!
//! Equality and hashing on the node type are exact and structural (literals are
//! compared bitwise with `-0.0 == 0.0`). Tolerance-aware comparison lives in
//! [`super::equality`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Comparison operator at the root of a constraint expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    LessThan,
    Equal,
    GreaterThan,
}

/// Time operator kind
///
/// `Shift` is relative to the current row timestep, `Evaluation` addresses
/// absolute timesteps of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOperatorName {
    Shift,
    Evaluation,
}

impl TimeOperatorName {
    /// Whether the resolved time ids follow the row timestep
    pub fn rolling(&self) -> bool {
        matches!(self, TimeOperatorName::Shift)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAggregatorName {
    Sum,
}

/// Scenario operator kind with its polynomial degree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOperatorName {
    Expectation,
    Variance,
}

impl ScenarioOperatorName {
    pub fn degree(&self) -> usize {
        match self {
            ScenarioOperatorName::Expectation => 1,
            ScenarioOperatorName::Variance => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortFieldAggregatorName {
    PortSum,
}

/// Inclusive range of time indices, `start..=stop` with an optional step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpressionRange {
    pub start: Arc<ExpressionNode>,
    pub stop: Arc<ExpressionNode>,
    pub step: Option<Arc<ExpressionNode>>,
}

impl ExpressionRange {
    pub fn new(start: impl Into<ExpressionNode>, stop: impl Into<ExpressionNode>) -> Self {
        Self {
            start: Arc::new(start.into()),
            stop: Arc::new(stop.into()),
            step: None,
        }
    }

    pub fn with_step(mut self, step: impl Into<ExpressionNode>) -> Self {
        self.step = Some(Arc::new(step.into()));
        self
    }
}

/// Time instances targeted by a time operator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstancesTimeIndex {
    /// Ordered list of index expressions
    List(Vec<ExpressionNode>),
    /// Inclusive range of index expressions
    Range(ExpressionRange),
}

impl InstancesTimeIndex {
    /// True when the index designates a single time step.
    ///
    /// Ranges are never considered simple, even when their bounds are equal
    /// literals.
    pub fn is_simple(&self) -> bool {
        match self {
            InstancesTimeIndex::List(expressions) => expressions.len() == 1,
            InstancesTimeIndex::Range(_) => false,
        }
    }
}

impl From<i32> for InstancesTimeIndex {
    fn from(value: i32) -> Self {
        InstancesTimeIndex::List(vec![ExpressionNode::Literal(value as f64)])
    }
}

impl From<ExpressionNode> for InstancesTimeIndex {
    fn from(node: ExpressionNode) -> Self {
        InstancesTimeIndex::List(vec![node])
    }
}

impl From<Vec<ExpressionNode>> for InstancesTimeIndex {
    fn from(nodes: Vec<ExpressionNode>) -> Self {
        InstancesTimeIndex::List(nodes)
    }
}

impl From<Vec<i32>> for InstancesTimeIndex {
    fn from(values: Vec<i32>) -> Self {
        InstancesTimeIndex::List(
            values
                .into_iter()
                .map(|v| ExpressionNode::Literal(v as f64))
                .collect(),
        )
    }
}

impl From<ExpressionRange> for InstancesTimeIndex {
    fn from(range: ExpressionRange) -> Self {
        InstancesTimeIndex::Range(range)
    }
}

impl From<RangeInclusive<i32>> for InstancesTimeIndex {
    fn from(range: RangeInclusive<i32>) -> Self {
        InstancesTimeIndex::Range(ExpressionRange::new(*range.start(), *range.end()))
    }
}

/// Immutable expression tree
#[derive(Debug, Clone)]
pub enum ExpressionNode {
    Literal(f64),
    /// Parameter not yet associated to a component
    Parameter(String),
    ComponentParameter {
        component_id: String,
        name: String,
    },
    Negation(Arc<ExpressionNode>),
    Addition(Arc<ExpressionNode>, Arc<ExpressionNode>),
    Subtraction(Arc<ExpressionNode>, Arc<ExpressionNode>),
    Multiplication(Arc<ExpressionNode>, Arc<ExpressionNode>),
    Division(Arc<ExpressionNode>, Arc<ExpressionNode>),
    /// Only valid at the root of a constraint
    Comparison {
        left: Arc<ExpressionNode>,
        right: Arc<ExpressionNode>,
        comparator: Comparator,
    },
    TimeOperator {
        operand: Arc<ExpressionNode>,
        operator: TimeOperatorName,
        instances_index: InstancesTimeIndex,
    },
    TimeAggregator {
        operand: Arc<ExpressionNode>,
        aggregator: TimeAggregatorName,
        stay_roll: bool,
    },
    ScenarioOperator {
        operand: Arc<ExpressionNode>,
        operator: ScenarioOperatorName,
    },
    PortField {
        port_name: String,
        field_name: String,
    },
    PortFieldAggregator {
        operand: Arc<ExpressionNode>,
        aggregator: PortFieldAggregatorName,
    },
}

/// Bit pattern used for literal equality and hashing, `-0.0` folded onto `0.0`
fn literal_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

impl PartialEq for ExpressionNode {
    fn eq(&self, other: &Self) -> bool {
        use ExpressionNode::*;
        match (self, other) {
            (Literal(a), Literal(b)) => literal_bits(*a) == literal_bits(*b),
            (Parameter(a), Parameter(b)) => a == b,
            (
                ComponentParameter {
                    component_id: c1,
                    name: n1,
                },
                ComponentParameter {
                    component_id: c2,
                    name: n2,
                },
            ) => c1 == c2 && n1 == n2,
            (Negation(a), Negation(b)) => a == b,
            (Addition(l1, r1), Addition(l2, r2))
            | (Subtraction(l1, r1), Subtraction(l2, r2))
            | (Multiplication(l1, r1), Multiplication(l2, r2))
            | (Division(l1, r1), Division(l2, r2)) => l1 == l2 && r1 == r2,
            (
                Comparison {
                    left: l1,
                    right: r1,
                    comparator: c1,
                },
                Comparison {
                    left: l2,
                    right: r2,
                    comparator: c2,
                },
            ) => c1 == c2 && l1 == l2 && r1 == r2,
            (
                TimeOperator {
                    operand: o1,
                    operator: k1,
                    instances_index: i1,
                },
                TimeOperator {
                    operand: o2,
                    operator: k2,
                    instances_index: i2,
                },
            ) => k1 == k2 && i1 == i2 && o1 == o2,
            (
                TimeAggregator {
                    operand: o1,
                    aggregator: a1,
                    stay_roll: s1,
                },
                TimeAggregator {
                    operand: o2,
                    aggregator: a2,
                    stay_roll: s2,
                },
            ) => a1 == a2 && s1 == s2 && o1 == o2,
            (
                ScenarioOperator {
                    operand: o1,
                    operator: k1,
                },
                ScenarioOperator {
                    operand: o2,
                    operator: k2,
                },
            ) => k1 == k2 && o1 == o2,
            (
                PortField {
                    port_name: p1,
                    field_name: f1,
                },
                PortField {
                    port_name: p2,
                    field_name: f2,
                },
            ) => p1 == p2 && f1 == f2,
            (
                PortFieldAggregator {
                    operand: o1,
                    aggregator: a1,
                },
                PortFieldAggregator {
                    operand: o2,
                    aggregator: a2,
                },
            ) => a1 == a2 && o1 == o2,
            _ => false,
        }
    }
}

impl Eq for ExpressionNode {}

impl Hash for ExpressionNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ExpressionNode::Literal(value) => literal_bits(*value).hash(state),
            ExpressionNode::Parameter(name) => name.hash(state),
            ExpressionNode::ComponentParameter { component_id, name } => {
                component_id.hash(state);
                name.hash(state);
            }
            ExpressionNode::Negation(operand) => operand.hash(state),
            ExpressionNode::Addition(left, right)
            | ExpressionNode::Subtraction(left, right)
            | ExpressionNode::Multiplication(left, right)
            | ExpressionNode::Division(left, right) => {
                left.hash(state);
                right.hash(state);
            }
            ExpressionNode::Comparison {
                left,
                right,
                comparator,
            } => {
                left.hash(state);
                right.hash(state);
                comparator.hash(state);
            }
            ExpressionNode::TimeOperator {
                operand,
                operator,
                instances_index,
            } => {
                operand.hash(state);
                operator.hash(state);
                instances_index.hash(state);
            }
            ExpressionNode::TimeAggregator {
                operand,
                aggregator,
                stay_roll,
            } => {
                operand.hash(state);
                aggregator.hash(state);
                stay_roll.hash(state);
            }
            ExpressionNode::ScenarioOperator { operand, operator } => {
                operand.hash(state);
                operator.hash(state);
            }
            ExpressionNode::PortField {
                port_name,
                field_name,
            } => {
                port_name.hash(state);
                field_name.hash(state);
            }
            ExpressionNode::PortFieldAggregator {
                operand,
                aggregator,
            } => {
                operand.hash(state);
                aggregator.hash(state);
            }
        }
    }
}

impl From<f64> for ExpressionNode {
    fn from(value: f64) -> Self {
        ExpressionNode::Literal(value)
    }
}

impl From<i32> for ExpressionNode {
    fn from(value: i32) -> Self {
        ExpressionNode::Literal(value as f64)
    }
}

impl Default for ExpressionNode {
    fn default() -> Self {
        ExpressionNode::Literal(0.0)
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::print::print_expr(self))
    }
}

/// Literal absolute tolerance for zero detection
pub const EPS: f64 = 1e-16;

fn isclose(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

impl ExpressionNode {
    pub fn is_literal(&self) -> bool {
        matches!(self, ExpressionNode::Literal(_))
    }

    /// Literal value when the node is a literal
    pub fn as_literal(&self) -> Option<f64> {
        match self {
            ExpressionNode::Literal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, ExpressionNode::Literal(v) if v.abs() <= EPS)
    }

    pub fn is_one(&self) -> bool {
        matches!(self, ExpressionNode::Literal(v) if isclose(*v, 1.0))
    }

    pub fn is_minus_one(&self) -> bool {
        matches!(self, ExpressionNode::Literal(v) if isclose(*v, -1.0))
    }

    /// Literal with an infinite value, used for absent bounds
    pub fn is_unbound(&self) -> bool {
        matches!(self, ExpressionNode::Literal(v) if v.is_infinite())
    }

    /// Sum over time. Rolling when applied directly to a time operator.
    pub fn sum(self) -> ExpressionNode {
        let stay_roll = matches!(self, ExpressionNode::TimeOperator { .. });
        ExpressionNode::TimeAggregator {
            operand: Arc::new(self),
            aggregator: TimeAggregatorName::Sum,
            stay_roll,
        }
    }

    pub fn shift(self, instances: impl Into<InstancesTimeIndex>) -> ExpressionNode {
        ExpressionNode::TimeOperator {
            operand: Arc::new(self),
            operator: TimeOperatorName::Shift,
            instances_index: instances.into(),
        }
    }

    pub fn eval(self, instances: impl Into<InstancesTimeIndex>) -> ExpressionNode {
        ExpressionNode::TimeOperator {
            operand: Arc::new(self),
            operator: TimeOperatorName::Evaluation,
            instances_index: instances.into(),
        }
    }

    pub fn expec(self) -> ExpressionNode {
        ExpressionNode::ScenarioOperator {
            operand: Arc::new(self),
            operator: ScenarioOperatorName::Expectation,
        }
    }

    pub fn variance(self) -> ExpressionNode {
        ExpressionNode::ScenarioOperator {
            operand: Arc::new(self),
            operator: ScenarioOperatorName::Variance,
        }
    }

    pub fn le(self, rhs: impl Into<ExpressionNode>) -> ExpressionNode {
        self.compare(rhs.into(), Comparator::LessThan)
    }

    pub fn ge(self, rhs: impl Into<ExpressionNode>) -> ExpressionNode {
        self.compare(rhs.into(), Comparator::GreaterThan)
    }

    pub fn eq_(self, rhs: impl Into<ExpressionNode>) -> ExpressionNode {
        self.compare(rhs.into(), Comparator::Equal)
    }

    fn compare(self, rhs: ExpressionNode, comparator: Comparator) -> ExpressionNode {
        ExpressionNode::Comparison {
            left: Arc::new(self),
            right: Arc::new(rhs),
            comparator,
        }
    }
}

pub fn literal(value: f64) -> ExpressionNode {
    ExpressionNode::Literal(value)
}

pub fn param(name: &str) -> ExpressionNode {
    ExpressionNode::Parameter(name.to_string())
}

pub fn comp_param(component_id: &str, name: &str) -> ExpressionNode {
    ExpressionNode::ComponentParameter {
        component_id: component_id.to_string(),
        name: name.to_string(),
    }
}

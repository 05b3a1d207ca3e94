//! Tolerance-aware structural comparison of expression trees

use super::node::{ExpressionNode, ExpressionRange, InstancesTimeIndex};
use crate::error::{EsmError, EsmResult};

/// Compares two trees node by node.
///
/// Literal values are compared with `|a - b| <= max(rel_tol * max(|a|, |b|), abs_tol)`;
/// every other node must agree on variant, operator kind, identifiers and operands.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityVisitor {
    abs_tol: f64,
    rel_tol: f64,
}

impl EqualityVisitor {
    pub fn new(abs_tol: f64, rel_tol: f64) -> EsmResult<Self> {
        if abs_tol < 0.0 {
            return Err(EsmError::Construction(format!(
                "Absolute comparison tolerance must be >= 0, got {}",
                abs_tol
            )));
        }
        if rel_tol < 0.0 {
            return Err(EsmError::Construction(format!(
                "Relative comparison tolerance must be >= 0, got {}",
                rel_tol
            )));
        }
        Ok(Self { abs_tol, rel_tol })
    }

    fn literal(&self, left: f64, right: f64) -> bool {
        if left == right {
            return true;
        }
        let scale = left.abs().max(right.abs());
        (left - right).abs() <= (self.rel_tol * scale).max(self.abs_tol)
    }

    pub fn visit(&self, left: &ExpressionNode, right: &ExpressionNode) -> bool {
        use ExpressionNode::*;
        match (left, right) {
            (Literal(a), Literal(b)) => self.literal(*a, *b),
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
            (Negation(a), Negation(b)) => self.visit(a, b),
            (Addition(l1, r1), Addition(l2, r2))
            | (Subtraction(l1, r1), Subtraction(l2, r2))
            | (Multiplication(l1, r1), Multiplication(l2, r2))
            | (Division(l1, r1), Division(l2, r2)) => self.visit(l1, l2) && self.visit(r1, r2),
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
            ) => c1 == c2 && self.visit(l1, l2) && self.visit(r1, r2),
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
            ) => k1 == k2 && self.instances_index(i1, i2) && self.visit(o1, o2),
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
            ) => a1 == a2 && s1 == s2 && self.visit(o1, o2),
            (
                ScenarioOperator {
                    operand: o1,
                    operator: k1,
                },
                ScenarioOperator {
                    operand: o2,
                    operator: k2,
                },
            ) => k1 == k2 && self.visit(o1, o2),
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
            ) => a1 == a2 && self.visit(o1, o2),
            _ => false,
        }
    }

    fn expression_range(&self, left: &ExpressionRange, right: &ExpressionRange) -> bool {
        if !self.visit(&left.start, &right.start) || !self.visit(&left.stop, &right.stop) {
            return false;
        }
        match (&left.step, &right.step) {
            (Some(a), Some(b)) => self.visit(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn instances_index(&self, left: &InstancesTimeIndex, right: &InstancesTimeIndex) -> bool {
        match (left, right) {
            (InstancesTimeIndex::Range(a), InstancesTimeIndex::Range(b)) => {
                self.expression_range(a, b)
            }
            (InstancesTimeIndex::List(a), InstancesTimeIndex::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.visit(x, y))
            }
            _ => false,
        }
    }
}

/// Exact structural equality
pub fn expressions_equal(left: &ExpressionNode, right: &ExpressionNode) -> bool {
    EqualityVisitor::default().visit(left, right)
}

/// Structural equality with literal tolerances
pub fn expressions_equal_with_tolerance(
    left: &ExpressionNode,
    right: &ExpressionNode,
    abs_tol: f64,
    rel_tol: f64,
) -> EsmResult<bool> {
    Ok(EqualityVisitor::new(abs_tol, rel_tol)?.visit(left, right))
}

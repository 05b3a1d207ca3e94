//! Simplifying arithmetic on expression nodes
//!
//! Building `a + b` through these constructors folds literals, drops neutral
//! elements and merges repeated parameter factors. The rules only look at the
//! immediate operands; they are not a normal form.
//!
//! Arithmetic is fallible: a comparison node is rejected as an operand.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use super::equality::expressions_equal;
use super::node::ExpressionNode;
use crate::error::{EsmError, EsmResult};

fn is_parameter_pair(lhs: &ExpressionNode, rhs: &ExpressionNode) -> bool {
    matches!(
        (lhs, rhs),
        (ExpressionNode::Parameter(a), ExpressionNode::Parameter(b)) if a == b
    )
}

fn mul_node(lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
    ExpressionNode::Multiplication(Arc::new(lhs), Arc::new(rhs))
}

pub fn negate(node: ExpressionNode) -> ExpressionNode {
    match node {
        ExpressionNode::Literal(value) => ExpressionNode::Literal(-value),
        ExpressionNode::Negation(operand) => (*operand).clone(),
        other => ExpressionNode::Negation(Arc::new(other)),
    }
}

fn fold_add(lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
    if lhs.is_zero() {
        return rhs;
    }
    if rhs.is_zero() {
        return lhs;
    }
    if expressions_equal(&lhs, &negate(rhs.clone())) {
        return ExpressionNode::Literal(0.0);
    }
    if let (ExpressionNode::Literal(a), ExpressionNode::Literal(b)) = (&lhs, &rhs) {
        return ExpressionNode::Literal(a + b);
    }
    if is_parameter_pair(&lhs, &rhs) {
        return mul_node(ExpressionNode::Literal(2.0), lhs);
    }

    // p + k*p and k*p + p
    let param_and_product = match (&lhs, &rhs) {
        (ExpressionNode::Parameter(_), ExpressionNode::Multiplication(l, r)) => {
            Some((&lhs, l, r))
        }
        (ExpressionNode::Multiplication(l, r), ExpressionNode::Parameter(_)) => {
            Some((&rhs, l, r))
        }
        _ => None,
    };
    if let Some((param_node, left, right)) = param_and_product {
        if is_parameter_pair(param_node, left) {
            return mul_node(
                fold_add(ExpressionNode::Literal(1.0), (**right).clone()),
                param_node.clone(),
            );
        }
        if is_parameter_pair(param_node, right) {
            return mul_node(
                fold_add(ExpressionNode::Literal(1.0), (**left).clone()),
                param_node.clone(),
            );
        }
    }

    if let (ExpressionNode::Multiplication(ll, lr), ExpressionNode::Multiplication(rl, rr)) =
        (&lhs, &rhs)
    {
        if is_parameter_pair(ll, rl) {
            return mul_node(fold_add((**lr).clone(), (**rr).clone()), (**ll).clone());
        }
        if is_parameter_pair(ll, rr) {
            return mul_node(fold_add((**lr).clone(), (**rl).clone()), (**ll).clone());
        }
        if is_parameter_pair(lr, rl) {
            return mul_node(fold_add((**ll).clone(), (**rr).clone()), (**lr).clone());
        }
        if is_parameter_pair(lr, rr) {
            return mul_node(fold_add((**ll).clone(), (**rl).clone()), (**lr).clone());
        }
    }
    ExpressionNode::Addition(Arc::new(lhs), Arc::new(rhs))
}

fn fold_subtract(lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
    if lhs.is_zero() {
        return negate(rhs);
    }
    if rhs.is_zero() {
        return lhs;
    }
    if expressions_equal(&lhs, &rhs) {
        return ExpressionNode::Literal(0.0);
    }
    if let (ExpressionNode::Literal(a), ExpressionNode::Literal(b)) = (&lhs, &rhs) {
        return ExpressionNode::Literal(a - b);
    }
    if is_parameter_pair(&lhs, &negate(rhs.clone())) {
        return mul_node(ExpressionNode::Literal(2.0), lhs);
    }

    // p - k*p gives (1-k)*p, k*p - p gives (k-1)*p
    match (&lhs, &rhs) {
        (ExpressionNode::Parameter(_), ExpressionNode::Multiplication(l, r)) => {
            if is_parameter_pair(&lhs, l) {
                let factor = fold_subtract(ExpressionNode::Literal(1.0), (**r).clone());
                return mul_node(factor, lhs.clone());
            }
            if is_parameter_pair(&lhs, r) {
                let factor = fold_subtract(ExpressionNode::Literal(1.0), (**l).clone());
                return mul_node(factor, lhs.clone());
            }
        }
        (ExpressionNode::Multiplication(l, r), ExpressionNode::Parameter(_)) => {
            if is_parameter_pair(&rhs, l) {
                let factor = fold_subtract((**r).clone(), ExpressionNode::Literal(1.0));
                return mul_node(factor, rhs.clone());
            }
            if is_parameter_pair(&rhs, r) {
                let factor = fold_subtract((**l).clone(), ExpressionNode::Literal(1.0));
                return mul_node(factor, rhs.clone());
            }
        }
        _ => {}
    }

    if let (ExpressionNode::Multiplication(ll, lr), ExpressionNode::Multiplication(rl, rr)) =
        (&lhs, &rhs)
    {
        if is_parameter_pair(ll, rl) {
            return mul_node(fold_subtract((**lr).clone(), (**rr).clone()), (**ll).clone());
        }
        if is_parameter_pair(ll, rr) {
            return mul_node(fold_subtract((**lr).clone(), (**rl).clone()), (**ll).clone());
        }
        if is_parameter_pair(lr, rl) {
            return mul_node(fold_subtract((**ll).clone(), (**rr).clone()), (**lr).clone());
        }
        if is_parameter_pair(lr, rr) {
            return mul_node(fold_subtract((**ll).clone(), (**rl).clone()), (**lr).clone());
        }
    }
    ExpressionNode::Subtraction(Arc::new(lhs), Arc::new(rhs))
}

fn fold_multiply(lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
    if lhs.is_zero() || rhs.is_zero() {
        return ExpressionNode::Literal(0.0);
    }
    if lhs.is_one() {
        return rhs;
    }
    if rhs.is_one() {
        return lhs;
    }
    if lhs.is_minus_one() {
        return negate(rhs);
    }
    if rhs.is_minus_one() {
        return negate(lhs);
    }
    if let (ExpressionNode::Literal(a), ExpressionNode::Literal(b)) = (&lhs, &rhs) {
        return ExpressionNode::Literal(a * b);
    }
    mul_node(lhs, rhs)
}

/// A literal zero divisor is kept as a node so that the evaluator reports it.
fn fold_divide(lhs: ExpressionNode, rhs: ExpressionNode) -> ExpressionNode {
    if rhs.is_one() {
        return lhs;
    }
    if rhs.is_minus_one() {
        return negate(lhs);
    }
    if let (ExpressionNode::Literal(a), ExpressionNode::Literal(b)) = (&lhs, &rhs) {
        if *b != 0.0 {
            return ExpressionNode::Literal(a / b);
        }
    }
    ExpressionNode::Division(Arc::new(lhs), Arc::new(rhs))
}

/// Comparisons only make sense at the root of a constraint
fn check_operands(lhs: &ExpressionNode, rhs: &ExpressionNode) -> EsmResult<()> {
    if matches!(lhs, ExpressionNode::Comparison { .. })
        || matches!(rhs, ExpressionNode::Comparison { .. })
    {
        return Err(EsmError::Construction(
            "Comparison cannot be used as an operand of arithmetic operations".into(),
        ));
    }
    Ok(())
}

pub fn add(lhs: ExpressionNode, rhs: ExpressionNode) -> EsmResult<ExpressionNode> {
    check_operands(&lhs, &rhs)?;
    Ok(fold_add(lhs, rhs))
}

pub fn subtract(lhs: ExpressionNode, rhs: ExpressionNode) -> EsmResult<ExpressionNode> {
    check_operands(&lhs, &rhs)?;
    Ok(fold_subtract(lhs, rhs))
}

pub fn multiply(lhs: ExpressionNode, rhs: ExpressionNode) -> EsmResult<ExpressionNode> {
    check_operands(&lhs, &rhs)?;
    Ok(fold_multiply(lhs, rhs))
}

pub fn divide(lhs: ExpressionNode, rhs: ExpressionNode) -> EsmResult<ExpressionNode> {
    check_operands(&lhs, &rhs)?;
    Ok(fold_divide(lhs, rhs))
}

impl Neg for ExpressionNode {
    type Output = ExpressionNode;

    fn neg(self) -> ExpressionNode {
        negate(self)
    }
}

macro_rules! node_binary_op {
    ($trait:ident, $method:ident, $builder:ident) => {
        impl $trait<ExpressionNode> for ExpressionNode {
            type Output = EsmResult<ExpressionNode>;

            fn $method(self, rhs: ExpressionNode) -> Self::Output {
                $builder(self, rhs)
            }
        }

        impl $trait<f64> for ExpressionNode {
            type Output = EsmResult<ExpressionNode>;

            fn $method(self, rhs: f64) -> Self::Output {
                $builder(self, ExpressionNode::Literal(rhs))
            }
        }

        impl $trait<ExpressionNode> for f64 {
            type Output = EsmResult<ExpressionNode>;

            fn $method(self, rhs: ExpressionNode) -> Self::Output {
                $builder(ExpressionNode::Literal(self), rhs)
            }
        }
    };
}

node_binary_op!(Add, add, add);
node_binary_op!(Sub, sub, subtract);
node_binary_op!(Mul, mul, multiply);
node_binary_op!(Div, div, divide);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::node::{literal, param};

    fn ok(result: EsmResult<ExpressionNode>) -> ExpressionNode {
        result.expect("arithmetic on non comparison operands")
    }

    fn scaled(factor: f64, name: &str) -> ExpressionNode {
        ExpressionNode::Multiplication(Arc::new(literal(factor)), Arc::new(param(name)))
    }

    #[test]
    fn test_literal_folding() {
        assert_eq!(ok(literal(2.0) + literal(3.0)), literal(5.0));
        assert_eq!(ok(literal(2.0) - literal(3.0)), literal(-1.0));
        assert_eq!(ok(literal(2.0) * literal(3.0)), literal(6.0));
        assert_eq!(ok(literal(3.0) / literal(2.0)), literal(1.5));
    }

    #[test]
    fn test_neutral_elements() {
        assert_eq!(ok(param("p") + 0.0), param("p"));
        assert_eq!(ok(0.0 + param("p")), param("p"));
        assert_eq!(ok(param("p") * 1.0), param("p"));
        assert_eq!(ok(param("p") * 0.0), literal(0.0));
        assert_eq!(ok(param("p") * -1.0), -param("p"));
        assert_eq!(ok(param("p") / -1.0), -param("p"));
        assert_eq!(ok(0.0 - param("p")), -param("p"));
    }

    #[test]
    fn test_negation_unwraps() {
        assert_eq!(-(-param("p")), param("p"));
        assert_eq!(-literal(4.0), literal(-4.0));
    }

    #[test]
    fn test_cancellation() {
        assert_eq!(ok(param("p") - param("p")), literal(0.0));
        assert_eq!(ok(param("p") + (-param("p"))), literal(0.0));
    }

    #[test]
    fn test_parameter_factor_merging() {
        assert_eq!(ok(param("p") + param("p")), scaled(2.0, "p"));
        assert_eq!(ok(param("p") + scaled(3.0, "p")), scaled(4.0, "p"));
        assert_eq!(
            ok(ok(param("p") * 2.0) + scaled(3.0, "p")),
            scaled(5.0, "p")
        );
        assert_eq!(ok(param("p") - scaled(3.0, "p")), scaled(-2.0, "p"));
        assert_eq!(ok(scaled(3.0, "p") - param("p")), scaled(2.0, "p"));
    }

    #[test]
    fn test_unrelated_products_are_kept() {
        let sum = ok(scaled(2.0, "p") + scaled(3.0, "q"));
        assert!(matches!(sum, ExpressionNode::Addition(_, _)));
        let diff = ok(scaled(2.0, "p") - scaled(3.0, "q"));
        assert!(matches!(diff, ExpressionNode::Subtraction(_, _)));
    }

    #[test]
    fn test_division_by_literal_zero_is_not_folded() {
        assert!(matches!(
            ok(literal(1.0) / literal(0.0)),
            ExpressionNode::Division(_, _)
        ));
    }

    #[test]
    fn test_comparison_operand_rejected() {
        let comparison = param("a").le(param("b"));
        for result in [
            comparison.clone() + param("c"),
            param("c") - comparison.clone(),
            comparison.clone() * 2.0,
            2.0 / comparison.clone(),
        ] {
            let err = result.unwrap_err();
            assert!(
                matches!(err, EsmError::Construction(_)),
                "expected a construction error, got {:?}",
                err
            );
        }
        // also through the folding shortcuts
        assert!((comparison.clone() + 0.0).is_err());
        assert!((comparison * 1.0).is_err());
    }
}

use super::common::ProblemContext;
use crate::error::{EsmError, EsmResult};
use crate::expression::{
    is_constant, literal, print_expr, ExpressionNode, LinearExpression, StandaloneConstraint,
};

/// A constraint `lower_bound <= expression <= upper_bound` of a model.
///
/// Variables only appear in `expression`; bounds are parameter trees.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expression: LinearExpression,
    pub lower_bound: ExpressionNode,
    pub upper_bound: ExpressionNode,
    pub context: ProblemContext,
}

impl Constraint {
    /// Constraint from a comparison such as `var("x").le(param("p"))?`
    pub fn new(name: &str, comparison: StandaloneConstraint) -> Self {
        Self {
            name: name.to_string(),
            expression: comparison.expression,
            lower_bound: comparison.lower_bound.constant,
            upper_bound: comparison.upper_bound.constant,
            context: ProblemContext::Operational,
        }
    }

    /// Constraint on an expression with explicit bounds
    pub fn with_bounds(
        name: &str,
        expression: LinearExpression,
        lower_bound: impl Into<ExpressionNode>,
        upper_bound: impl Into<ExpressionNode>,
    ) -> EsmResult<Self> {
        let lower_bound = lower_bound.into();
        let upper_bound = upper_bound.into();
        for bound in [&lower_bound, &upper_bound] {
            if !is_constant(bound)? {
                return Err(EsmError::Validation(format!(
                    "The bounds of a constraint should not contain variables, {} was given.",
                    print_expr(bound)
                )));
            }
        }
        if lower_bound.as_literal() == Some(f64::INFINITY) {
            return Err(EsmError::Validation("Lower bound should not be +Inf".into()));
        }
        if upper_bound.as_literal() == Some(f64::NEG_INFINITY) {
            return Err(EsmError::Validation("Upper bound should not be -Inf".into()));
        }
        Ok(Self {
            name: name.to_string(),
            expression,
            lower_bound,
            upper_bound,
            context: ProblemContext::Operational,
        })
    }

    /// Expression bounded below only
    pub fn lower_bounded(
        name: &str,
        expression: LinearExpression,
        lower_bound: impl Into<ExpressionNode>,
    ) -> EsmResult<Self> {
        Self::with_bounds(name, expression, lower_bound, literal(f64::INFINITY))
    }

    /// Expression bounded above only
    pub fn upper_bounded(
        name: &str,
        expression: LinearExpression,
        upper_bound: impl Into<ExpressionNode>,
    ) -> EsmResult<Self> {
        Self::with_bounds(name, expression, literal(f64::NEG_INFINITY), upper_bound)
    }

    pub fn with_context(mut self, context: ProblemContext) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{param, var};

    #[test]
    fn test_from_comparison() {
        let c = Constraint::new(
            "max_generation",
            var("generation").le(param("p_max")).expect("constant rhs"),
        );
        assert_eq!(c.lower_bound, literal(f64::NEG_INFINITY));
        assert_eq!(c.upper_bound, literal(0.0));
        assert_eq!(c.context, ProblemContext::Operational);
    }

    #[test]
    fn test_explicit_bounds() {
        let c = Constraint::with_bounds("range", var("x"), param("min"), param("max"))
            .expect("parameter bounds");
        assert_eq!(c.lower_bound, param("min"));
    }

    #[test]
    fn test_infinite_bounds_rejected() {
        let err = Constraint::with_bounds("c", var("x"), f64::INFINITY, 1.0).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Lower bound should not be +Inf");
        let err = Constraint::upper_bounded("c", var("x"), f64::NEG_INFINITY).unwrap_err();
        assert!(err.to_string().contains("Upper bound should not be -Inf"));
    }

    #[test]
    fn test_port_field_bound_rejected() {
        let bound = ExpressionNode::PortField {
            port_name: "p".into(),
            field_name: "f".into(),
        };
        let err = Constraint::lower_bounded("c", var("x"), bound).unwrap_err();
        assert!(err.to_string().contains("should not contain variables, p.f was given."));
    }
}

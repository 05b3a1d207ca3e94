//! Polynomial degree of expression trees with respect to decision variables
//!
//! Only port fields stand for variables inside a node tree (variables
//! themselves live in linear expression terms), so literals and parameters
//! have degree 0 and port fields degree 1.

use super::node::{
    Comparator, ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};
use super::visitor::{visit, ExpressionVisitor};
use crate::error::{EsmError, EsmResult};

struct ExpressionDegreeVisitor;

impl ExpressionVisitor for ExpressionDegreeVisitor {
    type Output = EsmResult<usize>;

    fn literal(&mut self, _value: f64) -> EsmResult<usize> {
        Ok(0)
    }

    fn parameter(&mut self, _name: &str) -> EsmResult<usize> {
        Ok(0)
    }

    fn comp_parameter(&mut self, _component_id: &str, _name: &str) -> EsmResult<usize> {
        Ok(0)
    }

    fn negation(&mut self, operand: &ExpressionNode) -> EsmResult<usize> {
        visit(operand, self)
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> EsmResult<usize> {
        Ok(visit(left, self)?.max(visit(right, self)?))
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> EsmResult<usize> {
        Ok(visit(left, self)?.max(visit(right, self)?))
    }

    fn multiplication(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
    ) -> EsmResult<usize> {
        Ok(visit(left, self)? + visit(right, self)?)
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> EsmResult<usize> {
        if visit(right, self)? > 0 {
            return Err(EsmError::Degree(
                "Degree computation not implemented for divisions involving variables".into(),
            ));
        }
        visit(left, self)
    }

    fn comparison(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        _comparator: Comparator,
    ) -> EsmResult<usize> {
        Ok(visit(left, self)?.max(visit(right, self)?))
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        _operator: TimeOperatorName,
        _instances_index: &InstancesTimeIndex,
    ) -> EsmResult<usize> {
        visit(operand, self)
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        _stay_roll: bool,
    ) -> EsmResult<usize> {
        visit(operand, self)
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: ScenarioOperatorName,
    ) -> EsmResult<usize> {
        Ok(operator.degree() * visit(operand, self)?)
    }

    fn port_field(&mut self, _port_name: &str, _field_name: &str) -> EsmResult<usize> {
        Ok(1)
    }

    fn port_field_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> EsmResult<usize> {
        visit(operand, self)
    }
}

pub fn compute_degree(expression: &ExpressionNode) -> EsmResult<usize> {
    visit(expression, &mut ExpressionDegreeVisitor)
}

pub fn is_constant(expression: &ExpressionNode) -> EsmResult<bool> {
    Ok(compute_degree(expression)? == 0)
}

pub fn is_linear(expression: &ExpressionNode) -> EsmResult<bool> {
    Ok(compute_degree(expression)? <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::node::{param, ExpressionNode};

    fn node(result: EsmResult<ExpressionNode>) -> ExpressionNode {
        result.expect("arithmetic")
    }

    fn port() -> ExpressionNode {
        ExpressionNode::PortField {
            port_name: "balance".into(),
            field_name: "flow".into(),
        }
    }

    #[test]
    fn test_degrees() {
        assert_eq!(compute_degree(&node(2.0 * param("p"))).expect("degree"), 0);
        assert_eq!(compute_degree(&node(param("p") * port())).expect("degree"), 1);
        assert_eq!(compute_degree(&node(port() * port())).expect("degree"), 2);
        assert_eq!(compute_degree(&port().variance()).expect("degree"), 2);
        assert_eq!(compute_degree(&port().expec()).expect("degree"), 1);
        assert_eq!(compute_degree(&node(port() / param("p"))).expect("degree"), 1);
    }

    #[test]
    fn test_division_by_variable_rejected() {
        let result = compute_degree(&node(param("p") / port()));
        assert!(matches!(result, Err(EsmError::Degree(_))));
    }

    #[test]
    fn test_linearity() {
        assert!(is_linear(&node(port() + param("p"))).expect("degree"));
        assert!(!is_linear(&node(port() * port())).expect("degree"));
        assert!(is_constant(&param("p").sum()).expect("degree"));
    }
}

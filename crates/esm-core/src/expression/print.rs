//! Human readable rendering of expression trees, used by `Display`

use super::node::{
    Comparator, ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};
use super::visitor::{visit, ExpressionVisitor};

struct PrinterVisitor;

impl PrinterVisitor {
    fn instances(&mut self, index: &InstancesTimeIndex) -> String {
        match index {
            InstancesTimeIndex::List(expressions) => {
                let items: Vec<String> = expressions.iter().map(|e| visit(e, self)).collect();
                format!("[{}]", items.join(", "))
            }
            InstancesTimeIndex::Range(range) => {
                let start = visit(&range.start, self);
                let stop = visit(&range.stop, self);
                match &range.step {
                    Some(step) => format!("{}..{}..{}", start, stop, visit(step, self)),
                    None => format!("{}..{}", start, stop),
                }
            }
        }
    }
}

impl ExpressionVisitor for PrinterVisitor {
    type Output = String;

    fn literal(&mut self, value: f64) -> String {
        value.to_string()
    }

    fn parameter(&mut self, name: &str) -> String {
        name.to_string()
    }

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> String {
        format!("{}.{}", component_id, name)
    }

    fn negation(&mut self, operand: &ExpressionNode) -> String {
        format!("-({})", visit(operand, self))
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> String {
        format!("({} + {})", visit(left, self), visit(right, self))
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> String {
        format!("({} - {})", visit(left, self), visit(right, self))
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> String {
        format!("({} * {})", visit(left, self), visit(right, self))
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> String {
        format!("({} / {})", visit(left, self), visit(right, self))
    }

    fn comparison(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        comparator: Comparator,
    ) -> String {
        let op = match comparator {
            Comparator::LessThan => "<=",
            Comparator::Equal => "==",
            Comparator::GreaterThan => ">=",
        };
        format!("{} {} {}", visit(left, self), op, visit(right, self))
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: TimeOperatorName,
        instances_index: &InstancesTimeIndex,
    ) -> String {
        let name = match operator {
            TimeOperatorName::Shift => "shift",
            TimeOperatorName::Evaluation => "eval",
        };
        let operand = visit(operand, self);
        format!("({}.{}({}))", operand, name, self.instances(instances_index))
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        _stay_roll: bool,
    ) -> String {
        format!("({}.sum())", visit(operand, self))
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: ScenarioOperatorName,
    ) -> String {
        let name = match operator {
            ScenarioOperatorName::Expectation => "expec",
            ScenarioOperatorName::Variance => "variance",
        };
        format!("({}.{}())", visit(operand, self), name)
    }

    fn port_field(&mut self, port_name: &str, field_name: &str) -> String {
        format!("{}.{}", port_name, field_name)
    }

    fn port_field_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> String {
        format!("({}.sum_connections())", visit(operand, self))
    }
}

pub fn print_expr(expression: &ExpressionNode) -> String {
    visit(expression, &mut PrinterVisitor)
}

#[cfg(test)]
mod tests {
    use crate::expression::node::{comp_param, param};

    #[test]
    fn test_print_nested_expression() {
        let scaled = (2.0 * param("p")).expect("mul");
        let expr = (scaled + comp_param("gen", "cost")).expect("add").shift(-1).sum();
        assert_eq!(expr.to_string(), "((((2 * p) + gen.cost).shift([-1])).sum())");
    }
}

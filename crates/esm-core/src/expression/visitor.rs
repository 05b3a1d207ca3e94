//! Visitor dispatch over expression trees
//!
//! Each analysis over an [`ExpressionNode`] (printing, degree, indexing,
//! evaluation, context association, definition checks) implements
//! [`ExpressionVisitor`] and is driven by [`visit`]. Visitors recurse by calling
//! [`visit`] on the operands they care about, so they control traversal order
//! and may short-circuit.

use super::node::{
    Comparator, ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};

/// Handler for every expression node variant
pub trait ExpressionVisitor {
    type Output;

    fn literal(&mut self, value: f64) -> Self::Output;

    fn parameter(&mut self, name: &str) -> Self::Output;

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> Self::Output;

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output;

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output;

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output;

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output;

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output;

    fn comparison(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        comparator: Comparator,
    ) -> Self::Output;

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: TimeOperatorName,
        instances_index: &InstancesTimeIndex,
    ) -> Self::Output;

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        aggregator: TimeAggregatorName,
        stay_roll: bool,
    ) -> Self::Output;

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: ScenarioOperatorName,
    ) -> Self::Output;

    fn port_field(&mut self, port_name: &str, field_name: &str) -> Self::Output;

    fn port_field_aggregator(
        &mut self,
        operand: &ExpressionNode,
        aggregator: PortFieldAggregatorName,
    ) -> Self::Output;
}

/// Dispatches `node` to the matching handler of `visitor`.
pub fn visit<V: ExpressionVisitor + ?Sized>(node: &ExpressionNode, visitor: &mut V) -> V::Output {
    match node {
        ExpressionNode::Literal(value) => visitor.literal(*value),
        ExpressionNode::Parameter(name) => visitor.parameter(name),
        ExpressionNode::ComponentParameter { component_id, name } => {
            visitor.comp_parameter(component_id, name)
        }
        ExpressionNode::Negation(operand) => visitor.negation(operand),
        ExpressionNode::Addition(left, right) => visitor.addition(left, right),
        ExpressionNode::Subtraction(left, right) => visitor.subtraction(left, right),
        ExpressionNode::Multiplication(left, right) => visitor.multiplication(left, right),
        ExpressionNode::Division(left, right) => visitor.division(left, right),
        ExpressionNode::Comparison {
            left,
            right,
            comparator,
        } => visitor.comparison(left, right, *comparator),
        ExpressionNode::TimeOperator {
            operand,
            operator,
            instances_index,
        } => visitor.time_operator(operand, *operator, instances_index),
        ExpressionNode::TimeAggregator {
            operand,
            aggregator,
            stay_roll,
        } => visitor.time_aggregator(operand, *aggregator, *stay_roll),
        ExpressionNode::ScenarioOperator { operand, operator } => {
            visitor.scenario_operator(operand, *operator)
        }
        ExpressionNode::PortField {
            port_name,
            field_name,
        } => visitor.port_field(port_name, field_name),
        ExpressionNode::PortFieldAggregator {
            operand,
            aggregator,
        } => visitor.port_field_aggregator(operand, *aggregator),
    }
}

//! Association of model-level expressions to a component
//!
//! Model templates refer to parameters by bare name. Once instantiated for a
//! component, every bare [`ExpressionNode::Parameter`] becomes a
//! [`ExpressionNode::ComponentParameter`] carrying the component id.

use std::sync::Arc;

use super::node::{
    Comparator, ExpressionNode, ExpressionRange, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};
use super::visitor::{visit, ExpressionVisitor};
use crate::error::{EsmError, EsmResult};

/// Copies a tree, qualifying bare parameters with `component_id`.
///
/// In strict mode an already qualified parameter is an error. The lenient mode
/// keeps it unchanged; it is used on expressions that mix the component's own
/// tree with contributions substituted from connected ports.
pub(crate) struct ComponentAdder<'a> {
    component_id: &'a str,
    strict: bool,
}

impl<'a> ComponentAdder<'a> {
    pub(crate) fn strict(component_id: &'a str) -> Self {
        Self {
            component_id,
            strict: true,
        }
    }

    pub(crate) fn lenient(component_id: &'a str) -> Self {
        Self {
            component_id,
            strict: false,
        }
    }

    fn binary(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
    ) -> EsmResult<(Arc<ExpressionNode>, Arc<ExpressionNode>)> {
        Ok((Arc::new(visit(left, self)?), Arc::new(visit(right, self)?)))
    }

    pub(crate) fn instances_index(
        &mut self,
        index: &InstancesTimeIndex,
    ) -> EsmResult<InstancesTimeIndex> {
        Ok(match index {
            InstancesTimeIndex::List(expressions) => InstancesTimeIndex::List(
                expressions
                    .iter()
                    .map(|e| visit(e, self))
                    .collect::<EsmResult<Vec<_>>>()?,
            ),
            InstancesTimeIndex::Range(range) => InstancesTimeIndex::Range(ExpressionRange {
                start: Arc::new(visit(&range.start, self)?),
                stop: Arc::new(visit(&range.stop, self)?),
                step: match &range.step {
                    Some(step) => Some(Arc::new(visit(step, self)?)),
                    None => None,
                },
            }),
        })
    }
}

impl ExpressionVisitor for ComponentAdder<'_> {
    type Output = EsmResult<ExpressionNode>;

    fn literal(&mut self, value: f64) -> Self::Output {
        Ok(ExpressionNode::Literal(value))
    }

    fn parameter(&mut self, name: &str) -> Self::Output {
        Ok(ExpressionNode::ComponentParameter {
            component_id: self.component_id.to_string(),
            name: name.to_string(),
        })
    }

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> Self::Output {
        if self.strict {
            return Err(EsmError::Resolution(
                "This expression has already been associated to another component.".into(),
            ));
        }
        Ok(ExpressionNode::ComponentParameter {
            component_id: component_id.to_string(),
            name: name.to_string(),
        })
    }

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output {
        Ok(ExpressionNode::Negation(Arc::new(visit(operand, self)?)))
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        let (l, r) = self.binary(left, right)?;
        Ok(ExpressionNode::Addition(l, r))
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        let (l, r) = self.binary(left, right)?;
        Ok(ExpressionNode::Subtraction(l, r))
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        let (l, r) = self.binary(left, right)?;
        Ok(ExpressionNode::Multiplication(l, r))
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        let (l, r) = self.binary(left, right)?;
        Ok(ExpressionNode::Division(l, r))
    }

    fn comparison(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        comparator: Comparator,
    ) -> Self::Output {
        let (left, right) = self.binary(left, right)?;
        Ok(ExpressionNode::Comparison {
            left,
            right,
            comparator,
        })
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: TimeOperatorName,
        instances_index: &InstancesTimeIndex,
    ) -> Self::Output {
        Ok(ExpressionNode::TimeOperator {
            operand: Arc::new(visit(operand, self)?),
            operator,
            instances_index: self.instances_index(instances_index)?,
        })
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        aggregator: TimeAggregatorName,
        stay_roll: bool,
    ) -> Self::Output {
        Ok(ExpressionNode::TimeAggregator {
            operand: Arc::new(visit(operand, self)?),
            aggregator,
            stay_roll,
        })
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: ScenarioOperatorName,
    ) -> Self::Output {
        Ok(ExpressionNode::ScenarioOperator {
            operand: Arc::new(visit(operand, self)?),
            operator,
        })
    }

    fn port_field(&mut self, port_name: &str, field_name: &str) -> Self::Output {
        Ok(ExpressionNode::PortField {
            port_name: port_name.to_string(),
            field_name: field_name.to_string(),
        })
    }

    fn port_field_aggregator(
        &mut self,
        operand: &ExpressionNode,
        aggregator: PortFieldAggregatorName,
    ) -> Self::Output {
        Ok(ExpressionNode::PortFieldAggregator {
            operand: Arc::new(visit(operand, self)?),
            aggregator,
        })
    }
}

/// Qualifies every bare parameter of `expression` with `component_id`.
///
/// Fails when the tree already references a component parameter.
pub fn add_component_context(
    component_id: &str,
    expression: &ExpressionNode,
) -> EsmResult<ExpressionNode> {
    visit(expression, &mut ComponentAdder::strict(component_id))
}

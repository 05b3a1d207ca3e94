//! Ports: typed interfaces through which components exchange expressions

use serde::{Deserialize, Serialize};

use crate::error::{EsmError, EsmResult};
use crate::expression::{
    visit, Comparator, ExpressionNode, ExpressionVisitor, InstancesTimeIndex, LinearExpression,
    PortFieldAggregatorName, PortFieldId, ScenarioOperatorName, TimeAggregatorName,
    TimeOperatorName,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortField {
    pub name: String,
}

/// Set of fields shared by all ports of this type.
///
/// Only ports of the same type can be connected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortType {
    pub id: String,
    pub fields: Vec<PortField>,
}

impl PortType {
    pub fn new(id: &str, fields: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            fields: fields
                .iter()
                .map(|name| PortField {
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// A port carried by a model. A model may own several ports of one type,
/// like the two ends of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelPort {
    pub port_type: PortType,
    pub port_name: String,
}

impl ModelPort {
    pub fn new(port_type: &PortType, port_name: &str) -> Self {
        Self {
            port_type: port_type.clone(),
            port_name: port_name.to_string(),
        }
    }
}

/// Value a model gives to one of its port fields
#[derive(Debug, Clone, PartialEq)]
pub struct PortFieldDefinition {
    pub port_field: PortFieldId,
    pub definition: LinearExpression,
}

impl PortFieldDefinition {
    /// Fails if the definition references ports or another component.
    pub fn new(port_field: PortFieldId, definition: LinearExpression) -> EsmResult<Self> {
        validate_port_field_expression(&definition)?;
        Ok(Self {
            port_field,
            definition,
        })
    }
}

pub fn port_field_def(
    port_name: &str,
    field_name: &str,
    definition: LinearExpression,
) -> EsmResult<PortFieldDefinition> {
    PortFieldDefinition::new(PortFieldId::new(port_name, field_name), definition)
}

struct PortFieldExpressionChecker;

impl ExpressionVisitor for PortFieldExpressionChecker {
    type Output = EsmResult<()>;

    fn literal(&mut self, _value: f64) -> Self::Output {
        Ok(())
    }

    fn parameter(&mut self, _name: &str) -> Self::Output {
        Ok(())
    }

    fn comp_parameter(&mut self, _component_id: &str, _name: &str) -> Self::Output {
        Err(EsmError::Validation(
            "Port definition must not contain a parameter associated to a component.".into(),
        ))
    }

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output {
        visit(operand, self)
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        visit(left, self)?;
        visit(right, self)
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        visit(left, self)?;
        visit(right, self)
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        visit(left, self)?;
        visit(right, self)
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        visit(left, self)?;
        visit(right, self)
    }

    fn comparison(
        &mut self,
        _left: &ExpressionNode,
        _right: &ExpressionNode,
        _comparator: Comparator,
    ) -> Self::Output {
        Err(EsmError::Validation(
            "Port definition cannot contain a comparison operator.".into(),
        ))
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        _operator: TimeOperatorName,
        _instances_index: &InstancesTimeIndex,
    ) -> Self::Output {
        visit(operand, self)
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        _stay_roll: bool,
    ) -> Self::Output {
        visit(operand, self)
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        _operator: ScenarioOperatorName,
    ) -> Self::Output {
        visit(operand, self)
    }

    fn port_field(&mut self, _port_name: &str, _field_name: &str) -> Self::Output {
        Err(EsmError::Validation(
            "Port definition cannot reference another port field.".into(),
        ))
    }

    fn port_field_aggregator(
        &mut self,
        _operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> Self::Output {
        Err(EsmError::Validation(
            "Port definition cannot contain port field aggregation.".into(),
        ))
    }
}

fn validate_port_field_expression(definition: &LinearExpression) -> EsmResult<()> {
    if !definition.port_field_terms.is_empty() {
        return Err(EsmError::Validation(
            "Port definition cannot reference another port field.".into(),
        ));
    }
    for term in definition.terms.values() {
        if !term.component_id.is_empty() {
            return Err(EsmError::Validation(
                "Port definition must not contain a variable associated to a component.".into(),
            ));
        }
        visit(&term.coefficient, &mut PortFieldExpressionChecker)?;
    }
    visit(&definition.constant, &mut PortFieldExpressionChecker)
}

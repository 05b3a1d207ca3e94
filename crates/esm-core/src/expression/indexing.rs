//! Time and scenario indexing of expressions
//!
//! An [`IndexingStructure`] says whether a value varies along the time axis,
//! the scenario axis, or both. The structure of an expression decides how many
//! rows the problem builder instantiates for it.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::node::{
    Comparator, ExpressionNode, InstancesTimeIndex, PortFieldAggregatorName,
    ScenarioOperatorName, TimeAggregatorName, TimeOperatorName,
};
use super::visitor::{visit, ExpressionVisitor};
use crate::error::{EsmError, EsmResult};

/// Whether a value depends on time and/or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexingStructure {
    pub time: bool,
    pub scenario: bool,
}

impl IndexingStructure {
    pub const fn new(time: bool, scenario: bool) -> Self {
        Self { time, scenario }
    }

    pub fn is_time_scenario_varying(&self) -> bool {
        self.time && self.scenario
    }

    pub fn is_constant(&self) -> bool {
        !self.time && !self.scenario
    }
}

impl Default for IndexingStructure {
    fn default() -> Self {
        TIME_AND_SCENARIO_FREE
    }
}

impl BitOr for IndexingStructure {
    type Output = IndexingStructure;

    fn bitor(self, rhs: IndexingStructure) -> IndexingStructure {
        IndexingStructure::new(self.time || rhs.time, self.scenario || rhs.scenario)
    }
}

/// Same value for every timestep and scenario
pub const CONSTANT: IndexingStructure = IndexingStructure::new(false, false);
/// Varies over time and scenarios
pub const TIME_AND_SCENARIO_FREE: IndexingStructure = IndexingStructure::new(true, true);
/// Varies over time and scenarios; decisions may depend on the realized
/// scenario
pub const ANTICIPATIVE_TIME_VARYING: IndexingStructure = IndexingStructure::new(true, true);
/// Varies over time only
pub const NON_ANTICIPATIVE_TIME_VARYING: IndexingStructure = IndexingStructure::new(true, false);
/// Varies over scenarios only
pub const CONSTANT_PER_SCENARIO: IndexingStructure = IndexingStructure::new(false, true);

/// A (timestep, scenario) row of an instantiated expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RowIndex {
    pub time: usize,
    pub scenario: usize,
}

impl RowIndex {
    pub fn new(time: usize, scenario: usize) -> Self {
        Self { time, scenario }
    }
}

/// Answers the indexing structure of named parameters and variables.
pub trait IndexingStructureProvider {
    fn get_parameter_structure(&self, name: &str) -> EsmResult<IndexingStructure>;

    fn get_variable_structure(&self, name: &str) -> EsmResult<IndexingStructure>;

    fn get_component_parameter_structure(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<IndexingStructure>;

    fn get_component_variable_structure(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<IndexingStructure>;
}

struct TimeScenarioIndexingVisitor<'a, P: IndexingStructureProvider + ?Sized> {
    context: &'a P,
}

impl<P: IndexingStructureProvider + ?Sized> TimeScenarioIndexingVisitor<'_, P> {
    fn combine(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
    ) -> EsmResult<IndexingStructure> {
        let left = visit(left, self)?;
        if left.is_time_scenario_varying() {
            return Ok(left);
        }
        Ok(left | visit(right, self)?)
    }
}

impl<P: IndexingStructureProvider + ?Sized> ExpressionVisitor
    for TimeScenarioIndexingVisitor<'_, P>
{
    type Output = EsmResult<IndexingStructure>;

    fn literal(&mut self, _value: f64) -> Self::Output {
        Ok(CONSTANT)
    }

    fn parameter(&mut self, name: &str) -> Self::Output {
        self.context.get_parameter_structure(name)
    }

    fn comp_parameter(&mut self, component_id: &str, name: &str) -> Self::Output {
        self.context
            .get_component_parameter_structure(component_id, name)
    }

    fn negation(&mut self, operand: &ExpressionNode) -> Self::Output {
        visit(operand, self)
    }

    fn addition(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right)
    }

    fn subtraction(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right)
    }

    fn multiplication(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right)
    }

    fn division(&mut self, left: &ExpressionNode, right: &ExpressionNode) -> Self::Output {
        self.combine(left, right)
    }

    fn comparison(
        &mut self,
        left: &ExpressionNode,
        right: &ExpressionNode,
        _comparator: Comparator,
    ) -> Self::Output {
        self.combine(left, right)
    }

    fn time_operator(
        &mut self,
        operand: &ExpressionNode,
        operator: TimeOperatorName,
        _instances_index: &InstancesTimeIndex,
    ) -> Self::Output {
        let structure = visit(operand, self)?;
        Ok(IndexingStructure::new(
            operator.rolling() && structure.time,
            structure.scenario,
        ))
    }

    fn time_aggregator(
        &mut self,
        operand: &ExpressionNode,
        _aggregator: TimeAggregatorName,
        stay_roll: bool,
    ) -> Self::Output {
        let structure = visit(operand, self)?;
        Ok(IndexingStructure::new(
            stay_roll && structure.time,
            structure.scenario,
        ))
    }

    fn scenario_operator(
        &mut self,
        operand: &ExpressionNode,
        _operator: ScenarioOperatorName,
    ) -> Self::Output {
        let structure = visit(operand, self)?;
        Ok(IndexingStructure::new(structure.time, false))
    }

    fn port_field(&mut self, port_name: &str, field_name: &str) -> Self::Output {
        Err(EsmError::UnsupportedNode(format!(
            "Port fields must be resolved before computing indexing structure: {}.{}",
            port_name, field_name
        )))
    }

    fn port_field_aggregator(
        &mut self,
        _operand: &ExpressionNode,
        _aggregator: PortFieldAggregatorName,
    ) -> Self::Output {
        Err(EsmError::UnsupportedNode(
            "Port fields aggregators must be resolved before computing indexing structure".into(),
        ))
    }
}

/// Indexing structure of a node tree
pub fn compute_indexation<P: IndexingStructureProvider + ?Sized>(
    expression: &ExpressionNode,
    provider: &P,
) -> EsmResult<IndexingStructure> {
    visit(
        expression,
        &mut TimeScenarioIndexingVisitor { context: provider },
    )
}

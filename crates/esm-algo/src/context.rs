//! State shared by everything instantiating one block of the study
//!
//! The context owns the variable registry and the expressions feeding each
//! connected port field, and answers parameter values and indexing
//! structures for component-associated expressions from the network and the
//! database.

use std::collections::HashMap;
use std::ops::Range;

use esm_core::data::DataBase;
use esm_core::expression::{PortFieldId, PortFieldKey};
use esm_core::{
    EsmError, EsmResult, IndexingStructure, IndexingStructureProvider, LinearExpression, Network,
    TimeScenarioIndex, ValueProvider,
};
use serde::{Deserialize, Serialize};

use crate::time_block::TimeBlock;

/// What a time index outside `0..block_length` designates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockBorderManagement {
    /// Reserved: out-of-frame indices are rejected.
    IgnoreOutOfFrame,
    /// Indices wrap around the block, `-1` is the last timestep.
    #[default]
    Cycle,
}

/// Handle of a solver variable, its position in the problem's variable list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub usize);

impl VariableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TimestepComponentVariableKey {
    component_id: String,
    variable_name: String,
    block_timestep: usize,
    scenario: usize,
}

pub struct OptimizationContext<'a> {
    network: &'a Network,
    database: &'a DataBase,
    block: TimeBlock,
    scenarios: usize,
    border_management: BlockBorderManagement,
    component_variables: HashMap<TimestepComponentVariableKey, VariableId>,
    connection_fields_expressions: HashMap<PortFieldKey, Vec<LinearExpression>>,
}

impl<'a> OptimizationContext<'a> {
    pub fn new(
        network: &'a Network,
        database: &'a DataBase,
        block: TimeBlock,
        scenarios: usize,
        border_management: BlockBorderManagement,
    ) -> Self {
        Self {
            network,
            database,
            block,
            scenarios,
            border_management,
            component_variables: HashMap::new(),
            connection_fields_expressions: HashMap::new(),
        }
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn database(&self) -> &'a DataBase {
        self.database
    }

    pub fn block(&self) -> &TimeBlock {
        &self.block
    }

    pub fn border_management(&self) -> BlockBorderManagement {
        self.border_management
    }

    /// Every block timestep when time-varying, only `0` otherwise
    pub fn get_time_indices(&self, structure: IndexingStructure) -> Range<usize> {
        if structure.time {
            0..self.block.len()
        } else {
            0..1
        }
    }

    /// Every scenario when scenario-varying, only `0` otherwise
    pub fn get_scenario_indices(&self, structure: IndexingStructure) -> Range<usize> {
        if structure.scenario {
            0..self.scenarios
        } else {
            0..1
        }
    }

    /// Maps a possibly out-of-frame time index into the block.
    pub fn manage_border(&self, time: i64) -> EsmResult<usize> {
        let length = self.block.len() as i64;
        if length == 0 {
            return Err(EsmError::Validation(format!(
                "Time block {} has no timestep",
                self.block.id
            )));
        }
        match self.border_management {
            BlockBorderManagement::Cycle => Ok(time.rem_euclid(length) as usize),
            BlockBorderManagement::IgnoreOutOfFrame if (0..length).contains(&time) => {
                Ok(time as usize)
            }
            BlockBorderManagement::IgnoreOutOfFrame => Err(EsmError::NotImplemented(format!(
                "Time index {} is outside of block {} and out-of-frame indices cannot be ignored yet",
                time, self.block.id
            ))),
        }
    }

    pub fn block_timestep_to_absolute(&self, block_timestep: usize) -> EsmResult<usize> {
        self.block
            .timesteps
            .get(block_timestep)
            .copied()
            .ok_or_else(|| {
                EsmError::MissingKey(format!(
                    "Timestep {} of block {}",
                    block_timestep, self.block.id
                ))
            })
    }

    pub fn register_component_variable(
        &mut self,
        block_timestep: usize,
        scenario: usize,
        component_id: &str,
        variable_name: &str,
        variable: VariableId,
    ) {
        let key = TimestepComponentVariableKey {
            component_id: component_id.to_string(),
            variable_name: variable_name.to_string(),
            block_timestep,
            scenario,
        };
        self.component_variables.insert(key, variable);
    }

    /// Solver variable of `component_id.variable_name` at `(time, scenario)`.
    ///
    /// `time` goes through border management first; axes the variable does
    /// not depend on are looked up at index 0.
    pub fn get_component_variable(
        &self,
        time: i64,
        scenario: usize,
        component_id: &str,
        variable_name: &str,
    ) -> EsmResult<VariableId> {
        let structure = self
            .network
            .get_component(component_id)?
            .model
            .variable(variable_name)?
            .structure;
        let block_timestep = if structure.time {
            self.manage_border(time)?
        } else {
            0
        };
        let scenario = if structure.scenario { scenario } else { 0 };
        let key = TimestepComponentVariableKey {
            component_id: component_id.to_string(),
            variable_name: variable_name.to_string(),
            block_timestep,
            scenario,
        };
        self.component_variables.get(&key).copied().ok_or_else(|| {
            EsmError::MissingKey(format!(
                "Variable {}.{} at t={}, s={} is not part of the problem",
                component_id, variable_name, block_timestep, scenario
            ))
        })
    }

    pub fn register_connection_fields_expressions(
        &mut self,
        component_id: &str,
        port_name: &str,
        field_name: &str,
        expression: LinearExpression,
    ) {
        let key = PortFieldKey::new(component_id, PortFieldId::new(port_name, field_name));
        self.connection_fields_expressions
            .entry(key)
            .or_default()
            .push(expression);
    }

    pub fn connection_fields_expressions(&self) -> &HashMap<PortFieldKey, Vec<LinearExpression>> {
        &self.connection_fields_expressions
    }

    fn component_parameter_structure(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<IndexingStructure> {
        Ok(self
            .network
            .get_component(component_id)?
            .model
            .parameter(name)?
            .structure)
    }
}

fn not_associated(kind: &str, name: &str) -> EsmError {
    EsmError::Resolution(format!(
        "{} {} must be associated to its component before resolution",
        kind, name
    ))
}

impl ValueProvider for OptimizationContext<'_> {
    fn get_parameter_value(
        &self,
        name: &str,
        _indices: &[TimeScenarioIndex],
    ) -> EsmResult<Vec<f64>> {
        Err(not_associated("Parameter", name))
    }

    fn get_component_parameter_value(
        &self,
        component_id: &str,
        name: &str,
        indices: &[TimeScenarioIndex],
    ) -> EsmResult<Vec<f64>> {
        let structure = self.component_parameter_structure(component_id, name)?;
        let data = self.database.get_data(component_id, name)?;
        indices
            .iter()
            .map(|index| {
                let block_timestep = if structure.time {
                    self.manage_border(index.time)?
                } else {
                    0
                };
                let scenario = if structure.scenario { index.scenario } else { 0 };
                data.get_value(self.block_timestep_to_absolute(block_timestep)?, scenario)
            })
            .collect()
    }

    fn parameter_is_constant_over_time(&self, name: &str) -> EsmResult<bool> {
        Err(not_associated("Parameter", name))
    }

    fn component_parameter_is_constant_over_time(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<bool> {
        Ok(!self.component_parameter_structure(component_id, name)?.time)
    }

    fn block_length(&self) -> usize {
        self.block.len()
    }

    fn scenarios(&self) -> usize {
        self.scenarios
    }
}

impl IndexingStructureProvider for OptimizationContext<'_> {
    fn get_parameter_structure(&self, name: &str) -> EsmResult<IndexingStructure> {
        Err(not_associated("Parameter", name))
    }

    fn get_variable_structure(&self, name: &str) -> EsmResult<IndexingStructure> {
        Err(not_associated("Variable", name))
    }

    fn get_component_parameter_structure(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<IndexingStructure> {
        self.component_parameter_structure(component_id, name)
    }

    fn get_component_variable_structure(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<IndexingStructure> {
        Ok(self
            .network
            .get_component(component_id)?
            .model
            .variable(name)?
            .structure)
    }
}

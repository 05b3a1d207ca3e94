//! Parameter values of network components

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EsmError, EsmResult};
use crate::network::Network;

/// Values of one parameter, possibly varying over time and/or scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStructure {
    Constant(f64),
    /// One value per timestep
    TimeSeries(Vec<f64>),
    /// One value per scenario
    ScenarioSeries(Vec<f64>),
    /// `values[timestep][scenario]`
    TimeScenarioSeries(Vec<Vec<f64>>),
}

impl DataStructure {
    pub fn get_value(&self, timestep: usize, scenario: usize) -> EsmResult<f64> {
        let value = match self {
            DataStructure::Constant(value) => Some(*value),
            DataStructure::TimeSeries(values) => values.get(timestep).copied(),
            DataStructure::ScenarioSeries(values) => values.get(scenario).copied(),
            DataStructure::TimeScenarioSeries(values) => values
                .get(timestep)
                .and_then(|row| row.get(scenario))
                .copied(),
        };
        value.ok_or_else(|| {
            EsmError::MissingKey(format!(
                "No data at timestep {}, scenario {}",
                timestep, scenario
            ))
        })
    }

    /// Whether this data can feed a parameter with the given structure.
    ///
    /// Constant data fits any parameter; series only fit parameters varying
    /// along their axes.
    pub fn check_requirement(&self, time: bool, scenario: bool) -> bool {
        match self {
            DataStructure::Constant(_) => true,
            DataStructure::TimeSeries(_) => time,
            DataStructure::ScenarioSeries(_) => scenario,
            DataStructure::TimeScenarioSeries(_) => time && scenario,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentParameterIndex {
    pub component_id: String,
    pub parameter_name: String,
}

impl ComponentParameterIndex {
    pub fn new(component_id: &str, parameter_name: &str) -> Self {
        Self {
            component_id: component_id.to_string(),
            parameter_name: parameter_name.to_string(),
        }
    }
}

/// Data of every component parameter, keyed by component and parameter name
#[derive(Debug, Clone, Default)]
pub struct DataBase {
    data: HashMap<ComponentParameterIndex, DataStructure>,
}

impl DataBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data(&mut self, component_id: &str, parameter_name: &str, data: DataStructure) {
        self.data
            .insert(ComponentParameterIndex::new(component_id, parameter_name), data);
    }

    pub fn get_data(&self, component_id: &str, parameter_name: &str) -> EsmResult<&DataStructure> {
        self.data
            .get(&ComponentParameterIndex::new(component_id, parameter_name))
            .ok_or_else(|| {
                EsmError::MissingKey(format!(
                    "No data for component: {}, parameter: {}",
                    component_id, parameter_name
                ))
            })
    }

    pub fn get_value(
        &self,
        index: &ComponentParameterIndex,
        timestep: usize,
        scenario: usize,
    ) -> EsmResult<f64> {
        self.get_data(&index.component_id, &index.parameter_name)?
            .get_value(timestep, scenario)
    }

    /// Checks every component parameter has data matching its structure.
    pub fn requirements_consistency(&self, network: &Network) -> EsmResult<()> {
        for component in network.all_components() {
            for parameter in component.model.parameters.values() {
                let data = self.get_data(&component.id, &parameter.name)?;
                if !data.check_requirement(parameter.structure.time, parameter.structure.scenario)
                {
                    return Err(EsmError::Validation(format!(
                        "Data inconsistency for component: {}, parameter: {}. Requirement not met.",
                        component.id, parameter.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{CONSTANT, NON_ANTICIPATIVE_TIME_VARYING};
    use crate::model::{float_parameter, ModelBuilder};
    use crate::network::Component;
    use std::sync::Arc;

    #[test]
    fn test_get_value() {
        let series = DataStructure::TimeScenarioSeries(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(series.get_value(1, 0).expect("in range"), 3.0);
        assert_eq!(series.get_value(0, 1).expect("in range"), 2.0);
        assert!(matches!(series.get_value(2, 0), Err(EsmError::MissingKey(_))));

        assert_eq!(DataStructure::Constant(7.0).get_value(99, 99).expect("constant"), 7.0);
        let by_scenario = DataStructure::ScenarioSeries(vec![5.0, 6.0]);
        assert_eq!(by_scenario.get_value(10, 1).expect("scenario 1"), 6.0);
    }

    #[test]
    fn test_requirements() {
        assert!(DataStructure::Constant(1.0).check_requirement(false, false));
        assert!(DataStructure::TimeSeries(vec![]).check_requirement(true, false));
        assert!(!DataStructure::TimeSeries(vec![]).check_requirement(false, true));
        assert!(!DataStructure::TimeScenarioSeries(vec![]).check_requirement(true, false));
    }

    #[test]
    fn test_requirements_consistency() {
        let model = Arc::new(
            ModelBuilder::new("demand")
                .parameter(float_parameter("demand").with_structure(NON_ANTICIPATIVE_TIME_VARYING))
                .parameter(float_parameter("cost").with_structure(CONSTANT))
                .build()
                .expect("model"),
        );
        let mut network = Network::new("test");
        network.add_component(Component::new(model, "D"));

        let mut database = DataBase::new();
        database.add_data("D", "demand", DataStructure::TimeSeries(vec![100.0, 50.0]));
        assert!(matches!(
            database.requirements_consistency(&network),
            Err(EsmError::MissingKey(_))
        ));

        database.add_data("D", "cost", DataStructure::ScenarioSeries(vec![1.0]));
        let err = database.requirements_consistency(&network).unwrap_err();
        assert!(err
            .to_string()
            .contains("Data inconsistency for component: D, parameter: cost"));

        database.add_data("D", "cost", DataStructure::Constant(1.0));
        assert!(database.requirements_consistency(&network).is_ok());
    }
}

//! Parameter values at (timestep, scenario) pairs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EsmResult;

/// A (timestep, scenario) pair reached while evaluating an expression.
///
/// Time is signed: shifted indices may fall outside the block before border
/// management maps them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeScenarioIndex {
    pub time: i64,
    pub scenario: usize,
}

impl TimeScenarioIndex {
    pub fn new(time: i64, scenario: usize) -> Self {
        Self { time, scenario }
    }
}

impl fmt::Display for TimeScenarioIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(t={}, s={})", self.time, self.scenario)
    }
}

/// Maps parameters to their values.
///
/// Implementations return one value per requested index, in the same order.
pub trait ValueProvider {
    fn get_parameter_value(&self, name: &str, indices: &[TimeScenarioIndex])
        -> EsmResult<Vec<f64>>;

    fn get_component_parameter_value(
        &self,
        component_id: &str,
        name: &str,
        indices: &[TimeScenarioIndex],
    ) -> EsmResult<Vec<f64>>;

    /// Only parameters constant over time may appear in time operator arguments.
    fn parameter_is_constant_over_time(&self, name: &str) -> EsmResult<bool>;

    fn component_parameter_is_constant_over_time(
        &self,
        component_id: &str,
        name: &str,
    ) -> EsmResult<bool>;

    /// Number of timesteps summed by a non-rolling time sum
    fn block_length(&self) -> usize;

    /// Number of scenarios averaged by an expectation
    fn scenarios(&self) -> usize;
}

//! Solved variable values, per component and variable
//!
//! Values are keyed by `(block_timestep, scenario)`. Expected results are
//! written with [`OutputVariable::set_value`] and compared with
//! [`OutputValues::is_close`]; anything flagged `ignore` always compares
//! equal.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::error::{SimulationError, SimulationResult};
use crate::problem::OptimizationProblem;
use crate::solver::ProblemSolution;

/// Shape-aware view of a variable's values
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Constant(f64),
    /// One value per scenario
    PerScenario(Vec<f64>),
    /// `values[scenario][timestep]`
    PerScenarioAndTime(Vec<Vec<f64>>),
}

/// `a` and `b` within `max(rel_tol * max(|a|, |b|), abs_tol)` of each other
pub fn is_close(a: f64, b: f64, rel_tol: f64, abs_tol: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= (rel_tol * a.abs().max(b.abs())).max(abs_tol)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputVariable {
    name: String,
    /// Keyed by `(timestep, scenario)`
    values: BTreeMap<(usize, usize), f64>,
    /// `(scenarios, timesteps)`
    size: (usize, usize),
    pub ignore: bool,
}

impl OutputVariable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: BTreeMap::new(),
            size: (0, 0),
            ignore: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, timestep: usize, scenario: usize) -> Option<f64> {
        self.values.get(&(timestep, scenario)).copied()
    }

    pub fn set(&mut self, timestep: usize, scenario: usize, value: f64) {
        self.size = (
            self.size.0.max(scenario + 1),
            self.size.1.max(timestep + 1),
        );
        self.values.insert((timestep, scenario), value);
    }

    /// Replaces all values
    pub fn set_value(&mut self, value: OutputValue) {
        self.values.clear();
        self.size = (0, 0);
        match value {
            OutputValue::Constant(v) => self.set(0, 0, v),
            OutputValue::PerScenario(values) => {
                for (scenario, v) in values.into_iter().enumerate() {
                    self.set(0, scenario, v);
                }
            }
            OutputValue::PerScenarioAndTime(values) => {
                for (scenario, timesteps) in values.into_iter().enumerate() {
                    for (timestep, v) in timesteps.into_iter().enumerate() {
                        self.set(timestep, scenario, v);
                    }
                }
            }
        }
    }

    /// Values shaped by the variable's extent; `None` while empty or when a
    /// `(t, s)` inside the extent is missing.
    pub fn value(&self) -> Option<OutputValue> {
        let (scenarios, timesteps) = self.size;
        match (scenarios, timesteps) {
            (0, _) | (_, 0) => None,
            (1, 1) => self.get(0, 0).map(OutputValue::Constant),
            (_, 1) => (0..scenarios)
                .map(|s| self.get(0, s))
                .collect::<Option<Vec<_>>>()
                .map(OutputValue::PerScenario),
            _ => (0..scenarios)
                .map(|s| (0..timesteps).map(|t| self.get(t, s)).collect())
                .collect::<Option<Vec<Vec<_>>>>()
                .map(OutputValue::PerScenarioAndTime),
        }
    }

    pub fn is_close(&self, other: &OutputVariable, rel_tol: f64, abs_tol: f64) -> bool {
        if self.ignore || other.ignore {
            return true;
        }
        self.name == other.name
            && self.size == other.size
            && self.values.len() == other.values.len()
            && self.values.iter().all(|(key, value)| {
                other
                    .values
                    .get(key)
                    .is_some_and(|o| is_close(*value, *o, rel_tol, abs_tol))
            })
    }
}

impl fmt::Display for OutputVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : ", self.name)?;
        match self.value() {
            Some(OutputValue::Constant(v)) => write!(f, "{}", v)?,
            Some(OutputValue::PerScenario(v)) => write!(f, "{:?}", v)?,
            Some(OutputValue::PerScenarioAndTime(v)) => write!(f, "{:?}", v)?,
            None => write!(f, "{:?}", self.values)?,
        }
        if self.ignore {
            write!(f, " (ignored)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputComponent {
    id: String,
    variables: IndexMap<String, OutputVariable>,
    pub ignore: bool,
}

impl OutputComponent {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            variables: IndexMap::new(),
            ignore: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Variable `name`, created empty on first access
    pub fn var(&mut self, name: &str) -> &mut OutputVariable {
        self.variables
            .entry(name.to_string())
            .or_insert_with(|| OutputVariable::new(name))
    }

    pub fn get_var(&self, name: &str) -> Option<&OutputVariable> {
        self.variables.get(name)
    }

    pub fn is_close(&self, other: &OutputComponent, rel_tol: f64, abs_tol: f64) -> bool {
        if self.ignore || other.ignore {
            return true;
        }
        self.id == other.id
            && mappings_close(
                &self.variables,
                &other.variables,
                |a, b| a.is_close(b, rel_tol, abs_tol),
                |v| v.ignore,
            )
    }
}

impl fmt::Display for OutputComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} :{}", self.id, if self.ignore { " (ignored)" } else { "" })?;
        for variable in self.variables.values() {
            writeln!(f, "  {}", variable)?;
        }
        Ok(())
    }
}

/// Keys on one side only must be ignored; shared keys must be close.
fn mappings_close<T>(
    lhs: &IndexMap<String, T>,
    rhs: &IndexMap<String, T>,
    close: impl Fn(&T, &T) -> bool,
    ignored: impl Fn(&T) -> bool,
) -> bool {
    let only_ignored = |a: &IndexMap<String, T>, b: &IndexMap<String, T>| {
        a.iter()
            .filter(|(key, _)| !b.contains_key(*key))
            .all(|(_, value)| ignored(value))
    };
    only_ignored(lhs, rhs)
        && only_ignored(rhs, lhs)
        && lhs
            .iter()
            .filter_map(|(key, value)| rhs.get(key).map(|other| (value, other)))
            .all(|(a, b)| close(a, b))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputValues {
    components: IndexMap<String, OutputComponent>,
}

impl OutputValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values of every solver variable of `problem`.
    pub fn from_solution(
        problem: &OptimizationProblem,
        solution: &ProblemSolution,
    ) -> SimulationResult<Self> {
        if !solution.is_optimal() {
            return Err(SimulationError::Solver(format!(
                "No values for problem {}: status is {:?}",
                problem.name(),
                solution.status
            )));
        }
        let mut output = Self::new();
        for variable in &problem.problem.variables {
            let value = solution.value(variable.id).ok_or_else(|| {
                SimulationError::Solver(format!("No value for variable {}", variable.name))
            })?;
            output
                .component(&variable.component_id)
                .var(&variable.variable_name)
                .set(variable.block_timestep, variable.scenario, value);
        }
        Ok(output)
    }

    /// Component `id`, created empty on first access
    pub fn component(&mut self, id: &str) -> &mut OutputComponent {
        self.components
            .entry(id.to_string())
            .or_insert_with(|| OutputComponent::new(id))
    }

    pub fn get_component(&self, id: &str) -> Option<&OutputComponent> {
        self.components.get(id)
    }

    pub fn is_close(&self, other: &OutputValues, rel_tol: f64, abs_tol: f64) -> bool {
        mappings_close(
            &self.components,
            &other.components,
            |a, b| a.is_close(b, rel_tol, abs_tol),
            |c| c.ignore,
        )
    }
}

impl fmt::Display for OutputValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in self.components.values() {
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_shapes() {
        let mut variable = OutputVariable::new("generation");
        assert_eq!(variable.value(), None);

        variable.set(0, 0, 1.0);
        assert_eq!(variable.value(), Some(OutputValue::Constant(1.0)));

        variable.set(0, 1, 2.0);
        assert_eq!(variable.value(), Some(OutputValue::PerScenario(vec![1.0, 2.0])));

        variable.set(1, 0, 3.0);
        // (1, 1) is still missing
        assert_eq!(variable.value(), None);
        variable.set(1, 1, 4.0);
        assert_eq!(
            variable.value(),
            Some(OutputValue::PerScenarioAndTime(vec![
                vec![1.0, 3.0],
                vec![2.0, 4.0]
            ]))
        );
    }

    #[test]
    fn test_set_value_matches_incremental_sets() {
        let mut expected = OutputVariable::new("level");
        expected.set_value(OutputValue::PerScenarioAndTime(vec![vec![1.0, 2.0, 3.0]]));
        let mut actual = OutputVariable::new("level");
        for t in 0..3 {
            actual.set(t, 0, (t + 1) as f64 + 1e-12);
        }
        assert!(actual.is_close(&expected, 1e-9, 0.0));
        assert!(!actual.is_close(&expected, 0.0, 0.0));
    }

    #[test]
    fn test_is_close_tolerances() {
        assert!(is_close(100.0, 100.0 + 1e-8, 1e-9, 0.0));
        assert!(!is_close(100.0, 100.1, 1e-9, 0.0));
        assert!(is_close(0.0, 1e-7, 0.0, 1e-6));
        assert!(is_close(f64::INFINITY, f64::INFINITY, 0.0, 0.0));
        assert!(!is_close(f64::INFINITY, 1e300, 1.0, 0.0));
    }

    #[test]
    fn test_ignored_entries() {
        let mut lhs = OutputValues::new();
        lhs.component("G").var("generation").set(0, 0, 100.0);

        let mut rhs = OutputValues::new();
        rhs.component("G").var("generation").set(0, 0, 100.0);
        rhs.component("S").ignore = true;
        assert!(lhs.is_close(&rhs, 1e-9, 0.0));

        rhs.component("U").var("unsupplied_energy").set(0, 0, 0.0);
        assert!(!lhs.is_close(&rhs, 1e-9, 0.0));

        rhs.component("U").var("unsupplied_energy").ignore = true;
        // an ignored variable does not make its component ignored
        assert!(!lhs.is_close(&rhs, 1e-9, 0.0));
        rhs.component("U").ignore = true;
        assert!(lhs.is_close(&rhs, 1e-9, 0.0));
    }
}

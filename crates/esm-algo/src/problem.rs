//! Instantiation of a network over one time block into a linear problem
//!
//! Building runs in four passes over the network:
//! 1. expressions defining connected port fields are associated to their
//!    master component and registered for both connected ports;
//! 2. solver variables are created for every component variable and every
//!    `(t, s)` it depends on;
//! 3. each constraint gets its ports resolved, is associated to its
//!    component and emits one row per `(t, s)` of its indexing structure;
//! 4. objective contributions are linearized into one objective.

use esm_core::data::DataBase;
use esm_core::expression::{
    add_component_context, compute_indexation, resolve_coefficient, PortFieldId,
};
use esm_core::model::ValueType;
use esm_core::{EsmError, ExpressionNode, LinearExpression, Network, RowIndex, ValueProvider};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::context::{OptimizationContext, VariableId};
use crate::error::{SimulationError, SimulationResult};
use crate::resolver::LinearExpressionResolver;
use crate::strategy::ProblemStrategy;
use crate::time_block::TimeBlock;

/// A solver variable: one component variable at one `(t, s)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemVariable {
    pub id: VariableId,
    pub name: String,
    pub component_id: String,
    pub variable_name: String,
    pub block_timestep: usize,
    pub scenario: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub value_type: ValueType,
    pub in_objective: bool,
}

/// `lower_bound <= sum(coefficient * variable) <= upper_bound`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConstraint {
    pub name: String,
    pub coefficients: IndexMap<VariableId, f64>,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Solver-agnostic linear problem: variables, rows and a minimized
/// objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearProblem {
    pub name: String,
    pub variables: Vec<ProblemVariable>,
    pub constraints: Vec<ProblemConstraint>,
    pub objective: IndexMap<VariableId, f64>,
    pub objective_offset: f64,
}

impl LinearProblem {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn variable(&self, id: VariableId) -> Option<&ProblemVariable> {
        self.variables.get(id.index())
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&ProblemVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<&ProblemConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Objective value for the given variable values, indexed by variable id
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .map(|(id, coefficient)| {
                coefficient * values.get(id.index()).copied().unwrap_or(0.0)
            })
            .sum::<f64>()
            + self.objective_offset
    }

    fn add_variable(&mut self, mut variable: ProblemVariable) -> VariableId {
        let id = VariableId(self.variables.len());
        variable.id = id;
        self.variables.push(variable);
        id
    }
}

/// A built problem along with the context that maps component variables to
/// solver variables
pub struct OptimizationProblem<'a> {
    pub problem: LinearProblem,
    pub context: OptimizationContext<'a>,
    pub strategy: ProblemStrategy,
}

impl OptimizationProblem<'_> {
    pub fn name(&self) -> &str {
        &self.problem.name
    }
}

/// Builds the problem of `network` over `block` and `scenarios` scenarios.
pub fn build_problem<'a>(
    network: &'a Network,
    database: &'a DataBase,
    block: &TimeBlock,
    scenarios: usize,
    config: &BuildConfig,
) -> SimulationResult<OptimizationProblem<'a>> {
    if block.is_empty() {
        return Err(SimulationError::Build(format!(
            "Time block {} has no timestep",
            block.id
        )));
    }
    if scenarios == 0 {
        return Err(SimulationError::Build(
            "At least one scenario is required".into(),
        ));
    }
    database.requirements_consistency(network)?;

    let mut context = OptimizationContext::new(
        network,
        database,
        block.clone(),
        scenarios,
        config.border_management,
    );
    let mut problem = LinearProblem::new(&config.problem_name);

    register_connection_fields_definitions(&mut context)?;
    create_variables(&mut context, &mut problem, config.strategy)?;
    create_constraints(&context, &mut problem, config.strategy)?;
    create_objectives(&context, &mut problem, config.strategy)?;

    info!(
        problem = %problem.name,
        block = block.id,
        variables = problem.variables.len(),
        constraints = problem.constraints.len(),
        "built optimization problem"
    );
    Ok(OptimizationProblem {
        problem,
        context,
        strategy: config.strategy,
    })
}

fn register_connection_fields_definitions(
    context: &mut OptimizationContext,
) -> SimulationResult<()> {
    let network = context.network();
    for connection in network.connections() {
        for (field_name, master) in &connection.master_port {
            let master_component = network.get_component(&master.component_id)?;
            let port_field = PortFieldId::new(&master.port_id, field_name);
            let definition = master_component
                .model
                .port_fields_definitions
                .get(&port_field)
                .ok_or_else(|| {
                    EsmError::MissingKey(format!(
                        "Definition of port field {} on component {}",
                        port_field, master.component_id
                    ))
                })?;
            let instantiated = definition
                .definition
                .add_component_context(&master.component_id)?;
            for port in [&connection.port1, &connection.port2] {
                context.register_connection_fields_expressions(
                    &port.component_id,
                    &port.port_id,
                    field_name,
                    instantiated.clone(),
                );
            }
        }
    }
    Ok(())
}

fn resolve_bound(
    context: &OptimizationContext,
    bound: Option<&ExpressionNode>,
    row: RowIndex,
    default: f64,
) -> SimulationResult<f64> {
    match bound {
        Some(bound) => Ok(resolve_coefficient(bound, context, row)?),
        None => Ok(default),
    }
}

fn create_variables(
    context: &mut OptimizationContext,
    problem: &mut LinearProblem,
    strategy: ProblemStrategy,
) -> SimulationResult<()> {
    let network = context.network();
    let block_length = context.block().len();
    let scenarios = context.scenarios();

    for component in network.all_components() {
        let prefix = if component.id.is_empty() {
            String::new()
        } else {
            format!("{}_", component.id)
        };
        for model_variable in strategy.variables(&component.model) {
            let lower_bound = model_variable
                .lower_bound
                .as_ref()
                .map(|b| add_component_context(&component.id, b))
                .transpose()?;
            let upper_bound = model_variable
                .upper_bound
                .as_ref()
                .map(|b| add_component_context(&component.id, b))
                .transpose()?;

            for block_timestep in context.get_time_indices(model_variable.structure) {
                let time_suffix = if block_length > 1 {
                    format!("_t{}", block_timestep)
                } else {
                    String::new()
                };
                for scenario in context.get_scenario_indices(model_variable.structure) {
                    let scenario_suffix = if scenarios > 1 {
                        format!("_s{}", scenario)
                    } else {
                        String::new()
                    };
                    let row = RowIndex::new(block_timestep, scenario);
                    let (lower, upper) = match model_variable.data_type {
                        ValueType::Boolean => (0.0, 1.0),
                        ValueType::Continuous | ValueType::Integer => (
                            resolve_bound(context, lower_bound.as_ref(), row, f64::NEG_INFINITY)?,
                            resolve_bound(context, upper_bound.as_ref(), row, f64::INFINITY)?,
                        ),
                    };

                    let id = problem.add_variable(ProblemVariable {
                        id: VariableId(0),
                        name: format!(
                            "{}{}{}{}",
                            prefix, model_variable.name, time_suffix, scenario_suffix
                        ),
                        component_id: component.id.clone(),
                        variable_name: model_variable.name.clone(),
                        block_timestep,
                        scenario,
                        lower_bound: lower,
                        upper_bound: upper,
                        value_type: model_variable.data_type,
                        in_objective: false,
                    });
                    context.register_component_variable(
                        block_timestep,
                        scenario,
                        &component.id,
                        &model_variable.name,
                        id,
                    );
                }
            }
        }
    }
    debug!(count = problem.variables.len(), "created variables");
    Ok(())
}

fn instantiate(
    context: &OptimizationContext,
    component_id: &str,
    expression: &LinearExpression,
) -> SimulationResult<LinearExpression> {
    let resolved = expression.resolve_port(component_id, context.connection_fields_expressions())?;
    Ok(resolved.add_component_context(component_id)?)
}

fn create_constraints(
    context: &OptimizationContext,
    problem: &mut LinearProblem,
    strategy: ProblemStrategy,
) -> SimulationResult<()> {
    let resolver = LinearExpressionResolver::new(context);
    for component in context.network().all_components() {
        for constraint in strategy.constraints(&component.model) {
            let expression = instantiate(context, &component.id, &constraint.expression)?;
            let lower_bound = add_component_context(&component.id, &constraint.lower_bound)?;
            let upper_bound = add_component_context(&component.id, &constraint.upper_bound)?;
            let structure = expression.compute_indexation(context)?
                | compute_indexation(&lower_bound, context)?
                | compute_indexation(&upper_bound, context)?;

            let name = format!("{}_{}", component.id, constraint.name);
            for block_timestep in context.get_time_indices(structure) {
                for scenario in context.get_scenario_indices(structure) {
                    let row = RowIndex::new(block_timestep, scenario);
                    let resolved = resolver.resolve(&expression, row)?;
                    let lower = resolver.resolve_constant_expr(&lower_bound, row)?;
                    let upper = resolver.resolve_constant_expr(&upper_bound, row)?;
                    problem.constraints.push(ProblemConstraint {
                        name: format!("{}_t{}_s{}", name, block_timestep, scenario),
                        coefficients: resolved.coefficients(),
                        lower_bound: lower - resolved.constant,
                        upper_bound: upper - resolved.constant,
                    });
                }
            }
        }
    }
    debug!(count = problem.constraints.len(), "created constraints");
    Ok(())
}

fn create_objectives(
    context: &OptimizationContext,
    problem: &mut LinearProblem,
    strategy: ProblemStrategy,
) -> SimulationResult<()> {
    let resolver = LinearExpressionResolver::new(context);
    for component in context.network().all_components() {
        for contribution in strategy.objectives(&component.model) {
            let expression = instantiate(context, &component.id, contribution)?;
            if !expression.compute_indexation(context)?.is_constant() {
                return Err(SimulationError::Build(format!(
                    "Objective contribution of component {} must be neither time nor scenario indexed",
                    component.id
                )));
            }
            let resolved = resolver.resolve(&expression, RowIndex::new(0, 0))?;
            for (variable, coefficient) in resolved.coefficients() {
                *problem.objective.entry(variable).or_insert(0.0) += coefficient;
                if let Some(solver_variable) = problem.variables.get_mut(variable.index()) {
                    solver_variable.in_objective = true;
                }
            }
            problem.objective_offset += resolved.constant;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use esm_core::data::DataStructure;
    use esm_core::library::{demand_model, generator_model, node_balance_model, BALANCE_PORT};
    use esm_core::{Component, PortRef};
    use std::sync::Arc;

    fn single_node(demand: DataStructure) -> (Network, DataBase) {
        let node = Component::new(Arc::new(node_balance_model().expect("node")), "N");
        let demand_component = Component::new(Arc::new(demand_model().expect("demand")), "D");
        let generator = Component::new(Arc::new(generator_model().expect("generator")), "G");

        let mut network = Network::new("test");
        network.add_node(node.clone());
        network.add_component(demand_component.clone());
        network.add_component(generator.clone());
        network
            .connect(
                PortRef::new(&demand_component, BALANCE_PORT),
                PortRef::new(&node, BALANCE_PORT),
            )
            .expect("compatible ports");
        network
            .connect(
                PortRef::new(&generator, BALANCE_PORT),
                PortRef::new(&node, BALANCE_PORT),
            )
            .expect("compatible ports");

        let mut database = DataBase::new();
        database.add_data("D", "demand", demand);
        database.add_data("G", "p_max", DataStructure::Constant(100.0));
        database.add_data("G", "cost", DataStructure::Constant(30.0));
        (network, database)
    }

    #[test]
    fn test_variable_names_and_bounds() {
        let (network, database) = single_node(DataStructure::Constant(100.0));
        let block = TimeBlock::first(0, 2);
        let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
            .expect("valid study");

        let generation = problem
            .problem
            .variable_by_name("G_generation_t1")
            .expect("one variable per timestep");
        assert_eq!(generation.block_timestep, 1);
        assert_eq!(generation.lower_bound, 0.0);
        assert_eq!(generation.upper_bound, f64::INFINITY);
        assert!(generation.in_objective);
        assert!(problem.problem.variable_by_name("G_generation_t1_s0").is_none());
    }

    #[test]
    fn test_balance_rows() {
        let (network, database) =
            single_node(DataStructure::TimeSeries(vec![100.0, 50.0]));
        let block = TimeBlock::first(0, 2);
        let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
            .expect("valid study");

        // generation - demand == 0 becomes generation == demand
        let balance = problem
            .problem
            .constraint_by_name("N_Balance_t1_s0")
            .expect("one row per timestep");
        assert_eq!(balance.lower_bound, 50.0);
        assert_eq!(balance.upper_bound, 50.0);
        let generation = problem
            .problem
            .variable_by_name("G_generation_t1")
            .expect("generation at t1");
        assert_eq!(balance.coefficients.len(), 1);
        assert_eq!(balance.coefficients[&generation.id], 1.0);

        let max_generation = problem
            .problem
            .constraint_by_name("G_Max generation_t0_s0")
            .expect("generator limit");
        assert_eq!(max_generation.lower_bound, f64::NEG_INFINITY);
        assert_eq!(max_generation.upper_bound, 100.0);

        // 2 balance rows, 2 generation limits
        assert_eq!(problem.problem.constraints.len(), 4);
    }

    #[test]
    fn test_objective_sums_over_block() {
        let (network, database) = single_node(DataStructure::Constant(100.0));
        let block = TimeBlock::first(0, 3);
        let problem = build_problem(&network, &database, &block, 2, &BuildConfig::default())
            .expect("valid study");

        assert_eq!(problem.problem.objective.len(), 6);
        for coefficient in problem.problem.objective.values() {
            assert!(
                (coefficient - 15.0).abs() < 1e-12,
                "cost 30 averaged over 2 scenarios, got {}",
                coefficient
            );
        }
        assert_eq!(problem.problem.objective_offset, 0.0);
    }

    #[test]
    fn test_missing_data_fails_before_building() {
        let (network, _) = single_node(DataStructure::Constant(100.0));
        let block = TimeBlock::first(0, 1);
        let err = build_problem(&network, &DataBase::new(), &block, 1, &BuildConfig::default())
            .err()
            .expect("no data");
        assert!(matches!(err, SimulationError::Core(EsmError::MissingKey(_))));
    }

    #[test]
    fn test_investment_strategy_skips_operational_models() {
        let (network, database) = single_node(DataStructure::Constant(100.0));
        let block = TimeBlock::first(0, 1);
        let config = BuildConfig::default().with_strategy(ProblemStrategy::Investment);
        let problem =
            build_problem(&network, &database, &block, 1, &config).expect("valid study");

        // every standard model is operational
        assert!(problem.problem.variables.is_empty());
        assert!(problem.problem.objective.is_empty());
    }
}

//! Solver backends: hands a [`LinearProblem`] to good_lp
//!
//! Continuous problems go to clarabel (feature `solver-clarabel`), problems
//! with integer or boolean variables to HiGHS (feature `solver-highs`). When
//! only one backend is compiled in, it handles every problem it can.

use std::time::Duration;

#[cfg(feature = "solver-clarabel")]
use good_lp::solvers::clarabel::clarabel;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, variables, Constraint, Expression, ProblemVariables, ResolutionError,
    Solution, Solver, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::config::SolverConfig;
use crate::context::VariableId;
use crate::error::{SimulationError, SimulationResult};
use crate::problem::{LinearProblem, OptimizationProblem, ProblemConstraint};
use esm_core::model::ValueType;

/// Rows without variables must hold on `0` within this tolerance.
const EMPTY_ROW_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
}

/// Backend a problem is handed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    #[cfg(feature = "solver-clarabel")]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl SolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "solver-clarabel")]
            SolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            SolverKind::Highs => "highs",
        }
    }

    pub fn supports_integers(&self) -> bool {
        match self {
            #[cfg(feature = "solver-clarabel")]
            SolverKind::Clarabel => false,
            #[cfg(feature = "solver-highs")]
            SolverKind::Highs => true,
        }
    }

    /// Backend for continuous problems
    fn continuous() -> SolverKind {
        #[cfg(feature = "solver-clarabel")]
        {
            SolverKind::Clarabel
        }
        #[cfg(not(feature = "solver-clarabel"))]
        {
            SolverKind::Highs
        }
    }

    /// Backend for problems keeping integer variables, if one is compiled in
    fn mixed_integer() -> Option<SolverKind> {
        #[cfg(feature = "solver-highs")]
        {
            Some(SolverKind::Highs)
        }
        #[cfg(not(feature = "solver-highs"))]
        {
            None
        }
    }
}

const AVAILABLE_SOLVERS: &[&str] = &[
    #[cfg(feature = "solver-clarabel")]
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

/// Outcome of a solve.
///
/// Unless the status is [`SolveStatus::Optimal`], `values` is empty and
/// `objective_value` is NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSolution {
    pub status: SolveStatus,
    pub objective_value: f64,
    /// Values indexed by [`VariableId`]
    pub values: Vec<f64>,
    pub solve_time: Duration,
}

impl ProblemSolution {
    fn without_values(status: SolveStatus, solve_time: Duration) -> Self {
        Self {
            status,
            objective_value: f64::NAN,
            values: Vec::new(),
            solve_time,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn value(&self, variable: VariableId) -> Option<f64> {
        self.values.get(variable.index()).copied()
    }
}

fn row_expression(row: &ProblemConstraint, solver_variables: &[Variable]) -> Expression {
    let mut expression = Expression::from(0.0);
    for (id, coefficient) in &row.coefficients {
        expression += *coefficient * solver_variables[id.index()];
    }
    expression
}

fn empty_row_holds(row: &ProblemConstraint) -> bool {
    row.lower_bound <= EMPTY_ROW_TOLERANCE && row.upper_bound >= -EMPTY_ROW_TOLERANCE
}

/// Picks the backend, or fails when integer variables cannot be kept.
fn select_solver(
    problem: &LinearProblem,
    config: &SolverConfig,
) -> SimulationResult<(SolverKind, bool)> {
    let discrete = problem
        .variables
        .iter()
        .filter(|v| v.value_type != ValueType::Continuous)
        .count();
    if discrete == 0 {
        return Ok((SolverKind::continuous(), false));
    }
    if config.relax_integers {
        warn!(
            count = discrete,
            "relaxing integer and boolean variables to continuous"
        );
        return Ok((SolverKind::continuous(), false));
    }
    match SolverKind::mixed_integer() {
        Some(kind) => Ok((kind, true)),
        None => Err(SimulationError::NotImplemented(format!(
            "{} integer or boolean variables need a MILP backend; available solvers: {}",
            discrete,
            SolverKind::available().join(", ")
        ))),
    }
}

/// Runs one backend and reads back the value of every variable.
fn run_solver<S>(
    solver: S,
    vars: ProblemVariables,
    objective: Expression,
    constraints: Vec<Constraint>,
    solver_variables: &[Variable],
) -> Result<Vec<f64>, ResolutionError>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    let solution = vars
        .minimise(objective)
        .using(solver)
        .with_all(constraints)
        .solve()?;
    Ok(solver_variables.iter().map(|v| solution.value(*v)).collect())
}

/// Minimizes the objective of `problem`.
///
/// Integer and boolean variables are kept and solved with HiGHS. With
/// `config.relax_integers` they are solved over their continuous relaxation
/// instead; without a MILP backend and without relaxation the problem is
/// rejected.
pub fn solve(
    problem: &OptimizationProblem,
    config: &SolverConfig,
) -> SimulationResult<ProblemSolution> {
    solve_linear_problem(&problem.problem, config)
}

pub fn solve_linear_problem(
    problem: &LinearProblem,
    config: &SolverConfig,
) -> SimulationResult<ProblemSolution> {
    let start = Instant::now();
    let (kind, keep_integers) = select_solver(problem, config)?;
    debug!(solver = kind.as_str(), keep_integers, "selected backend");

    let mut vars = variables!();
    let mut solver_variables = Vec::with_capacity(problem.variables.len());
    for problem_variable in &problem.variables {
        let mut definition = variable().name(problem_variable.name.clone());
        if problem_variable.lower_bound.is_finite() {
            definition = definition.min(problem_variable.lower_bound);
        }
        if problem_variable.upper_bound.is_finite() {
            definition = definition.max(problem_variable.upper_bound);
        }
        if keep_integers && problem_variable.value_type != ValueType::Continuous {
            definition = definition.integer();
        }
        solver_variables.push(vars.add(definition));
    }

    let mut objective = Expression::from(problem.objective_offset);
    for (id, coefficient) in &problem.objective {
        objective += *coefficient * solver_variables[id.index()];
    }

    let mut constraints = Vec::with_capacity(problem.constraints.len());
    for row in &problem.constraints {
        if config.verbose {
            info!(
                row = %row.name,
                lower = row.lower_bound,
                upper = row.upper_bound,
                terms = row.coefficients.len(),
                "adding row"
            );
        }
        if row.coefficients.is_empty() {
            if !empty_row_holds(row) {
                debug!(row = %row.name, "row without variables cannot hold");
                return Ok(ProblemSolution::without_values(
                    SolveStatus::Infeasible,
                    start.elapsed(),
                ));
            }
            continue;
        }
        let expression = row_expression(row, &solver_variables);
        if row.lower_bound == row.upper_bound {
            constraints.push(constraint!(expression == row.lower_bound));
            continue;
        }
        if row.lower_bound.is_finite() {
            constraints.push(constraint!(expression.clone() >= row.lower_bound));
        }
        if row.upper_bound.is_finite() {
            constraints.push(constraint!(expression <= row.upper_bound));
        }
    }

    let result = match kind {
        #[cfg(feature = "solver-clarabel")]
        SolverKind::Clarabel => {
            run_solver(clarabel, vars, objective, constraints, &solver_variables)
        }
        #[cfg(feature = "solver-highs")]
        SolverKind::Highs => run_solver(highs, vars, objective, constraints, &solver_variables),
    };
    let values = match result {
        Ok(values) => values,
        Err(ResolutionError::Infeasible) => {
            return Ok(ProblemSolution::without_values(
                SolveStatus::Infeasible,
                start.elapsed(),
            ))
        }
        Err(ResolutionError::Unbounded) => {
            return Ok(ProblemSolution::without_values(
                SolveStatus::Unbounded,
                start.elapsed(),
            ))
        }
        Err(e) => {
            return Err(SimulationError::Solver(format!(
                "{} failed: {:?}",
                kind.as_str(),
                e
            )))
        }
    };

    let objective_value = problem.objective_value(&values);
    let solve_time = start.elapsed();
    info!(
        problem = %problem.name,
        solver = kind.as_str(),
        objective = objective_value,
        solve_time_ms = solve_time.as_millis() as u64,
        "solved optimization problem"
    );

    Ok(ProblemSolution {
        status: SolveStatus::Optimal,
        objective_value,
        values,
        solve_time,
    })
}

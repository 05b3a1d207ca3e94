//! Per-row linearization of component-associated expressions
//!
//! Each term of a [`LinearExpression`] expands into one or more solver
//! variables for a given row: its own timestep, the ids of its time operator,
//! or the whole block for a plain sum, times one or all scenarios for an
//! expectation. Coefficients are evaluated at every `(t, s)` the term
//! touches.

use esm_core::expression::{
    get_time_ids_from_instances_index, resolve_coefficient, ScenarioAggregator, Term,
    TimeOperatorName,
};
use esm_core::{
    EsmError, EsmResult, ExpressionNode, LinearExpression, RowIndex, TimeScenarioIndex,
    ValueProvider,
};
use indexmap::IndexMap;

use crate::context::{OptimizationContext, VariableId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTerm {
    pub coefficient: f64,
    pub variable: VariableId,
}

/// `sum(coefficient * variable) + constant` with numeric coefficients.
///
/// A variable may appear in several terms; solvers add them up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedLinearExpression {
    pub terms: Vec<ResolvedTerm>,
    pub constant: f64,
}

impl ResolvedLinearExpression {
    /// Coefficients summed per variable, in first-appearance order
    pub fn coefficients(&self) -> IndexMap<VariableId, f64> {
        let mut coefficients = IndexMap::new();
        for term in &self.terms {
            *coefficients.entry(term.variable).or_insert(0.0) += term.coefficient;
        }
        coefficients
    }
}

pub struct LinearExpressionResolver<'c, 'a> {
    context: &'c OptimizationContext<'a>,
}

impl<'c, 'a> LinearExpressionResolver<'c, 'a> {
    pub fn new(context: &'c OptimizationContext<'a>) -> Self {
        Self { context }
    }

    pub fn resolve(
        &self,
        expression: &LinearExpression,
        row: RowIndex,
    ) -> EsmResult<ResolvedLinearExpression> {
        if !expression.port_field_terms.is_empty() {
            return Err(EsmError::Resolution(format!(
                "Port fields of {} must be resolved before building rows",
                expression
            )));
        }
        let mut resolved = ResolvedLinearExpression::default();
        for term in expression.terms.values() {
            let weight = match term.scenario_aggregator {
                Some(ScenarioAggregator::Expectation) => 1.0 / self.context.scenarios() as f64,
                None => 1.0,
            };
            for (index, variable) in self.resolve_variables(term, row)? {
                let coefficient_row =
                    RowIndex::new(self.context.manage_border(index.time)?, index.scenario);
                let coefficient =
                    resolve_coefficient(&term.coefficient, self.context, coefficient_row)?;
                resolved.terms.push(ResolvedTerm {
                    coefficient: weight * coefficient,
                    variable,
                });
            }
        }
        resolved.constant = self.resolve_constant_expr(&expression.constant, row)?;
        Ok(resolved)
    }

    pub fn resolve_constant_expr(
        &self,
        expression: &ExpressionNode,
        row: RowIndex,
    ) -> EsmResult<f64> {
        resolve_coefficient(expression, self.context, row)
    }

    /// Solver variables designated by `term` at `row`, keyed by the
    /// (possibly out-of-frame) index they were designated at.
    pub fn resolve_variables(
        &self,
        term: &Term,
        row: RowIndex,
    ) -> EsmResult<IndexMap<TimeScenarioIndex, VariableId>> {
        if term.component_id.is_empty() {
            return Err(EsmError::Resolution(format!(
                "Term {} must be associated to its component before resolution",
                term
            )));
        }
        let scenarios = match term.scenario_aggregator {
            Some(ScenarioAggregator::Expectation) => (0..self.context.scenarios()).collect(),
            None => vec![row.scenario],
        };
        let mut variables = IndexMap::new();
        for time in self.compute_operator_time_ids(term, row)? {
            for &scenario in &scenarios {
                let variable = self.context.get_component_variable(
                    time,
                    scenario,
                    &term.component_id,
                    &term.variable_name,
                )?;
                variables.insert(TimeScenarioIndex::new(time, scenario), variable);
            }
        }
        Ok(variables)
    }

    fn compute_operator_time_ids(&self, term: &Term, row: RowIndex) -> EsmResult<Vec<i64>> {
        let row_time = row.time as i64;
        match &term.time_operator {
            Some(operator) => {
                let ids = get_time_ids_from_instances_index(
                    &operator.time_ids,
                    self.context,
                    TimeScenarioIndex::new(row_time, row.scenario),
                )?;
                Ok(match operator.name {
                    TimeOperatorName::Shift => ids.into_iter().map(|id| row_time + id).collect(),
                    TimeOperatorName::Evaluation => ids,
                })
            }
            None if term.time_aggregator.is_some() => {
                Ok((0..self.context.block_length() as i64).collect())
            }
            None => Ok(vec![row_time]),
        }
    }
}

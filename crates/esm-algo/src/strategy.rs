//! Which parts of each model enter the problem being built
//!
//! Models tag their variables and constraints with a [`ProblemContext`]. A
//! merged problem keeps everything; investment and operational problems keep
//! their own context plus the coupling one.

use esm_core::model::{Constraint, Model, ProblemContext, Variable};
use esm_core::LinearExpression;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemStrategy {
    #[default]
    Merged,
    Investment,
    Operational,
}

impl ProblemStrategy {
    pub fn keep(&self, context: ProblemContext) -> bool {
        match self {
            ProblemStrategy::Merged => true,
            ProblemStrategy::Investment => {
                matches!(context, ProblemContext::Investment | ProblemContext::Coupling)
            }
            ProblemStrategy::Operational => {
                matches!(context, ProblemContext::Operational | ProblemContext::Coupling)
            }
        }
    }

    pub fn variables<'m>(&self, model: &'m Model) -> impl Iterator<Item = &'m Variable> + 'm {
        let strategy = *self;
        model
            .variables
            .values()
            .filter(move |v| strategy.keep(v.context))
    }

    /// Binding constraints first, then inner constraints
    pub fn constraints<'m>(&self, model: &'m Model) -> impl Iterator<Item = &'m Constraint> + 'm {
        let strategy = *self;
        model
            .all_constraints()
            .filter(move |c| strategy.keep(c.context))
    }

    pub fn objectives<'m>(&self, model: &'m Model) -> Vec<&'m LinearExpression> {
        let operational = model.objective_operational_contribution.as_ref();
        let investment = model.objective_investment_contribution.as_ref();
        match self {
            ProblemStrategy::Merged => operational.into_iter().chain(investment).collect(),
            ProblemStrategy::Investment => investment.into_iter().collect(),
            ProblemStrategy::Operational => operational.into_iter().collect(),
        }
    }
}

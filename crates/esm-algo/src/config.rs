//! Build and solve settings

use serde::{Deserialize, Serialize};

use crate::context::BlockBorderManagement;
use crate::strategy::ProblemStrategy;

/// Settings of [`crate::build_problem`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub problem_name: String,
    pub border_management: BlockBorderManagement,
    pub strategy: ProblemStrategy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            problem_name: "optimization_problem".to_string(),
            border_management: BlockBorderManagement::Cycle,
            strategy: ProblemStrategy::Merged,
        }
    }
}

impl BuildConfig {
    pub fn with_problem_name(mut self, name: &str) -> Self {
        self.problem_name = name.to_string();
        self
    }

    pub fn with_border_management(mut self, border_management: BlockBorderManagement) -> Self {
        self.border_management = border_management;
        self
    }

    pub fn with_strategy(mut self, strategy: ProblemStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Settings of the solver backends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Log every row handed to the solver
    pub verbose: bool,
    /// Solve integer and boolean variables as continuous ones. When false,
    /// they need a MILP backend (feature `solver-highs`).
    pub relax_integers: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            relax_integers: false,
        }
    }
}

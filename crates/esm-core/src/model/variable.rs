use super::common::{ProblemContext, ValueType};
use crate::error::{EsmError, EsmResult};
use crate::expression::{expressions_equal, is_constant, ExpressionNode, IndexingStructure};

/// A decision variable of a model
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub data_type: ValueType,
    pub lower_bound: Option<ExpressionNode>,
    pub upper_bound: Option<ExpressionNode>,
    pub structure: IndexingStructure,
    pub context: ProblemContext,
}

impl Variable {
    pub fn new(name: &str, data_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            lower_bound: None,
            upper_bound: None,
            structure: IndexingStructure::default(),
            context: ProblemContext::Operational,
        }
    }

    pub fn with_lower_bound(mut self, bound: impl Into<ExpressionNode>) -> Self {
        self.lower_bound = Some(bound.into());
        self
    }

    pub fn with_upper_bound(mut self, bound: impl Into<ExpressionNode>) -> Self {
        self.upper_bound = Some(bound.into());
        self
    }

    pub fn with_structure(mut self, structure: IndexingStructure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_context(mut self, context: ProblemContext) -> Self {
        self.context = context;
        self
    }

    /// Bounds may depend on parameters but not on port fields.
    pub fn validate(&self) -> EsmResult<()> {
        if let Some(bound) = &self.lower_bound {
            if !is_constant(bound)? {
                return Err(EsmError::Validation(
                    "Lower bounds of variables must be constant".into(),
                ));
            }
        }
        if let Some(bound) = &self.upper_bound {
            if !is_constant(bound)? {
                return Err(EsmError::Validation(
                    "Upper bounds of variables must be constant".into(),
                ));
            }
        }
        Ok(())
    }
}

fn bounds_equal(lhs: &Option<ExpressionNode>, rhs: &Option<ExpressionNode>) -> bool {
    match (lhs, rhs) {
        (None, None) => true,
        (Some(l), Some(r)) => expressions_equal(l, r),
        _ => false,
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.data_type == other.data_type
            && bounds_equal(&self.lower_bound, &other.lower_bound)
            && bounds_equal(&self.upper_bound, &other.upper_bound)
            && self.structure == other.structure
    }
}

pub fn float_variable(name: &str) -> Variable {
    Variable::new(name, ValueType::Continuous)
}

pub fn int_variable(name: &str) -> Variable {
    Variable::new(name, ValueType::Integer)
}

/// Binary variable, bounded to `[0, 1]` when instantiated
pub fn bool_variable(name: &str) -> Variable {
    Variable::new(name, ValueType::Boolean)
}

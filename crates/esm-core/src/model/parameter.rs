use serde::{Deserialize, Serialize};

use super::common::ValueType;
use crate::expression::IndexingStructure;

/// A named input of a model.
///
/// Components instantiating the model provide a value for it, constant or
/// as a time/scenario series depending on `structure`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value_type: ValueType,
    pub structure: IndexingStructure,
}

impl Parameter {
    pub fn new(name: &str, value_type: ValueType, structure: IndexingStructure) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            structure,
        }
    }

    pub fn with_structure(mut self, structure: IndexingStructure) -> Self {
        self.structure = structure;
        self
    }
}

/// Continuous parameter, varying over time and scenarios unless restricted
pub fn float_parameter(name: &str) -> Parameter {
    Parameter::new(name, ValueType::Continuous, IndexingStructure::default())
}

pub fn int_parameter(name: &str) -> Parameter {
    Parameter::new(name, ValueType::Integer, IndexingStructure::default())
}

use serde::{Deserialize, Serialize};

/// Domain of a parameter or variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Continuous,
    Integer,
    Boolean,
}

/// Which problem a variable, constraint or objective contribution belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemContext {
    #[default]
    Operational,
    Investment,
    Coupling,
}

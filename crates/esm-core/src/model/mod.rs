//! Model templates instantiated by network components

mod common;
mod constraint;
mod definition;
mod library;
mod parameter;
mod port;
mod variable;

pub use common::{ProblemContext, ValueType};
pub use constraint::Constraint;
pub use definition::{Model, ModelBuilder};
pub use library::Library;
pub use parameter::{float_parameter, int_parameter, Parameter};
pub use port::{port_field_def, ModelPort, PortField, PortFieldDefinition, PortType};
pub use variable::{bool_variable, float_variable, int_variable, Variable};

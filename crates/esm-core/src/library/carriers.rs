//! Multi-carrier models: producers, converters between balance networks and
//! a CO2 quota fed through `emission` ports.
//!
//! Converters withdraw from the nodes on their input ports (negative flow) and
//! inject the converted quantity on their output port.

use super::{balance_port_type, expected_total};
use crate::error::EsmResult;
use crate::expression::{literal, param, port_field, var, CONSTANT};
use crate::model::{
    float_parameter, float_variable, port_field_def, Constraint, Library, Model, ModelBuilder,
    ModelPort, PortType,
};

pub const PRODUCTION_PORT: &str = "flow_p";
pub const INPUT_PORT: &str = "flow_di";
pub const FIRST_INPUT_PORT: &str = "flow_di1";
pub const SECOND_INPUT_PORT: &str = "flow_di2";
pub const OUTPUT_PORT: &str = "flow_do";
pub const EMISSION_OUTPUT_PORT: &str = "out_co2";
pub const EMISSION_INPUT_PORT: &str = "emission_co2";

/// Emitted quantity, carried in field `Q`
pub fn emission_port_type() -> PortType {
    PortType::new("emission", &["Q"])
}

fn balance(port_name: &str) -> ModelPort {
    ModelPort::new(&balance_port_type(), port_name)
}

/// Production in `[0, p_max]` at a linear cost
pub fn production_model() -> EsmResult<Model> {
    ModelBuilder::new("PRODUCTION")
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .variable(
            float_variable("prod")
                .with_lower_bound(literal(0.0))
                .with_upper_bound(param("p_max")),
        )
        .port(balance(PRODUCTION_PORT))
        .port_field_definition(port_field_def(PRODUCTION_PORT, "flow", var("prod"))?)
        .objective_operational_contribution(expected_total(
            (param("cost") * var("prod"))?,
        )?)
        .build()
}

/// `output == alpha * input`
pub fn convertor_model() -> EsmResult<Model> {
    ModelBuilder::new("CONVERTOR")
        .parameter(float_parameter("alpha"))
        .variable(float_variable("input").with_lower_bound(literal(0.0)))
        .variable(float_variable("output"))
        .port(balance(INPUT_PORT))
        .port(balance(OUTPUT_PORT))
        .port_field_definition(port_field_def(INPUT_PORT, "flow", -var("input"))?)
        .port_field_definition(port_field_def(OUTPUT_PORT, "flow", var("output"))?)
        .constraint(Constraint::new(
            "Conversion",
            var("output").eq_((var("input") * param("alpha"))?)?,
        ))
        .build()
}

/// `output == alpha1 * input1 + alpha2 * input2`
pub fn two_inputs_convertor_model() -> EsmResult<Model> {
    let converted =
        ((var("input1") * param("alpha1"))? + (var("input2") * param("alpha2"))?)?;
    ModelBuilder::new("TWO_INPUTS_CONVERTOR")
        .parameter(float_parameter("alpha1"))
        .parameter(float_parameter("alpha2"))
        .variable(float_variable("input1").with_lower_bound(literal(0.0)))
        .variable(float_variable("input2").with_lower_bound(literal(0.0)))
        .variable(float_variable("output"))
        .port(balance(FIRST_INPUT_PORT))
        .port(balance(SECOND_INPUT_PORT))
        .port(balance(OUTPUT_PORT))
        .port_field_definition(port_field_def(FIRST_INPUT_PORT, "flow", -var("input1"))?)
        .port_field_definition(port_field_def(SECOND_INPUT_PORT, "flow", -var("input2"))?)
        .port_field_definition(port_field_def(OUTPUT_PORT, "flow", var("output"))?)
        .constraint(Constraint::new("Conversion", var("output").eq_(converted)?))
        .build()
}

/// Merges two withdrawals into one output flow, without conversion
pub fn flow_decomposition_model() -> EsmResult<Model> {
    ModelBuilder::new("FLOW_DECOMPOSITION")
        .variable(float_variable("input1").with_lower_bound(literal(0.0)))
        .variable(float_variable("input2").with_lower_bound(literal(0.0)))
        .variable(float_variable("output"))
        .port(balance(FIRST_INPUT_PORT))
        .port(balance(SECOND_INPUT_PORT))
        .port(balance(OUTPUT_PORT))
        .port_field_definition(port_field_def(FIRST_INPUT_PORT, "flow", -var("input1"))?)
        .port_field_definition(port_field_def(SECOND_INPUT_PORT, "flow", -var("input2"))?)
        .port_field_definition(port_field_def(OUTPUT_PORT, "flow", var("output"))?)
        .constraint(Constraint::new(
            "output",
            var("output").eq_((var("input1") + var("input2"))?)?,
        ))
        .build()
}

/// Converter whose input is whatever its input port receives: it defines no
/// flow on [`INPUT_PORT`] and must be connected there to a component that
/// does.
pub fn port_convertor_model() -> EsmResult<Model> {
    ModelBuilder::new("PORT_CONVERTOR")
        .parameter(float_parameter("alpha"))
        .variable(float_variable("input").with_lower_bound(literal(0.0)))
        .port(balance(INPUT_PORT))
        .port(balance(OUTPUT_PORT))
        .port_field_definition(port_field_def(
            OUTPUT_PORT,
            "flow",
            (var("input") * param("alpha"))?,
        )?)
        .constraint(Constraint::new(
            "Conversion",
            var("input").eq_(port_field(INPUT_PORT, "flow").sum_connections()?)?,
        ))
        .build()
}

/// Power plant emitting `emission_rate` per unit produced
pub fn co2_power_model() -> EsmResult<Model> {
    ModelBuilder::new("CO2_POWER")
        .parameter(float_parameter("p_min").with_structure(CONSTANT))
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .parameter(float_parameter("emission_rate").with_structure(CONSTANT))
        .variable(
            float_variable("p")
                .with_lower_bound(param("p_min"))
                .with_upper_bound(param("p_max")),
        )
        .port(balance(PRODUCTION_PORT))
        .port(ModelPort::new(&emission_port_type(), EMISSION_OUTPUT_PORT))
        .port_field_definition(port_field_def(PRODUCTION_PORT, "flow", var("p"))?)
        .port_field_definition(port_field_def(
            EMISSION_OUTPUT_PORT,
            "Q",
            (var("p") * param("emission_rate"))?,
        )?)
        .objective_operational_contribution(expected_total(
            (param("cost") * var("p"))?,
        )?)
        .build()
}

/// Caps the emissions of everything connected to its port
pub fn quota_co2_model() -> EsmResult<Model> {
    let emissions = port_field(EMISSION_INPUT_PORT, "Q").sum_connections()?;
    ModelBuilder::new("QUOTA_CO2")
        .parameter(float_parameter("quota").with_structure(CONSTANT))
        .port(ModelPort::new(&emission_port_type(), EMISSION_INPUT_PORT))
        .binding_constraint(Constraint::new("Bound CO2", emissions.le(param("quota"))?))
        .build()
}

/// Balance and emission port types with the multi-carrier models
pub fn multi_carrier_library() -> EsmResult<Library> {
    Ok(Library::new(
        [balance_port_type(), emission_port_type()],
        [
            production_model()?,
            convertor_model()?,
            two_inputs_convertor_model()?,
            flow_decomposition_model()?,
            port_convertor_model()?,
            co2_power_model()?,
            quota_co2_model()?,
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::PortFieldId;

    #[test]
    fn test_multi_carrier_models_build() {
        let library = multi_carrier_library().expect("multi-carrier models are valid");
        assert_eq!(library.models.len(), 7);
        assert!(library.port_type("emission").is_ok());
        assert!(library.port_type("balance").is_ok());
    }

    #[test]
    fn test_convertor_withdraws_on_input() {
        let convertor = convertor_model().expect("convertor");
        let input = &convertor.port_fields_definitions[&PortFieldId::new(INPUT_PORT, "flow")];
        let term = input.definition.terms.values().next().expect("input term");
        assert_eq!(term.variable_name, "input");
        assert_eq!(term.coefficient, literal(-1.0));
    }

    #[test]
    fn test_port_convertor_reads_its_input_port() {
        let convertor = port_convertor_model().expect("port convertor");
        assert!(!convertor
            .port_fields_definitions
            .contains_key(&PortFieldId::new(INPUT_PORT, "flow")));
        let conversion = &convertor.constraints["Conversion"];
        assert_eq!(conversion.expression.port_field_terms.len(), 1);
    }

    #[test]
    fn test_quota_is_a_binding_constraint() {
        let quota = quota_co2_model().expect("quota");
        assert!(quota.constraints.is_empty());
        assert!(quota.binding_constraints.contains_key("Bound CO2"));
    }
}

//! Standard models exchanging energy through a `balance` port
//!
//! Nodes sum the `flow` field over all their connections; producers define
//! it positively, consumers negatively.
//!
//! [`thermal`] adds unit-commitment clusters with integer variables and
//! [`carriers`] the conversion and CO2 quota models.

pub mod carriers;
pub mod thermal;

pub use carriers::{
    co2_power_model, convertor_model, emission_port_type, flow_decomposition_model,
    multi_carrier_library, port_convertor_model, production_model, quota_co2_model,
    two_inputs_convertor_model,
};
pub use thermal::{thermal_cluster_model_dhd, thermal_cluster_model_hd};

use crate::error::EsmResult;
use crate::expression::{
    literal, param, port_field, var, LinearExpression, CONSTANT, TIME_AND_SCENARIO_FREE,
};
use crate::model::{
    float_parameter, float_variable, port_field_def, Constraint, Library, Model, ModelBuilder,
    ModelPort, PortType,
};

pub const BALANCE_PORT: &str = "balance_port";

pub fn balance_port_type() -> PortType {
    PortType::new("balance", &["flow"])
}

fn balance_port() -> ModelPort {
    ModelPort::new(&balance_port_type(), BALANCE_PORT)
}

fn flow_sum() -> EsmResult<LinearExpression> {
    port_field(BALANCE_PORT, "flow").sum_connections()
}

/// `sum(expression).expec()`, the usual objective contribution
fn expected_total(expression: LinearExpression) -> EsmResult<LinearExpression> {
    expression.sum()?.expec()
}

pub fn node_balance_model() -> EsmResult<Model> {
    ModelBuilder::new("NODE_BALANCE_MODEL")
        .port(balance_port())
        .binding_constraint(Constraint::new("Balance", flow_sum()?.eq_(literal(0.0))?))
        .build()
}

pub fn node_with_spill_and_ens_model() -> EsmResult<Model> {
    let balance = flow_sum()?.eq_((var("spillage") - var("unsupplied_energy"))?)?;
    let cost = ((param("spillage_cost") * var("spillage"))?
        + (param("ens_cost") * var("unsupplied_energy"))?)?;
    ModelBuilder::new("NODE_WITH_SPILL_AND_ENS_MODEL")
        .parameter(float_parameter("spillage_cost"))
        .parameter(float_parameter("ens_cost"))
        .variable(float_variable("spillage").with_lower_bound(literal(0.0)))
        .variable(float_variable("unsupplied_energy").with_lower_bound(literal(0.0)))
        .port(balance_port())
        .binding_constraint(Constraint::new("Balance", balance))
        .objective_operational_contribution(expected_total(cost)?)
        .build()
}

/// Fixed demand withdrawn from the node
pub fn demand_model() -> EsmResult<Model> {
    ModelBuilder::new("FIXED_DEMAND")
        .parameter(float_parameter("demand").with_structure(TIME_AND_SCENARIO_FREE))
        .port(balance_port())
        .port_field_definition(port_field_def(
            BALANCE_PORT,
            "flow",
            LinearExpression::constant(-param("demand")),
        )?)
        .build()
}

/// Linear cost generation limited by `p_max`
pub fn generator_model() -> EsmResult<Model> {
    ModelBuilder::new("GEN")
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .variable(float_variable("generation").with_lower_bound(literal(0.0)))
        .port(balance_port())
        .port_field_definition(port_field_def(BALANCE_PORT, "flow", var("generation"))?)
        .constraint(Constraint::new(
            "Max generation",
            var("generation").le(param("p_max"))?,
        ))
        .objective_operational_contribution(expected_total(
            (param("cost") * var("generation"))?,
        )?)
        .build()
}

/// Generator with a minimum generation, written with explicit bounds
pub fn generator_model_with_pmin() -> EsmResult<Model> {
    ModelBuilder::new("GEN")
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("p_min").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .variable(float_variable("generation"))
        .port(balance_port())
        .port_field_definition(port_field_def(BALANCE_PORT, "flow", var("generation"))?)
        .constraint(Constraint::new(
            "Max generation",
            var("generation").le(param("p_max"))?,
        ))
        .constraint(Constraint::lower_bounded(
            "Min generation",
            (var("generation") - param("p_min"))?,
            literal(0.0),
        )?)
        .objective_operational_contribution(expected_total(
            (param("cost") * var("generation"))?,
        )?)
        .build()
}

/// Generator whose total generation over the block is limited by a full
/// storage without replenishment
pub fn generator_model_with_storage() -> EsmResult<Model> {
    ModelBuilder::new("GEN")
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .parameter(float_parameter("full_storage").with_structure(CONSTANT))
        .variable(float_variable("generation").with_lower_bound(literal(0.0)))
        .port(balance_port())
        .port_field_definition(port_field_def(BALANCE_PORT, "flow", var("generation"))?)
        .constraint(Constraint::new(
            "Max generation",
            var("generation").le(param("p_max"))?,
        ))
        .constraint(Constraint::new(
            "Total storage",
            var("generation").sum()?.le(param("full_storage"))?,
        ))
        .objective_operational_contribution(expected_total(
            (param("cost") * var("generation"))?,
        )?)
        .build()
}

/// Transport between two nodes, limited by `f_max` in both directions
pub fn link_model() -> EsmResult<Model> {
    ModelBuilder::new("LINK")
        .parameter(float_parameter("f_max").with_structure(TIME_AND_SCENARIO_FREE))
        .variable(
            float_variable("flow")
                .with_lower_bound(-param("f_max"))
                .with_upper_bound(param("f_max")),
        )
        .port(ModelPort::new(&balance_port_type(), "balance_port_from"))
        .port(ModelPort::new(&balance_port_type(), "balance_port_to"))
        .port_field_definition(port_field_def("balance_port_from", "flow", -var("flow"))?)
        .port_field_definition(port_field_def("balance_port_to", "flow", var("flow"))?)
        .build()
}

pub fn spillage_model() -> EsmResult<Model> {
    ModelBuilder::new("SPI")
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .variable(float_variable("spillage").with_lower_bound(literal(0.0)))
        .port(balance_port())
        .port_field_definition(port_field_def(BALANCE_PORT, "flow", -var("spillage"))?)
        .objective_operational_contribution(expected_total(
            (param("cost") * var("spillage"))?,
        )?)
        .build()
}

pub fn unsupplied_energy_model() -> EsmResult<Model> {
    ModelBuilder::new("UNSP")
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .variable(float_variable("unsupplied_energy").with_lower_bound(literal(0.0)))
        .port(balance_port())
        .port_field_definition(port_field_def(
            BALANCE_PORT,
            "flow",
            var("unsupplied_energy"),
        )?)
        .objective_operational_contribution(expected_total(
            (param("cost") * var("unsupplied_energy"))?,
        )?)
        .build()
}

/// Short-term storage without capacity; the initial level is optimized.
///
/// `level[t] - level[t-1] - efficiency * injection[t] + withdrawal[t] == inflows[t]`
pub fn short_term_storage_simple() -> EsmResult<Model> {
    let level_balance = (((var("level") - var("level").shift(-1)?)?
        - (param("efficiency") * var("injection"))?)?
        + var("withdrawal"))?
    .eq_(param("inflows"))?;
    ModelBuilder::new("STS_SIMPLE")
        .parameter(float_parameter("p_max_injection"))
        .parameter(float_parameter("p_max_withdrawal"))
        .parameter(float_parameter("level_min"))
        .parameter(float_parameter("level_max"))
        .parameter(float_parameter("inflows"))
        .parameter(float_parameter("efficiency"))
        .variable(
            float_variable("injection")
                .with_lower_bound(literal(0.0))
                .with_upper_bound(param("p_max_injection")),
        )
        .variable(
            float_variable("withdrawal")
                .with_lower_bound(literal(0.0))
                .with_upper_bound(param("p_max_withdrawal")),
        )
        .variable(
            float_variable("level")
                .with_lower_bound(param("level_min"))
                .with_upper_bound(param("level_max")),
        )
        .port(balance_port())
        .port_field_definition(port_field_def(
            BALANCE_PORT,
            "flow",
            (var("withdrawal") - var("injection"))?,
        )?)
        .constraint(Constraint::new("Level", level_balance))
        .objective_operational_contribution(LinearExpression::constant(literal(0.0)))
        .build()
}

/// Library with the balance port type and the standard models, keyed by id.
///
/// Generator variants and thermal clusters share the `GEN` id, so only
/// [`generator_model`] is registered.
pub fn standard_library() -> EsmResult<Library> {
    Ok(Library::new(
        [balance_port_type()],
        [
            node_balance_model()?,
            node_with_spill_and_ens_model()?,
            demand_model()?,
            generator_model()?,
            link_model()?,
            spillage_model()?,
            unsupplied_energy_model()?,
            short_term_storage_simple()?,
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValueType;

    #[test]
    fn test_standard_models_build() {
        let library = standard_library().expect("standard models are valid");
        assert_eq!(library.models.len(), 8);
        assert!(library.port_type("balance").is_ok());
        assert!(generator_model_with_pmin().is_ok());
        assert!(generator_model_with_storage().is_ok());
        assert!(thermal_cluster_model_hd().is_ok());
        assert!(thermal_cluster_model_dhd().is_ok());
    }

    #[test]
    fn test_generator_model_contents() {
        let gen = generator_model().expect("generator");
        let generation = gen.variable("generation").expect("declared");
        assert_eq!(generation.data_type, ValueType::Continuous);
        assert_eq!(generation.lower_bound, Some(literal(0.0)));
        assert!(gen.ports.contains_key(BALANCE_PORT));
        assert_eq!(gen.constraints.len(), 1);
    }

    #[test]
    fn test_storage_level_uses_previous_step() {
        let sts = short_term_storage_simple().expect("storage model");
        let level = &sts.constraints["Level"];
        let shifted = level
            .expression
            .terms
            .values()
            .filter(|t| t.variable_name == "level")
            .filter(|t| t.time_operator.is_some())
            .count();
        assert_eq!(shifted, 1);
        assert_eq!(level.expression.terms.len(), 4);
    }
}

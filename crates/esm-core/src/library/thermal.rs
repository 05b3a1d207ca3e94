//! Thermal clusters with unit commitment
//!
//! `nb_on` counts the running units. Starts and stops keep it consistent from
//! one timestep to the next, and a unit cannot stop (start) again before
//! `d_min_up` (`d_min_down`) timesteps have passed.

use super::{balance_port, expected_total, BALANCE_PORT};
use crate::error::EsmResult;
use crate::expression::{
    literal, param, var, ExpressionRange, IndexingStructure, ANTICIPATIVE_TIME_VARYING,
    CONSTANT, NON_ANTICIPATIVE_TIME_VARYING, TIME_AND_SCENARIO_FREE,
};
use crate::model::{
    float_parameter, float_variable, int_parameter, int_variable, port_field_def, Constraint,
    Model, ModelBuilder,
};

/// `[-duration + 1, 0]`, the timesteps a duration constraint looks back over
fn look_back(duration: &str) -> EsmResult<ExpressionRange> {
    Ok(ExpressionRange::new((-param(duration) + 1.0)?, 0))
}

fn thermal_cluster(commitment: IndexingStructure) -> EsmResult<Model> {
    let nodu_balance = var("nb_on").eq_(
        ((var("nb_on").shift(-1)? + var("nb_start"))? - var("nb_stop"))?,
    )?;
    let min_up_time = var("nb_start")
        .sum_shift(look_back("d_min_up")?)?
        .le(var("nb_on"))?;
    let available_after_stops =
        (param("nb_units_max").shift(-param("d_min_down")) - var("nb_on"))?;
    let min_down_time = var("nb_stop")
        .sum_shift(look_back("d_min_down")?)?
        .le(available_after_stops)?;

    ModelBuilder::new("GEN")
        .parameter(float_parameter("p_max").with_structure(CONSTANT))
        .parameter(float_parameter("p_min").with_structure(CONSTANT))
        .parameter(float_parameter("d_min_up").with_structure(CONSTANT))
        .parameter(float_parameter("d_min_down").with_structure(CONSTANT))
        .parameter(float_parameter("cost").with_structure(CONSTANT))
        .parameter(int_parameter("nb_units_max").with_structure(CONSTANT))
        .parameter(int_parameter("nb_failures").with_structure(TIME_AND_SCENARIO_FREE))
        .variable(
            float_variable("generation")
                .with_lower_bound(literal(0.0))
                .with_upper_bound((param("nb_units_max") * param("p_max"))?)
                .with_structure(ANTICIPATIVE_TIME_VARYING),
        )
        .variable(
            int_variable("nb_on")
                .with_lower_bound(literal(0.0))
                .with_upper_bound(param("nb_units_max"))
                .with_structure(commitment),
        )
        .variable(
            int_variable("nb_stop")
                .with_lower_bound(literal(0.0))
                .with_structure(commitment),
        )
        .variable(
            int_variable("nb_start")
                .with_lower_bound(literal(0.0))
                .with_structure(commitment),
        )
        .port(balance_port())
        .port_field_definition(port_field_def(BALANCE_PORT, "flow", var("generation"))?)
        .constraint(Constraint::new(
            "Max generation",
            var("generation").le((param("p_max") * var("nb_on"))?)?,
        ))
        .constraint(Constraint::new(
            "Min generation",
            var("generation").ge((param("p_min") * var("nb_on"))?)?,
        ))
        .constraint(Constraint::new("NODU balance", nodu_balance))
        .constraint(Constraint::new("Min up time", min_up_time))
        .constraint(Constraint::new("Min down time", min_down_time))
        .objective_operational_contribution(expected_total(
            (param("cost") * var("generation"))?,
        )?)
        .build()
}

/// Thermal cluster whose commitment may differ between scenarios
pub fn thermal_cluster_model_hd() -> EsmResult<Model> {
    thermal_cluster(ANTICIPATIVE_TIME_VARYING)
}

/// Thermal cluster with one commitment plan shared by every scenario
pub fn thermal_cluster_model_dhd() -> EsmResult<Model> {
    thermal_cluster(NON_ANTICIPATIVE_TIME_VARYING)
}

//! End-to-end tests of conversion between balance networks and of a CO2
//! quota shared by several plants.

#![cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]

use std::sync::Arc;

use esm_algo::{build_problem, solve, BuildConfig, OutputValues, SolverConfig, TimeBlock};
use esm_core::data::{DataBase, DataStructure};
use esm_core::library::carriers::{
    EMISSION_INPUT_PORT, EMISSION_OUTPUT_PORT, FIRST_INPUT_PORT, INPUT_PORT, OUTPUT_PORT,
    PRODUCTION_PORT, SECOND_INPUT_PORT,
};
use esm_core::library::{
    co2_power_model, convertor_model, demand_model, flow_decomposition_model, link_model,
    node_balance_model, port_convertor_model, production_model, quota_co2_model,
    two_inputs_convertor_model, BALANCE_PORT,
};
use esm_core::model::Model;
use esm_core::{Component, Network, PortRef};

/// 10 units of gas at 40, the 60 others converted from electricity at 30
const ELECTROLYSIS_COST: f64 = 10.0 * 40.0 + 60.0 / 0.7 * 30.0;

fn component(model: esm_core::EsmResult<Model>, id: &str) -> Component {
    Component::new(Arc::new(model.expect("multi-carrier model")), id)
}

fn connect(network: &mut Network, a: &Component, port_a: &str, b: &Component, port_b: &str) {
    network
        .connect(PortRef::new(a, port_a), PortRef::new(b, port_b))
        .expect("compatible ports");
}

fn constant(database: &mut DataBase, component_id: &str, name: &str, value: f64) {
    database.add_data(component_id, name, DataStructure::Constant(value));
}

/// Electricity nodes `e1` and `e2` fed by `ep1` and `ep2` (p_max 100, cost 30),
/// and gas node `g` with demand `gd` of 70 and producer `gp` (p_max 10,
/// cost 40). Converters are left to the caller.
struct ElectrolysisStudy {
    network: Network,
    database: DataBase,
    electricity_nodes: [Component; 2],
    gas_node: Component,
}

impl ElectrolysisStudy {
    fn new() -> Self {
        let mut network = Network::new("electrolysis");
        let mut database = DataBase::new();

        let electricity_nodes = [
            component(node_balance_model(), "e1"),
            component(node_balance_model(), "e2"),
        ];
        for (node, producer_id) in electricity_nodes.iter().zip(["ep1", "ep2"]) {
            let producer = component(production_model(), producer_id);
            network.add_node(node.clone());
            network.add_component(producer.clone());
            connect(&mut network, &producer, PRODUCTION_PORT, node, BALANCE_PORT);
            constant(&mut database, producer_id, "p_max", 100.0);
            constant(&mut database, producer_id, "cost", 30.0);
        }

        let gas_node = component(node_balance_model(), "g");
        let gas_producer = component(production_model(), "gp");
        let gas_demand = component(demand_model(), "gd");
        network.add_node(gas_node.clone());
        network.add_component(gas_producer.clone());
        network.add_component(gas_demand.clone());
        connect(&mut network, &gas_producer, PRODUCTION_PORT, &gas_node, BALANCE_PORT);
        connect(&mut network, &gas_demand, BALANCE_PORT, &gas_node, BALANCE_PORT);
        constant(&mut database, "gp", "p_max", 10.0);
        constant(&mut database, "gp", "cost", 40.0);
        constant(&mut database, "gd", "demand", 70.0);

        Self {
            network,
            database,
            electricity_nodes,
            gas_node,
        }
    }

    fn add(&mut self, converter: &Component) {
        self.network.add_component(converter.clone());
    }

    fn solved_objective(&self) -> f64 {
        let block = TimeBlock::first(0, 1);
        let problem = build_problem(
            &self.network,
            &self.database,
            &block,
            1,
            &BuildConfig::default(),
        )
        .expect("consistent study");
        let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");
        assert!(solution.is_optimal());
        solution.objective_value
    }
}

#[test]
fn test_one_convertor_per_electricity_node() {
    let mut study = ElectrolysisStudy::new();
    let gas_node = study.gas_node.clone();
    for (index, node) in study.electricity_nodes.clone().iter().enumerate() {
        let id = format!("ez{}", index + 1);
        let electrolyzer = component(convertor_model(), &id);
        study.add(&electrolyzer);
        connect(&mut study.network, node, BALANCE_PORT, &electrolyzer, INPUT_PORT);
        connect(&mut study.network, &electrolyzer, OUTPUT_PORT, &gas_node, BALANCE_PORT);
        constant(&mut study.database, &id, "alpha", 0.7);
    }

    let objective = study.solved_objective();
    assert!(
        (objective - ELECTROLYSIS_COST).abs() < 1e-3,
        "expected {}, got {}",
        ELECTROLYSIS_COST,
        objective
    );
}

#[test]
fn test_two_inputs_convertor_uses_best_efficiency() {
    let mut study = ElectrolysisStudy::new();
    let electrolyzer = component(two_inputs_convertor_model(), "ez");
    study.add(&electrolyzer);
    let [e1, e2] = study.electricity_nodes.clone();
    let gas_node = study.gas_node.clone();
    connect(&mut study.network, &e1, BALANCE_PORT, &electrolyzer, FIRST_INPUT_PORT);
    connect(&mut study.network, &e2, BALANCE_PORT, &electrolyzer, SECOND_INPUT_PORT);
    connect(&mut study.network, &electrolyzer, OUTPUT_PORT, &gas_node, BALANCE_PORT);
    constant(&mut study.database, "ez", "alpha1", 0.7);
    constant(&mut study.database, "ez", "alpha2", 0.5);

    let objective = study.solved_objective();
    assert!(
        (objective - ELECTROLYSIS_COST).abs() < 1e-3,
        "only the 0.7 input should be used, got {}",
        objective
    );
}

#[test]
fn test_convertor_fed_through_its_input_port() {
    let mut study = ElectrolysisStudy::new();
    let consumption = component(flow_decomposition_model(), "ce");
    let electrolyzer = component(port_convertor_model(), "ez");
    study.add(&consumption);
    study.add(&electrolyzer);
    let [e1, e2] = study.electricity_nodes.clone();
    let gas_node = study.gas_node.clone();
    connect(&mut study.network, &e1, BALANCE_PORT, &consumption, FIRST_INPUT_PORT);
    connect(&mut study.network, &e2, BALANCE_PORT, &consumption, SECOND_INPUT_PORT);
    connect(&mut study.network, &consumption, OUTPUT_PORT, &electrolyzer, INPUT_PORT);
    connect(&mut study.network, &electrolyzer, OUTPUT_PORT, &gas_node, BALANCE_PORT);
    constant(&mut study.database, "ez", "alpha", 0.7);

    let objective = study.solved_objective();
    assert!(
        (objective - ELECTROLYSIS_COST).abs() < 1e-3,
        "expected {}, got {}",
        ELECTROLYSIS_COST,
        objective
    );
}

/// Oil plant at `N1` (cost 100, 1 t/MWh) and coal plant at `N2` (cost 10,
/// 2 t/MWh) under a 150 t quota, 100 MW of demand at `N2`, link `L12` of
/// capacity 100 from `N2` to `N1`.
#[test]
fn test_quota_co2_shifts_production_to_cleaner_plant() {
    let n1 = component(node_balance_model(), "N1");
    let n2 = component(node_balance_model(), "N2");
    let demand = component(demand_model(), "DE");
    let link = component(link_model(), "L12");
    let oil = component(co2_power_model(), "Oil1");
    let coal = component(co2_power_model(), "Coal1");
    let quota = component(quota_co2_model(), "QuotaCO2");

    let mut network = Network::new("quota_co2");
    network.add_node(n1.clone());
    network.add_node(n2.clone());
    for c in [&demand, &link, &oil, &coal, &quota] {
        network.add_component(c.clone());
    }
    connect(&mut network, &n2, BALANCE_PORT, &demand, BALANCE_PORT);
    connect(&mut network, &n2, BALANCE_PORT, &link, "balance_port_from");
    connect(&mut network, &link, "balance_port_to", &n1, BALANCE_PORT);
    connect(&mut network, &n1, BALANCE_PORT, &oil, PRODUCTION_PORT);
    connect(&mut network, &n2, BALANCE_PORT, &coal, PRODUCTION_PORT);
    connect(&mut network, &oil, EMISSION_OUTPUT_PORT, &quota, EMISSION_INPUT_PORT);
    connect(&mut network, &coal, EMISSION_OUTPUT_PORT, &quota, EMISSION_INPUT_PORT);

    let mut database = DataBase::new();
    constant(&mut database, "DE", "demand", 100.0);
    constant(&mut database, "L12", "f_max", 100.0);
    for (id, cost, rate) in [("Oil1", 100.0, 1.0), ("Coal1", 10.0, 2.0)] {
        constant(&mut database, id, "p_min", 0.0);
        constant(&mut database, id, "p_max", 100.0);
        constant(&mut database, id, "cost", cost);
        constant(&mut database, id, "emission_rate", rate);
    }
    constant(&mut database, "QuotaCO2", "quota", 150.0);

    let block = TimeBlock::first(0, 1);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");
    assert!(problem.problem.constraint_by_name("QuotaCO2_Bound CO2_t0_s0").is_some());

    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");
    assert!(solution.is_optimal());
    assert!(
        (solution.objective_value - 5500.0).abs() < 1e-3,
        "50 MW of each plant should cost 5500, got {}",
        solution.objective_value
    );

    let output = OutputValues::from_solution(&problem, &solution).expect("optimal");
    let value = |component_id: &str, variable: &str| {
        output
            .get_component(component_id)
            .and_then(|c| c.get_var(variable))
            .and_then(|v| v.get(0, 0))
            .expect("solved value")
    };
    assert!((value("Oil1", "p") - 50.0).abs() < 1e-4);
    assert!((value("Coal1", "p") - 50.0).abs() < 1e-4);
    assert!((value("L12", "flow") + 50.0).abs() < 1e-4);
}

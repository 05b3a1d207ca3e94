//! End-to-end tests: networks of standard models built over a time block,
//! solved with clarabel and checked against hand-computed optima.

#![cfg(feature = "solver-clarabel")]

use std::sync::Arc;

use esm_algo::{
    build_problem, solve, BlockBorderManagement, BuildConfig, OutputValue, OutputValues,
    ProblemStrategy, SolverConfig, TimeBlock,
};
use esm_core::data::{DataBase, DataStructure};
use esm_core::library::{
    demand_model, generator_model, link_model, node_balance_model, node_with_spill_and_ens_model,
    short_term_storage_simple, BALANCE_PORT,
};
use esm_core::model::Model;
use esm_core::{Component, Network, PortRef};

fn component(model: esm_core::EsmResult<Model>, id: &str) -> Component {
    Component::new(Arc::new(model.expect("standard model")), id)
}

fn connect(network: &mut Network, a: &Component, port_a: &str, b: &Component, port_b: &str) {
    network
        .connect(PortRef::new(a, port_a), PortRef::new(b, port_b))
        .expect("compatible balance ports");
}

/// Node `N` with demand `D` and generator `G` (p_max 100, cost 30)
fn create_single_node_network(node_model: esm_core::EsmResult<Model>) -> Network {
    let node = component(node_model, "N");
    let demand = component(demand_model(), "D");
    let generator = component(generator_model(), "G");

    let mut network = Network::new("single_node");
    network.add_node(node.clone());
    network.add_component(demand.clone());
    network.add_component(generator.clone());
    connect(&mut network, &demand, BALANCE_PORT, &node, BALANCE_PORT);
    connect(&mut network, &generator, BALANCE_PORT, &node, BALANCE_PORT);
    network
}

fn generator_data(database: &mut DataBase, id: &str, p_max: f64, cost: f64) {
    database.add_data(id, "p_max", DataStructure::Constant(p_max));
    database.add_data(id, "cost", DataStructure::Constant(cost));
}

#[test]
fn test_basic_balance() {
    let network = create_single_node_network(node_balance_model());
    let mut database = DataBase::new();
    database.add_data("D", "demand", DataStructure::Constant(100.0));
    generator_data(&mut database, "G", 100.0, 30.0);

    let block = TimeBlock::first(0, 1);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");
    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");

    assert!(solution.is_optimal());
    assert!(
        (solution.objective_value - 3000.0).abs() < 1e-3,
        "100 MW at 30 should cost 3000, got {}",
        solution.objective_value
    );

    let output = OutputValues::from_solution(&problem, &solution).expect("optimal");
    let mut expected = OutputValues::new();
    expected
        .component("G")
        .var("generation")
        .set_value(OutputValue::Constant(100.0));
    assert!(output.is_close(&expected, 1e-6, 1e-6), "got {}", output);
}

#[test]
fn test_timeseries_demand() {
    let network = create_single_node_network(node_balance_model());
    let mut database = DataBase::new();
    database.add_data("D", "demand", DataStructure::TimeSeries(vec![100.0, 50.0]));
    generator_data(&mut database, "G", 100.0, 30.0);

    let block = TimeBlock::first(0, 2);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");
    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");

    assert!(
        (solution.objective_value - 4500.0).abs() < 1e-3,
        "150 MWh at 30 should cost 4500, got {}",
        solution.objective_value
    );
    let output = OutputValues::from_solution(&problem, &solution).expect("optimal");
    let mut expected = OutputValues::new();
    expected
        .component("G")
        .var("generation")
        .set_value(OutputValue::PerScenarioAndTime(vec![vec![100.0, 50.0]]));
    assert!(output.is_close(&expected, 1e-6, 1e-6), "got {}", output);
}

#[test]
fn test_expectation_over_scenarios() {
    let network = create_single_node_network(node_balance_model());
    let mut database = DataBase::new();
    database.add_data("D", "demand", DataStructure::ScenarioSeries(vec![100.0, 50.0]));
    generator_data(&mut database, "G", 100.0, 30.0);

    let block = TimeBlock::first(0, 1);
    let problem = build_problem(&network, &database, &block, 2, &BuildConfig::default())
        .expect("consistent study");
    assert!(problem.problem.variable_by_name("G_generation_s1").is_some());

    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");
    assert!(
        (solution.objective_value - 2250.0).abs() < 1e-3,
        "expected cost of 100 and 50 MW should be 2250, got {}",
        solution.objective_value
    );
}

#[test]
fn test_unsupplied_energy_at_node() {
    let network = create_single_node_network(node_with_spill_and_ens_model());
    let mut database = DataBase::new();
    database.add_data("N", "spillage_cost", DataStructure::Constant(1.0));
    database.add_data("N", "ens_cost", DataStructure::Constant(1000.0));
    database.add_data("D", "demand", DataStructure::Constant(150.0));
    generator_data(&mut database, "G", 100.0, 30.0);

    let block = TimeBlock::first(0, 1);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");
    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");

    let expected_cost = 100.0 * 30.0 + 50.0 * 1000.0;
    assert!(
        (solution.objective_value - expected_cost).abs() < 1e-2,
        "expected {}, got {}",
        expected_cost,
        solution.objective_value
    );
    let output = OutputValues::from_solution(&problem, &solution).expect("optimal");
    let mut expected = OutputValues::new();
    expected
        .component("G")
        .var("generation")
        .set_value(OutputValue::Constant(100.0));
    let node = expected.component("N");
    node.var("spillage").set_value(OutputValue::Constant(0.0));
    node.var("unsupplied_energy")
        .set_value(OutputValue::Constant(50.0));
    assert!(output.is_close(&expected, 1e-6, 1e-5), "got {}", output);
}

/// N1 holds the demand and an expensive generator; N2 a cheap generator
/// behind a 50 MW link.
#[test]
fn test_link_between_two_nodes() {
    let n1 = component(node_balance_model(), "N1");
    let n2 = component(node_balance_model(), "N2");
    let demand = component(demand_model(), "D");
    let expensive = component(generator_model(), "G1");
    let cheap = component(generator_model(), "G2");
    let link = component(link_model(), "L");

    let mut network = Network::new("two_nodes");
    network.add_node(n1.clone());
    network.add_node(n2.clone());
    for c in [&demand, &expensive, &cheap, &link] {
        network.add_component(c.clone());
    }
    connect(&mut network, &demand, BALANCE_PORT, &n1, BALANCE_PORT);
    connect(&mut network, &expensive, BALANCE_PORT, &n1, BALANCE_PORT);
    connect(&mut network, &cheap, BALANCE_PORT, &n2, BALANCE_PORT);
    connect(&mut network, &link, "balance_port_from", &n2, BALANCE_PORT);
    connect(&mut network, &link, "balance_port_to", &n1, BALANCE_PORT);

    let mut database = DataBase::new();
    database.add_data("D", "demand", DataStructure::Constant(100.0));
    generator_data(&mut database, "G1", 100.0, 50.0);
    generator_data(&mut database, "G2", 200.0, 10.0);
    database.add_data("L", "f_max", DataStructure::Constant(50.0));

    let block = TimeBlock::first(0, 1);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");

    // the link's flow enters both balances with opposite signs
    let flow = problem
        .problem
        .variable_by_name("L_flow")
        .expect("link flow");
    assert_eq!(flow.lower_bound, -50.0);
    assert_eq!(flow.upper_bound, 50.0);
    let n1_balance = problem
        .problem
        .constraint_by_name("N1_Balance_t0_s0")
        .expect("N1 balance");
    let n2_balance = problem
        .problem
        .constraint_by_name("N2_Balance_t0_s0")
        .expect("N2 balance");
    assert_eq!(n1_balance.coefficients[&flow.id], 1.0);
    assert_eq!(n2_balance.coefficients[&flow.id], -1.0);

    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");
    assert!(
        (solution.objective_value - 3000.0).abs() < 1e-3,
        "50 MW at 10 plus 50 MW at 50 should cost 3000, got {}",
        solution.objective_value
    );
    let flow_value = solution.value(flow.id).expect("solved");
    assert!((flow_value - 50.0).abs() < 1e-5, "link should saturate, got {}", flow_value);
}

fn storage_study(timesteps: usize) -> (Network, DataBase) {
    let node = component(node_balance_model(), "N");
    let demand = component(demand_model(), "D");
    let generator = component(generator_model(), "G");
    let storage = component(short_term_storage_simple(), "S");

    let mut network = Network::new("storage");
    network.add_node(node.clone());
    for c in [&demand, &generator, &storage] {
        network.add_component(c.clone());
        connect(&mut network, c, BALANCE_PORT, &node, BALANCE_PORT);
    }

    let mut database = DataBase::new();
    database.add_data(
        "D",
        "demand",
        DataStructure::TimeSeries((0..timesteps).map(|t| 40.0 + 20.0 * t as f64).collect()),
    );
    generator_data(&mut database, "G", 100.0, 30.0);
    for (name, value) in [
        ("p_max_injection", 100.0),
        ("p_max_withdrawal", 100.0),
        ("level_min", 0.0),
        ("level_max", 1000.0),
        ("inflows", 0.0),
        ("efficiency", 1.0),
    ] {
        database.add_data("S", name, DataStructure::Constant(value));
    }
    (network, database)
}

#[test]
fn test_storage_level_cycles_over_block() {
    let (network, database) = storage_study(3);
    let block = TimeBlock::first(0, 3);
    let problem = build_problem(&network, &database, &block, 1, &BuildConfig::default())
        .expect("consistent study");

    let level = |t: usize| {
        problem
            .problem
            .variable_by_name(&format!("S_level_t{}", t))
            .expect("level variable")
            .id
    };
    let first_row = problem
        .problem
        .constraint_by_name("S_Level_t0_s0")
        .expect("level balance at t0");
    assert_eq!(first_row.coefficients[&level(0)], 1.0);
    assert_eq!(first_row.coefficients[&level(2)], -1.0);
    assert!(!first_row.coefficients.contains_key(&level(1)));

    let solution = solve(&problem, &SolverConfig::default()).expect("LP should solve");
    let total_demand = 40.0 + 60.0 + 80.0;
    assert!(
        (solution.objective_value - 30.0 * total_demand).abs() < 1e-3,
        "storage cannot create energy over a cycle, got {}",
        solution.objective_value
    );

    // what the storage gives back over the block it took in
    let output = OutputValues::from_solution(&problem, &solution).expect("optimal");
    let storage = output.get_component("S").expect("storage values");
    let net: f64 = (0..3)
        .map(|t| {
            storage.get_var("withdrawal").and_then(|v| v.get(t, 0)).unwrap_or(0.0)
                - storage.get_var("injection").and_then(|v| v.get(t, 0)).unwrap_or(0.0)
        })
        .sum();
    assert!(net.abs() < 1e-5, "net storage output should be 0, got {}", net);
}

#[test]
fn test_out_of_frame_indices_are_not_ignored_yet() {
    let (network, database) = storage_study(3);
    let block = TimeBlock::first(0, 3);
    let config =
        BuildConfig::default().with_border_management(BlockBorderManagement::IgnoreOutOfFrame);
    let err = build_problem(&network, &database, &block, 1, &config)
        .err()
        .expect("level[-1] is out of frame");
    assert!(
        err.to_string().contains("Not implemented"),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_build_config_from_json() {
    let config: BuildConfig = serde_json::from_str(
        r#"{"problem_name": "week_1", "border_management": "cycle", "strategy": "operational"}"#,
    )
    .expect("valid config");
    assert_eq!(config.problem_name, "week_1");
    assert_eq!(config.border_management, BlockBorderManagement::Cycle);
    assert_eq!(config.strategy, ProblemStrategy::Operational);

    let defaults: BuildConfig = serde_json::from_str("{}").expect("all fields default");
    assert_eq!(defaults, BuildConfig::default());

    let solver: SolverConfig =
        serde_json::from_str(r#"{"verbose": true}"#).expect("valid solver config");
    assert!(solver.verbose);
    assert!(!solver.relax_integers);
}

//! Power flow on the built-in cases

use gridmate_algo::{run_power_flow, solve, Algorithm, PowerFlowOptions};
use gridmate_core::{BusType, GridError, PowerNet, ResultStatus};
use gridmate_io::CaseName;

fn case(name: CaseName) -> PowerNet {
    name.build().expect("case builds")
}

#[test]
fn three_bus_converges_with_defaults() {
    let mut net = case(CaseName::ThreeBus);
    let results = run_power_flow(&mut net, &PowerFlowOptions::default()).unwrap();

    assert!(results.converged);
    assert_eq!(results.algorithm, "nr");
    assert!(results.iterations <= 10);
    assert!(results.max_mismatch_mva < 1e-8);
    assert_eq!(net.result_status(), ResultStatus::Current);

    // Slack and PV setpoints are held
    assert!((results.bus[&0].vm_pu - 1.02).abs() < 1e-9);
    assert!((results.bus[&1].vm_pu - 1.01).abs() < 1e-9);
    assert!(results.bus[&2].vm_pu < 1.01);
}

#[test]
fn three_bus_active_power_balances() {
    let net = case(CaseName::ThreeBus);
    let results = solve(&net, &PowerFlowOptions::default()).unwrap();

    let grid_p: f64 = results.ext_grid.values().map(|e| e.p_mw).sum();
    let gen_p: f64 = results.gen.values().map(|g| g.p_mw).sum();
    let balance = grid_p + gen_p - net.total_load_mw() - results.total_losses_mw();
    assert!(balance.abs() < 1e-6, "imbalance {balance} MW");

    assert!((results.bus[&2].p_mw - 1.5).abs() < 1e-9);
    assert!((results.gen[&0].p_mw - 0.8).abs() < 1e-12);
    assert!(results.line[&1].loading_percent > 0.0);
}

#[test]
fn line_flows_are_consistent_at_both_ends() {
    let net = case(CaseName::ThreeBus);
    let results = solve(&net, &PowerFlowOptions::default()).unwrap();
    let line = results.line[&1];

    // Power delivered at the load end matches the load
    assert!((line.p_to_mw + 1.5).abs() < 1e-6);
    assert!((line.pl_mw - (line.p_from_mw + line.p_to_mw)).abs() < 1e-12);
    assert!(line.pl_mw > 0.0);
    assert_eq!(line.i_ka, line.i_from_ka.max(line.i_to_ka));
}

#[test]
fn sweep_matches_newton_on_radial_feeder() {
    let net = case(CaseName::RadialFeeder);
    let nr = solve(&net, &PowerFlowOptions::default()).unwrap();
    let bfsw = solve(
        &net,
        &PowerFlowOptions::default().with_algorithm(Algorithm::BackwardForwardSweep),
    )
    .unwrap();

    assert!(nr.converged && bfsw.converged);
    assert_eq!(bfsw.algorithm, "bfsw");
    assert_eq!(nr.bus.len(), bfsw.bus.len());
    for (bus, r) in &nr.bus {
        let s = bfsw.bus[bus];
        assert!((r.vm_pu - s.vm_pu).abs() < 1e-4, "bus {bus}: {} vs {}", r.vm_pu, s.vm_pu);
        assert!((r.va_degree - s.va_degree).abs() < 1e-2, "bus {bus}");
    }
}

#[test]
fn trafo_shift_shows_only_with_angles() {
    let net = case(CaseName::RadialFeeder);
    let with = solve(&net, &PowerFlowOptions::default()).unwrap();
    let without = solve(&net, &PowerFlowOptions::default().with_voltage_angles(false)).unwrap();

    assert!(with.bus[&1].va_degree < -140.0);
    assert!(without.bus[&1].va_degree.abs() < 5.0);
    assert!((with.bus[&4].vm_pu - without.bus[&4].vm_pu).abs() < 1e-6);
    assert!(with.trafo[&0].loading_percent > 0.0);
}

#[test]
fn sweep_rejects_meshed_network() {
    let net = case(CaseName::MeshedRing);
    let err = solve(
        &net,
        &PowerFlowOptions::default().with_algorithm(Algorithm::BackwardForwardSweep),
    )
    .unwrap_err();
    assert!(matches!(err, GridError::Solver(_)));

    // Newton-Raphson handles the ring, fused bus included
    let results = solve(&net, &PowerFlowOptions::default()).unwrap();
    assert!(results.converged);
    assert_eq!(results.bus[&2].vm_pu, results.bus[&5].vm_pu);
}

#[test]
fn iteration_cap_reports_not_converged_and_clears_results() {
    let mut net = case(CaseName::ThreeBus);
    run_power_flow(&mut net, &PowerFlowOptions::default()).unwrap();
    assert_eq!(net.result_status(), ResultStatus::Current);

    let tight = PowerFlowOptions::default()
        .with_max_iteration(1)
        .with_tolerance(1e-12);
    let results = run_power_flow(&mut net, &tight).unwrap();
    assert!(!results.converged);
    assert_eq!(results.iterations, 1);
    assert_eq!(net.result_status(), ResultStatus::Absent);
}

#[test]
fn structural_edit_makes_results_stale() {
    let mut net = case(CaseName::ThreeBus);
    run_power_flow(&mut net, &PowerFlowOptions::default()).unwrap();
    net.create_bus("extra", 20.0, BusType::Node, None).unwrap();
    assert_eq!(net.result_status(), ResultStatus::Stale);
    assert!(net.results().is_some());
}

#[test]
fn solver_errors_leave_results_untouched() {
    let mut net = case(CaseName::MeshedRing);
    run_power_flow(&mut net, &PowerFlowOptions::default()).unwrap();
    let before = net.results().cloned();

    let bfsw = PowerFlowOptions::default().with_algorithm(Algorithm::BackwardForwardSweep);
    assert!(run_power_flow(&mut net, &bfsw).is_err());
    assert_eq!(net.results().cloned(), before);
}

#[test]
fn empty_network_has_no_slack() {
    let net = PowerNet::default();
    let err = solve(&net, &PowerFlowOptions::default()).unwrap_err();
    assert!(err.to_string().contains("external grid"));
}

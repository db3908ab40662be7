//! Contingency sweeps over the built-in cases

use gridmate_algo::{
    run_contingency_analysis, ContingencyOptions, ContingencyType, ViolationLimits,
};
use gridmate_core::{BusType, ElementKind, PowerNet};
use gridmate_io::CaseName;

/// Meshed ring plus a radial spur whose line islands a load when tripped.
fn ring_with_spur() -> PowerNet {
    let mut net = CaseName::MeshedRing.build().unwrap();
    let spur = net.create_bus("Spur", 20.0, BusType::Node, None).unwrap();
    net.create_line(4, spur, 0.7, "NA2XS2Y 1x95 RM/25 12/20 kV", Some("Spur".into()))
        .unwrap();
    net.create_load(spur, 0.4, 0.1, None).unwrap();
    net
}

fn service_flags(net: &PowerNet) -> Vec<bool> {
    ElementKind::ALL
        .iter()
        .flat_map(|&kind| {
            let indices: Vec<usize> = match kind {
                ElementKind::Bus => net.bus.indices().collect(),
                ElementKind::Line => net.line.indices().collect(),
                ElementKind::Trafo => net.trafo.indices().collect(),
                ElementKind::Gen => net.gen.indices().collect(),
                ElementKind::ExtGrid => net.ext_grid.indices().collect(),
                ElementKind::Load => net.load.indices().collect(),
                ElementKind::Shunt => net.shunt.indices().collect(),
                ElementKind::Switch => net.switch.indices().collect(),
            };
            indices
                .into_iter()
                .map(move |i| net.in_service(kind, i).unwrap())
        })
        .collect()
}

#[test]
fn islanding_outage_is_an_item_error() {
    let net = ring_with_spur();
    let report = run_contingency_analysis(&net, &ContingencyOptions::default()).unwrap();

    assert_eq!(report.outcomes.len(), 6);
    let spur = report
        .outcomes
        .iter()
        .find(|o| o.label == "line_5")
        .expect("spur outage present");
    assert!(!spur.converged);
    assert!(spur.violations.is_none());
    assert!(spur.error.as_deref().unwrap_or_default().contains("no path"));

    for ring in report.outcomes.iter().filter(|o| o.label != "line_5") {
        assert!(ring.converged, "{}: {:?}", ring.label, ring.error);
        assert!(ring.error.is_none());
        assert!(ring.violations.is_some());
    }
    assert_eq!(report.summary.total, 6);
    assert_eq!(report.summary.converged, 5);
    assert_eq!(report.summary.failed, 1);
}

#[test]
fn baseline_is_never_mutated() {
    let net = ring_with_spur();
    let counts = net.counts();
    let flags = service_flags(&net);
    let revision = net.revision();

    let options = ContingencyOptions {
        contingency_type: ContingencyType::N2,
        ..Default::default()
    };
    run_contingency_analysis(&net, &options).unwrap();

    assert_eq!(net.counts(), counts);
    assert_eq!(service_flags(&net), flags);
    assert_eq!(net.revision(), revision);
    assert!(net.results().is_none());
}

#[test]
fn parallel_and_serial_runs_agree() {
    let net = ring_with_spur();
    let serial = ContingencyOptions {
        contingency_type: ContingencyType::N2,
        parallel: false,
        ..Default::default()
    };
    let parallel = ContingencyOptions {
        parallel: true,
        ..serial.clone()
    };
    let a = run_contingency_analysis(&net, &serial).unwrap();
    let b = run_contingency_analysis(&net, &parallel).unwrap();
    assert_eq!(a.outcomes.len(), 15);
    let labels = |r: &gridmate_algo::ContingencyReport| {
        r.outcomes.iter().map(|o| o.label.clone()).collect::<Vec<_>>()
    };
    assert_eq!(labels(&a), labels(&b));
    assert_eq!(a.outcomes[0].label, "line_0+line_1");
    assert_eq!(a.summary, b.summary);
}

#[test]
fn out_of_service_elements_are_not_candidates() {
    let mut net = ring_with_spur();
    net.set_in_service(ElementKind::Line, 2, false).unwrap();
    let report = run_contingency_analysis(&net, &ContingencyOptions::default()).unwrap();
    assert_eq!(report.outcomes.len(), 5);
    assert!(report.outcomes.iter().all(|o| o.label != "line_2"));
}

#[test]
fn trafo_outage_on_feeder_and_class_filter() {
    let net = CaseName::RadialFeeder.build().unwrap();
    let options = ContingencyOptions {
        element_kinds: vec![ElementKind::Trafo],
        ..Default::default()
    };
    let report = run_contingency_analysis(&net, &options).unwrap();
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].label, "trafo_0");
    assert!(!report.outcomes[0].converged);
    assert!(report.outcomes[0].error.is_some());
}

#[test]
fn tight_limits_produce_violations() {
    let net = ring_with_spur();
    let options = ContingencyOptions {
        limits: ViolationLimits {
            vm_min_pu: 0.999,
            vm_max_pu: 1.001,
            max_loading_percent: 1.0,
        },
        ..Default::default()
    };
    let report = run_contingency_analysis(&net, &options).unwrap();
    assert!(report.summary.with_violations > 0);
    let first = report.outcomes.iter().find(|o| o.converged).unwrap();
    assert!(!first.violations.as_ref().unwrap().loading.is_empty());
}

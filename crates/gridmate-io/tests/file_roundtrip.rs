use gridmate_core::{ElementKind, GridError};
use gridmate_io::{binary, load_network, save_network, CaseName};
use tempfile::tempdir;

#[test]
fn json_file_roundtrip_keeps_counts() {
    let dir = tempdir().expect("tmp dir");
    let path = dir.path().join("feeder.json");
    let net = CaseName::RadialFeeder.build().expect("case builds");

    save_network(&net, &path).expect("save should succeed");
    assert!(path.exists());

    let loaded = load_network(&path).expect("load should succeed");
    assert_eq!(loaded.network.counts(), net.counts());
    assert_eq!(loaded.network.name, "radial_feeder");
    assert!(!loaded.diagnostics.has_errors());
}

#[test]
fn json_file_keeps_service_flags_and_switches() {
    let dir = tempdir().expect("tmp dir");
    let path = dir.path().join("ring.json");
    let mut net = CaseName::MeshedRing.build().expect("case builds");
    net.set_in_service(ElementKind::Line, 2, false).unwrap();

    save_network(&net, &path).unwrap();
    let back = load_network(&path).unwrap().network;

    assert!(!back.in_service(ElementKind::Line, 2).unwrap());
    assert_eq!(back.switch.get(0), net.switch.get(0));
}

#[test]
fn binary_snapshot_loads_through_dispatch() {
    let dir = tempdir().expect("tmp dir");
    let path = dir.path().join("three_bus.p");
    let net = CaseName::ThreeBus.build().unwrap();

    binary::write_snapshot(&net, &path).unwrap();
    let loaded = load_network(&path).unwrap();
    assert_eq!(loaded.network.counts(), net.counts());
}

#[test]
fn binary_save_is_refused() {
    let dir = tempdir().expect("tmp dir");
    let path = dir.path().join("three_bus.p");
    let net = CaseName::ThreeBus.build().unwrap();

    let err = save_network(&net, &path).unwrap_err();
    assert!(matches!(err, GridError::UnsupportedFormat { .. }));
    assert!(!path.exists());
}

#[test]
fn missing_file_and_bad_extension() {
    let dir = tempdir().expect("tmp dir");

    let err = load_network(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, GridError::NotFound(_)));

    let csv = dir.path().join("grid.csv");
    std::fs::write(&csv, "bus,vn_kv\n0,20\n").unwrap();
    let err = load_network(&csv).unwrap_err();
    assert!(matches!(err, GridError::UnsupportedFormat { .. }));
}

#[test]
fn corrupt_json_is_parse_error() {
    let dir = tempdir().expect("tmp dir");
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"_module\": ").unwrap();
    let err = load_network(&path).unwrap_err();
    assert!(matches!(err, GridError::Parse(_)));
}

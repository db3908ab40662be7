//! End-to-end calls through the subprocess client

use std::path::Path;
use std::time::Duration;

use gridmate_server::{ToolClient, ToolError};
use serde_json::json;
use tempfile::tempdir;

fn spawn(dir: &Path) -> ToolClient {
    let config = dir.join("config.toml");
    std::fs::write(&config, "[contingency]\nparallel = false\n").unwrap();
    let config = config.to_string_lossy().to_string();
    ToolClient::spawn(
        Path::new(env!("CARGO_BIN_EXE_gridmate-server")),
        &["--config", &config, "--log-level", "warn"],
        Duration::from_secs(30),
    )
    .unwrap()
}

#[test]
fn handshake_and_catalogue() {
    let dir = tempdir().unwrap();
    let mut client = spawn(dir.path());
    assert_eq!(client.server_info()["name"], "gridmate-server");
    client.ping().unwrap();

    let tools = client.list_tools().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"run_contingency_analysis"));
    assert_eq!(tools[0].input_schema["type"], "object");

    assert!(client.shutdown().unwrap().success());
}

#[test]
fn build_solve_save_and_reload() {
    let dir = tempdir().unwrap();
    let mut client = spawn(dir.path());

    let err = client.call_tool("get_network_info", json!({})).unwrap_err();
    assert_eq!(err, ToolError::NoNetworkLoaded);

    client.call_tool("create_empty_network", json!({})).unwrap();
    for name in ["Grid", "Mid", "End"] {
        client
            .call_tool("add_bus", json!({"name": name, "vn_kv": 0.4}))
            .unwrap();
    }
    client.call_tool("add_ext_grid", json!({"bus": 0})).unwrap();
    for (from, to) in [(0, 1), (1, 2)] {
        client
            .call_tool(
                "add_line",
                json!({"from_bus": from, "to_bus": to, "length": 0.1, "std_type": "NAYY 4x150 SE"}),
            )
            .unwrap();
    }
    client
        .call_tool("add_load", json!({"bus": 2, "p_mw": 0.05, "q_mvar": 0.01}))
        .unwrap();

    let pf = client
        .call_tool("run_power_flow", json!({"algorithm": "bfsw"}))
        .unwrap();
    assert_eq!(pf["results"]["converged"], true);

    let file = dir.path().join("lv.json");
    client
        .call_tool("save_network", json!({"file_path": file}))
        .unwrap();
    let loaded = client
        .call_tool("load_network", json!({"file_path": file}))
        .unwrap();
    assert_eq!(loaded["network_info"]["buses"], 3);
    assert_eq!(loaded["network_info"]["lines"], 2);

    let err = client
        .call_tool("load_network", json!({"file_path": dir.path().join("lv.csv")}))
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_format");

    let report = client
        .call_tool("run_contingency_analysis", json!({"contingency_type": "N-1"}))
        .unwrap();
    let entries = report["results"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["converged"] == false));
}

#[test]
fn unreachable_server_is_transport_failure() {
    let err = ToolClient::spawn(
        Path::new("/nonexistent/gridmate-server"),
        &[],
        Duration::from_secs(1),
    )
    .err()
    .map(ToolError::from)
    .unwrap();
    assert_eq!(err.kind(), "transport_failure");
    assert!(err.to_string().contains("failed to start tool server"));
}

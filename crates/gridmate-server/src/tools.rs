//! Tool catalogue and dispatch.
//!
//! Each tool deserializes its arguments into a typed struct, calls one
//! [`Session`] operation and wraps the outcome in a [`ToolCallResult`].
//! Argument names follow the established tool surface (`type` for the bus
//! type, `length` for line length, `elements` for outage classes).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use gridmate_algo::{Algorithm, ContingencyType};
use gridmate_core::{BusType, ElementKind, GridError, PowerFlowResults, SwitchTarget};
use gridmate_io::CaseName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::protocol::{ToolCallResult, ToolDescriptor};
use crate::session::{LimitOverrides, PowerFlowOverrides, Session};

pub const TOOL_NAMES: [&str; 18] = [
    "create_empty_network",
    "create_example_network",
    "load_network",
    "save_network",
    "add_bus",
    "add_line",
    "add_load",
    "add_generator",
    "add_ext_grid",
    "add_transformer",
    "add_shunt",
    "add_switch",
    "remove_element",
    "set_in_service",
    "run_power_flow",
    "run_contingency_analysis",
    "get_network_info",
    "list_std_types",
];

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

/// The `tools/list` catalogue, in [`TOOL_NAMES`] order.
pub fn catalogue() -> Vec<ToolDescriptor> {
    let element_classes: Vec<&str> = ElementKind::ALL.iter().map(|k| k.table_name()).collect();
    let cases: Vec<&str> = CaseName::ALL.iter().map(|c| c.as_str()).collect();
    vec![
        tool(
            "create_empty_network",
            "Create a new empty power network and make it the current network.",
            json!({
                "name": { "type": "string" },
                "f_hz": { "type": "number", "description": "System frequency in Hz" },
                "sn_mva": { "type": "number", "description": "Per-unit base power in MVA" }
            }),
            &[],
        ),
        tool(
            "create_example_network",
            "Replace the current network with a built-in example case.",
            json!({
                "case": { "type": "string", "enum": cases }
            }),
            &["case"],
        ),
        tool(
            "load_network",
            "Load a network from a .json or .p file.",
            json!({
                "file_path": { "type": "string" }
            }),
            &["file_path"],
        ),
        tool(
            "save_network",
            "Save the current network to a .json file.",
            json!({
                "file_path": { "type": "string" }
            }),
            &["file_path"],
        ),
        tool(
            "add_bus",
            "Add a bus to the current network. Returns the new bus index.",
            json!({
                "name": { "type": "string" },
                "vn_kv": { "type": "number", "description": "Nominal voltage in kV" },
                "type": { "type": "string", "enum": ["b", "n", "e"], "default": "b" },
                "zone": { "type": "string" }
            }),
            &["name", "vn_kv"],
        ),
        tool(
            "add_line",
            "Add a line between two buses using a standard type, e.g. NAYY 4x50 SE, \
             NAYY 4x120 SE, NAYY 4x150 SE. Returns the new line index.",
            json!({
                "from_bus": { "type": "integer", "minimum": 0 },
                "to_bus": { "type": "integer", "minimum": 0 },
                "length": { "type": "number", "description": "Length in km" },
                "std_type": { "type": "string" },
                "name": { "type": "string" }
            }),
            &["from_bus", "to_bus", "length", "std_type"],
        ),
        tool(
            "add_load",
            "Add a constant-power load to a bus. Returns the new load index.",
            json!({
                "bus": { "type": "integer", "minimum": 0 },
                "p_mw": { "type": "number" },
                "q_mvar": { "type": "number", "default": 0.0 },
                "name": { "type": "string" }
            }),
            &["bus", "p_mw"],
        ),
        tool(
            "add_generator",
            "Add a voltage-controlled generator to a bus. Returns the new generator index.",
            json!({
                "bus": { "type": "integer", "minimum": 0 },
                "p_mw": { "type": "number" },
                "vm_pu": { "type": "number", "default": 1.0 },
                "min_q_mvar": { "type": "number" },
                "max_q_mvar": { "type": "number" },
                "name": { "type": "string" }
            }),
            &["bus", "p_mw"],
        ),
        tool(
            "add_ext_grid",
            "Add an external grid (slack) connection to a bus.",
            json!({
                "bus": { "type": "integer", "minimum": 0 },
                "vm_pu": { "type": "number", "default": 1.0 },
                "va_degree": { "type": "number", "default": 0.0 },
                "name": { "type": "string" }
            }),
            &["bus"],
        ),
        tool(
            "add_transformer",
            "Add a two-winding transformer using a standard type.",
            json!({
                "hv_bus": { "type": "integer", "minimum": 0 },
                "lv_bus": { "type": "integer", "minimum": 0 },
                "std_type": { "type": "string" },
                "name": { "type": "string" }
            }),
            &["hv_bus", "lv_bus", "std_type"],
        ),
        tool(
            "add_shunt",
            "Add a shunt to a bus. Values are consumption at 1.0 p.u. voltage.",
            json!({
                "bus": { "type": "integer", "minimum": 0 },
                "p_mw": { "type": "number", "default": 0.0 },
                "q_mvar": { "type": "number" },
                "name": { "type": "string" }
            }),
            &["bus", "q_mvar"],
        ),
        tool(
            "add_switch",
            "Add a switch between a bus and another bus (b), line (l) or transformer (t).",
            json!({
                "bus": { "type": "integer", "minimum": 0 },
                "element": { "type": "integer", "minimum": 0 },
                "et": { "type": "string", "enum": ["b", "l", "t"], "default": "b" },
                "closed": { "type": "boolean", "default": true },
                "name": { "type": "string" }
            }),
            &["bus", "element"],
        ),
        tool(
            "remove_element",
            "Remove an element. Buses still referenced by other elements cannot be removed.",
            json!({
                "element_type": { "type": "string", "enum": element_classes },
                "index": { "type": "integer", "minimum": 0 }
            }),
            &["element_type", "index"],
        ),
        tool(
            "set_in_service",
            "Switch an element in or out of service.",
            json!({
                "element_type": { "type": "string", "enum": element_classes },
                "index": { "type": "integer", "minimum": 0 },
                "in_service": { "type": "boolean" }
            }),
            &["element_type", "index", "in_service"],
        ),
        tool(
            "run_power_flow",
            "Run an AC power flow on the current network.",
            json!({
                "algorithm": { "type": "string", "enum": ["nr", "bfsw"], "default": "nr" },
                "calculate_voltage_angles": { "type": "boolean", "default": true },
                "max_iteration": { "type": "integer", "minimum": 1, "default": 10 },
                "tolerance_mva": { "type": "number", "default": 1e-8 }
            }),
            &[],
        ),
        tool(
            "run_contingency_analysis",
            "Run an N-1 or N-2 outage analysis. The current network is not modified.",
            json!({
                "contingency_type": { "type": "string", "enum": ["N-1", "N-2"], "default": "N-1" },
                "elements": {
                    "type": "array",
                    "items": { "type": "string", "enum": ["line", "trafo"] }
                },
                "vm_min_pu": { "type": "number" },
                "vm_max_pu": { "type": "number" },
                "max_loading_percent": { "type": "number" }
            }),
            &[],
        ),
        tool(
            "get_network_info",
            "Summarize the current network: element counts, result status and validation issues.",
            json!({}),
            &[],
        ),
        tool(
            "list_std_types",
            "List the built-in line or transformer standard types.",
            json!({
                "element_type": { "type": "string", "enum": ["line", "trafo"], "default": "line" }
            }),
            &[],
        ),
    ]
}

// ----------------------------------------------------------------------
// Arguments
// ----------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateEmptyNetworkArgs {
    name: Option<String>,
    f_hz: Option<f64>,
    sn_mva: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateExampleNetworkArgs {
    case: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileArgs {
    file_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddBusArgs {
    name: String,
    vn_kv: f64,
    #[serde(rename = "type", default = "default_bus_type")]
    bus_type: String,
    zone: Option<String>,
}

fn default_bus_type() -> String {
    "b".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddLineArgs {
    from_bus: usize,
    to_bus: usize,
    #[serde(alias = "length_km")]
    length: f64,
    std_type: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddLoadArgs {
    bus: usize,
    p_mw: f64,
    #[serde(default)]
    q_mvar: f64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddGeneratorArgs {
    bus: usize,
    p_mw: f64,
    #[serde(default = "unity")]
    vm_pu: f64,
    min_q_mvar: Option<f64>,
    max_q_mvar: Option<f64>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddExtGridArgs {
    bus: usize,
    #[serde(default = "unity")]
    vm_pu: f64,
    #[serde(default)]
    va_degree: f64,
    name: Option<String>,
}

fn unity() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddTransformerArgs {
    hv_bus: usize,
    lv_bus: usize,
    std_type: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddShuntArgs {
    bus: usize,
    #[serde(default)]
    p_mw: f64,
    q_mvar: f64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddSwitchArgs {
    bus: usize,
    element: usize,
    #[serde(default = "default_bus_type")]
    et: String,
    #[serde(default = "closed")]
    closed: bool,
    name: Option<String>,
}

fn closed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ElementArgs {
    element_type: String,
    index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetInServiceArgs {
    element_type: String,
    index: usize,
    in_service: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunPowerFlowArgs {
    algorithm: Option<String>,
    calculate_voltage_angles: Option<bool>,
    max_iteration: Option<usize>,
    tolerance_mva: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunContingencyArgs {
    #[serde(default = "default_contingency_type")]
    contingency_type: String,
    elements: Option<Vec<String>>,
    vm_min_pu: Option<f64>,
    vm_max_pu: Option<f64>,
    max_loading_percent: Option<f64>,
}

fn default_contingency_type() -> String {
    ContingencyType::N1.as_str().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListStdTypesArgs {
    #[serde(default = "default_std_type_class")]
    element_type: String,
}

fn default_std_type_class() -> String {
    ElementKind::Line.table_name().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> ToolResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::invalid_argument(format!("invalid arguments for {tool}: {e}")))
}

fn parse_enum<T: FromStr<Err = GridError>>(value: &str) -> ToolResult<T> {
    value.parse().map_err(ToolError::from)
}

fn to_json<T: Serialize>(value: &T) -> ToolResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Result table as an array of rows, each carrying its element `index`.
fn rows<T: Serialize>(table: &BTreeMap<usize, T>) -> ToolResult<Value> {
    table
        .iter()
        .map(|(&index, row)| -> ToolResult<Value> {
            let mut value = to_json(row)?;
            if let Value::Object(fields) = &mut value {
                fields.insert("index".to_string(), json!(index));
            }
            Ok(value)
        })
        .collect::<ToolResult<Vec<_>>>()
        .map(Value::Array)
}

fn power_flow_payload(results: &PowerFlowResults) -> ToolResult<Value> {
    Ok(json!({
        "converged": results.converged,
        "algorithm": results.algorithm,
        "iterations": results.iterations,
        "max_mismatch_mva": results.max_mismatch_mva,
        "res_bus": rows(&results.bus)?,
        "res_line": rows(&results.line)?,
        "res_trafo": rows(&results.trafo)?,
        "res_ext_grid": rows(&results.ext_grid)?,
        "res_gen": rows(&results.gen)?,
    }))
}

// ----------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------

/// Runs one tool call against the session. Failures become error results;
/// nothing propagates to the transport.
pub fn dispatch(session: &mut Session, name: &str, arguments: Option<Value>) -> ToolCallResult {
    debug!(tool = name, "tool call");
    let arguments = match arguments {
        None | Some(Value::Null) => json!({}),
        Some(value @ Value::Object(_)) => value,
        Some(_) => {
            return ToolCallResult::error(&ToolError::invalid_argument(format!(
                "arguments for {name} must be an object"
            )))
        }
    };
    match call(session, name, arguments) {
        Ok((message, data)) => ToolCallResult::success(message, data),
        Err(err) => {
            warn!(tool = name, error_kind = err.kind(), error = %err, "tool call failed");
            ToolCallResult::error(&err)
        }
    }
}

fn call(session: &mut Session, name: &str, arguments: Value) -> ToolResult<(String, Value)> {
    match name {
        "create_empty_network" => {
            let args: CreateEmptyNetworkArgs = parse_args(name, arguments)?;
            let summary = session.create_empty_network(args.name, args.f_hz, args.sn_mva)?;
            Ok((
                "Empty network created successfully".to_string(),
                json!({ "network_info": to_json(&summary)? }),
            ))
        }
        "create_example_network" => {
            let args: CreateExampleNetworkArgs = parse_args(name, arguments)?;
            let case: CaseName = parse_enum(&args.case)?;
            let summary = session.create_example_network(case)?;
            Ok((
                format!("Example network '{case}' created: {}", case.description()),
                json!({ "case": case.as_str(), "network_info": to_json(&summary)? }),
            ))
        }
        "load_network" => {
            let args: FileArgs = parse_args(name, arguments)?;
            let outcome = session.load_network(&args.file_path)?;
            Ok((
                format!("Network loaded successfully from {}", args.file_path.display()),
                json!({
                    "network_info": to_json(&outcome.summary)?,
                    "issues": to_json(&outcome.issues)?,
                }),
            ))
        }
        "save_network" => {
            let args: FileArgs = parse_args(name, arguments)?;
            let summary = session.save_network(&args.file_path)?;
            Ok((
                format!("Network saved successfully to {}", args.file_path.display()),
                json!({ "network_info": to_json(&summary)? }),
            ))
        }
        "add_bus" => {
            let args: AddBusArgs = parse_args(name, arguments)?;
            let bus_type: BusType = parse_enum(&args.bus_type)?;
            let index = session.add_bus(args.name, args.vn_kv, bus_type, args.zone)?;
            Ok((format!("Added bus {index}"), json!({ "index": index })))
        }
        "add_line" => {
            let args: AddLineArgs = parse_args(name, arguments)?;
            let index = session.add_line(
                args.from_bus,
                args.to_bus,
                args.length,
                &args.std_type,
                args.name,
            )?;
            Ok((
                format!(
                    "Added line {index} from bus {} to bus {} ({}, {} km)",
                    args.from_bus, args.to_bus, args.std_type, args.length
                ),
                json!({ "index": index }),
            ))
        }
        "add_load" => {
            let args: AddLoadArgs = parse_args(name, arguments)?;
            let index = session.add_load(args.bus, args.p_mw, args.q_mvar, args.name)?;
            Ok((format!("Added load {index} at bus {}", args.bus), json!({ "index": index })))
        }
        "add_generator" => {
            let args: AddGeneratorArgs = parse_args(name, arguments)?;
            let index = session.add_generator(
                args.bus,
                args.p_mw,
                args.vm_pu,
                (args.min_q_mvar, args.max_q_mvar),
                args.name,
            )?;
            Ok((
                format!("Added generator {index} at bus {}", args.bus),
                json!({ "index": index }),
            ))
        }
        "add_ext_grid" => {
            let args: AddExtGridArgs = parse_args(name, arguments)?;
            let index = session.add_ext_grid(args.bus, args.vm_pu, args.va_degree, args.name)?;
            Ok((
                format!("Added external grid {index} at bus {}", args.bus),
                json!({ "index": index }),
            ))
        }
        "add_transformer" => {
            let args: AddTransformerArgs = parse_args(name, arguments)?;
            let index =
                session.add_transformer(args.hv_bus, args.lv_bus, &args.std_type, args.name)?;
            Ok((
                format!(
                    "Added transformer {index} between bus {} and bus {} ({})",
                    args.hv_bus, args.lv_bus, args.std_type
                ),
                json!({ "index": index }),
            ))
        }
        "add_shunt" => {
            let args: AddShuntArgs = parse_args(name, arguments)?;
            let index = session.add_shunt(args.bus, args.p_mw, args.q_mvar, args.name)?;
            Ok((format!("Added shunt {index} at bus {}", args.bus), json!({ "index": index })))
        }
        "add_switch" => {
            let args: AddSwitchArgs = parse_args(name, arguments)?;
            let target = SwitchTarget::from_code(&args.et, args.element)?;
            let index = session.add_switch(args.bus, target, args.closed, args.name)?;
            Ok((format!("Added switch {index} at bus {}", args.bus), json!({ "index": index })))
        }
        "remove_element" => {
            let args: ElementArgs = parse_args(name, arguments)?;
            let kind: ElementKind = parse_enum(&args.element_type)?;
            let summary = session.remove_element(kind, args.index)?;
            Ok((
                format!("Removed {kind} {}", args.index),
                json!({ "index": args.index, "network_info": to_json(&summary)? }),
            ))
        }
        "set_in_service" => {
            let args: SetInServiceArgs = parse_args(name, arguments)?;
            let kind: ElementKind = parse_enum(&args.element_type)?;
            let previous = session.set_in_service(kind, args.index, args.in_service)?;
            let state = if args.in_service { "in service" } else { "out of service" };
            Ok((
                format!("{kind} {} is now {state}", args.index),
                json!({
                    "index": args.index,
                    "in_service": args.in_service,
                    "previous": previous,
                }),
            ))
        }
        "run_power_flow" => {
            let args: RunPowerFlowArgs = parse_args(name, arguments)?;
            let overrides = PowerFlowOverrides {
                algorithm: args
                    .algorithm
                    .as_deref()
                    .map(parse_enum::<Algorithm>)
                    .transpose()?,
                calculate_voltage_angles: args.calculate_voltage_angles,
                max_iteration: args.max_iteration,
                tolerance_mva: args.tolerance_mva,
            };
            let results = session.run_power_flow(&overrides)?;
            let message = if results.converged {
                "Power flow calculation completed successfully".to_string()
            } else {
                format!(
                    "Power flow did not converge within {} iterations",
                    results.iterations
                )
            };
            Ok((message, json!({ "results": power_flow_payload(&results)? })))
        }
        "run_contingency_analysis" => {
            let args: RunContingencyArgs = parse_args(name, arguments)?;
            let contingency_type: ContingencyType = parse_enum(&args.contingency_type)?;
            let kinds = args
                .elements
                .map(|names| {
                    names
                        .iter()
                        .map(|n| parse_enum::<ElementKind>(n))
                        .collect::<ToolResult<Vec<_>>>()
                })
                .transpose()?;
            let limits = LimitOverrides {
                vm_min_pu: args.vm_min_pu,
                vm_max_pu: args.vm_max_pu,
                max_loading_percent: args.max_loading_percent,
            };
            let report = session.run_contingency_analysis(contingency_type, kinds, &limits)?;
            let summary = &report.summary;
            Ok((
                format!(
                    "Contingency analysis completed: {} cases, {} converged, {} with violations",
                    summary.total, summary.converged, summary.with_violations
                ),
                json!({
                    "contingency_type": report.contingency_type,
                    "results": to_json(&report.outcomes)?,
                    "summary": to_json(summary)?,
                }),
            ))
        }
        "get_network_info" => {
            let _: NoArgs = parse_args(name, arguments)?;
            let info = session.get_network_info()?;
            Ok((
                "Network information retrieved successfully".to_string(),
                json!({ "info": to_json(&info)? }),
            ))
        }
        "list_std_types" => {
            let args: ListStdTypesArgs = parse_args(name, arguments)?;
            let kind: ElementKind = parse_enum(&args.element_type)?;
            let entries = session.list_std_types(kind)?;
            Ok((
                format!("{} {kind} standard types", entries.len()),
                json!({ "element_type": kind, "std_types": to_json(&entries)? }),
            ))
        }
        other => Err(ToolError::invalid_argument(format!("unknown tool '{other}'"))),
    }
}

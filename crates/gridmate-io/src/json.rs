//! pandapower-style JSON codec.
//!
//! The file is a `pandapowerNet` object whose element tables are pandas
//! DataFrames serialized in `split` orientation, each stored as a JSON string
//! inside the outer document. Scalars (`name`, `f_hz`, `sn_mva`) sit next to
//! the tables. Columns the model does not use are written with neutral
//! defaults so the file stays loadable by pandapower itself.
//!
//! Reference: <https://pandapower.readthedocs.io/en/latest/file_io.html>

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use gridmate_core::std_types::line_std_type;
use gridmate_core::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

use crate::ImportResult;

const FORMAT_VERSION: &str = "2.13.1";
const META_KEY: &str = "gridmate_meta";

#[derive(Debug, Deserialize)]
struct PandapowerJson {
    _module: String,
    _class: String,
    _object: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DataFrameJson {
    _class: String,
    _object: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataFrameContent {
    columns: Vec<String>,
    index: Vec<usize>,
    data: Vec<Vec<Value>>,
}

/// Column-name lookup over one parsed DataFrame.
struct DataFrameView<'a> {
    content: &'a DataFrameContent,
    col_map: HashMap<&'a str, usize>,
}

impl<'a> DataFrameView<'a> {
    fn new(content: &'a DataFrameContent) -> Self {
        let col_map = content
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        Self { content, col_map }
    }

    fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.content.data.len()
    }

    /// pandas index of a row
    fn index(&self, row: usize) -> usize {
        self.content.index.get(row).copied().unwrap_or(row)
    }

    fn get(&self, row: usize, col: &str) -> Option<&'a Value> {
        let col_idx = self.col_map.get(col)?;
        self.content.data.get(row)?.get(*col_idx)
    }

    fn f64(&self, row: usize, col: &str) -> Option<f64> {
        self.get(row, col).and_then(Value::as_f64)
    }

    /// Integer cell; pandas writes integer columns with NaNs as floats.
    fn usize(&self, row: usize, col: &str) -> Option<usize> {
        match self.get(row, col)? {
            Value::Number(n) => n.as_u64().map(|v| v as usize).or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as usize)
            }),
            _ => None,
        }
    }

    fn bool(&self, row: usize, col: &str) -> Option<bool> {
        match self.get(row, col)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|f| f != 0.0),
            _ => None,
        }
    }

    fn string(&self, row: usize, col: &str) -> Option<String> {
        match self.get(row, col)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn parse_error(context: &str, err: impl std::fmt::Display) -> GridError {
    GridError::Parse(format!("{context}: {err}"))
}

fn table_content(object: &Map<String, Value>, table: &str) -> GridResult<Option<DataFrameContent>> {
    let Some(value) = object.get(table) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let frame: DataFrameJson = serde_json::from_value(value.clone())
        .map_err(|e| parse_error(&format!("table '{table}'"), e))?;
    if frame._class != "DataFrame" {
        return Err(GridError::Parse(format!(
            "table '{table}' is a {} rather than a DataFrame",
            frame._class
        )));
    }
    let content = serde_json::from_str(&frame._object)
        .map_err(|e| parse_error(&format!("table '{table}' content"), e))?;
    Ok(Some(content))
}

// ============================================================================
// Reading
// ============================================================================

pub fn read_json(path: &Path) -> GridResult<ImportResult> {
    let content = fs::read_to_string(path)?;
    parse_json(&content)
}

pub fn parse_json(content: &str) -> GridResult<ImportResult> {
    let doc: PandapowerJson =
        serde_json::from_str(content).map_err(|e| parse_error("invalid network JSON", e))?;
    if doc._class != "pandapowerNet" {
        return Err(GridError::Parse(format!(
            "expected a pandapowerNet object, found {}.{}",
            doc._module, doc._class
        )));
    }
    build_network(&doc._object)
}

fn build_network(object: &Map<String, Value>) -> GridResult<ImportResult> {
    let mut diag = Diagnostics::new();
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let f_hz = object.get("f_hz").and_then(Value::as_f64).unwrap_or_else(|| {
        diag.add_warning("import", "f_hz missing, using 50 Hz");
        DEFAULT_F_HZ
    });
    let sn_mva = object
        .get("sn_mva")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_SN_MVA);
    let mut net = PowerNet::new(name, f_hz, sn_mva);

    if let Some(content) = table_content(object, "bus")? {
        read_buses(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "line")? {
        read_lines(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "trafo")? {
        read_trafos(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "gen")? {
        read_gens(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "ext_grid")? {
        read_ext_grids(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "load")? {
        read_loads(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "shunt")? {
        read_shunts(&DataFrameView::new(&content), &mut net, &mut diag);
    }
    if let Some(content) = table_content(object, "switch")? {
        read_switches(&DataFrameView::new(&content), &mut net, &mut diag);
    }

    if let Some(next) = object
        .get(META_KEY)
        .and_then(|m| m.get("next_index"))
        .and_then(Value::as_object)
    {
        reserve_indices(&mut net, next, &mut diag);
    }

    Ok(ImportResult {
        network: net,
        diagnostics: diag,
    })
}

fn reserve_indices(net: &mut PowerNet, next: &Map<String, Value>, diag: &mut Diagnostics) {
    let get = |table: &str| {
        let raw = next.get(table).and_then(Value::as_u64).unwrap_or(0);
        usize::try_from(raw).unwrap_or(usize::MAX)
    };
    let results = [
        ("bus", net.bus.reserve_through(get("bus"))),
        ("line", net.line.reserve_through(get("line"))),
        ("trafo", net.trafo.reserve_through(get("trafo"))),
        ("gen", net.gen.reserve_through(get("gen"))),
        ("ext_grid", net.ext_grid.reserve_through(get("ext_grid"))),
        ("load", net.load.reserve_through(get("load"))),
        ("shunt", net.shunt.reserve_through(get("shunt"))),
        ("switch", net.switch.reserve_through(get("switch"))),
    ];
    for (table, result) in results {
        if let Err(err) = result {
            diag.add_warning_with_entity("import", &format!("{err}, counter ignored"), table);
        }
    }
}

/// Inserts a row at its file index, recording an error and skipping the
/// row when the index is taken or out of range.
fn place<T>(table: &mut Table<T>, diag: &mut Diagnostics, kind: &str, idx: usize, row: T) {
    if let Err(err) = table.insert_at(idx, row) {
        let entity = format!("{kind} {idx}");
        diag.add_error_with_entity("import", &format!("{err}, row skipped"), &entity);
    }
}

/// `parallel` column, clamped to at least one system.
fn parallel(view: &DataFrameView, row: usize) -> u32 {
    view.usize(row, "parallel")
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(1)
        .max(1)
}

/// Checks that `bus` was loaded; records an error for `entity` otherwise.
fn known_bus(net: &PowerNet, diag: &mut Diagnostics, entity: &str, bus: Option<usize>) -> Option<usize> {
    match bus {
        Some(b) if net.bus.contains(b) => Some(b),
        Some(b) => {
            diag.add_error_with_entity("reference", &format!("unknown bus {b}, row skipped"), entity);
            None
        }
        None => {
            diag.add_error_with_entity("import", "missing bus column, row skipped", entity);
            None
        }
    }
}

fn read_buses(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let Some(vn_kv) = view.f64(row, "vn_kv").filter(|v| *v > 0.0) else {
            diag.add_error_with_entity(
                "import",
                "missing or non-positive vn_kv, row skipped",
                &format!("bus {idx}"),
            );
            continue;
        };
        let bus_type = view
            .string(row, "type")
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();
        place(
            &mut net.bus,
            diag,
            "bus",
            idx,
            Bus {
                name: view.string(row, "name").unwrap_or_else(|| format!("Bus {idx}")),
                vn_kv,
                bus_type,
                zone: view.string(row, "zone"),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_lines(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let entity = format!("line {idx}");
        let Some(from_bus) = known_bus(net, diag, &entity, view.usize(row, "from_bus")) else {
            continue;
        };
        let Some(to_bus) = known_bus(net, diag, &entity, view.usize(row, "to_bus")) else {
            continue;
        };
        let std_type = view.string(row, "std_type");
        let catalogue = std_type.as_deref().and_then(|t| line_std_type(t).ok());
        let param = |col: &str, fallback: Option<f64>| view.f64(row, col).or(fallback);
        let (Some(r), Some(x)) = (
            param("r_ohm_per_km", catalogue.map(|c| c.r_ohm_per_km)),
            param("x_ohm_per_km", catalogue.map(|c| c.x_ohm_per_km)),
        ) else {
            diag.add_error_with_entity("import", "missing impedance data, row skipped", &entity);
            continue;
        };
        place(
            &mut net.line,
            diag,
            "line",
            idx,
            Line {
                name: view.string(row, "name"),
                std_type,
                from_bus,
                to_bus,
                length_km: view.f64(row, "length_km").unwrap_or(1.0),
                r_ohm_per_km: r,
                x_ohm_per_km: x,
                c_nf_per_km: param("c_nf_per_km", catalogue.map(|c| c.c_nf_per_km)).unwrap_or(0.0),
                max_i_ka: param("max_i_ka", catalogue.map(|c| c.max_i_ka)).unwrap_or(f64::INFINITY),
                df: view.f64(row, "df").unwrap_or(1.0),
                parallel: parallel(view, row),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_trafos(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let entity = format!("trafo {idx}");
        let Some(hv_bus) = known_bus(net, diag, &entity, view.usize(row, "hv_bus")) else {
            continue;
        };
        let Some(lv_bus) = known_bus(net, diag, &entity, view.usize(row, "lv_bus")) else {
            continue;
        };
        let required = ["sn_mva", "vn_hv_kv", "vn_lv_kv", "vk_percent"];
        let values: Vec<Option<f64>> = required.iter().map(|c| view.f64(row, c)).collect();
        let &[Some(sn_mva), Some(vn_hv_kv), Some(vn_lv_kv), Some(vk_percent)] = values.as_slice() else {
            diag.add_error_with_entity("import", "missing rating data, row skipped", &entity);
            continue;
        };
        if view.string(row, "tap_side").is_some_and(|s| s == "lv") {
            diag.add_warning_with_entity(
                "import",
                "LV-side tap changer treated as HV-side",
                &entity,
            );
        }
        place(
            &mut net.trafo,
            diag,
            "trafo",
            idx,
            Transformer {
                name: view.string(row, "name"),
                std_type: view.string(row, "std_type"),
                hv_bus,
                lv_bus,
                sn_mva,
                vn_hv_kv,
                vn_lv_kv,
                vk_percent,
                vkr_percent: view.f64(row, "vkr_percent").unwrap_or(0.0),
                shift_degree: view.f64(row, "shift_degree").unwrap_or(0.0),
                tap_pos: view.f64(row, "tap_pos"),
                tap_neutral: view.f64(row, "tap_neutral"),
                tap_step_percent: view.f64(row, "tap_step_percent"),
                parallel: parallel(view, row),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_gens(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let Some(bus) = known_bus(net, diag, &format!("gen {idx}"), view.usize(row, "bus")) else {
            continue;
        };
        place(
            &mut net.gen,
            diag,
            "gen",
            idx,
            Gen {
                name: view.string(row, "name"),
                bus,
                p_mw: view.f64(row, "p_mw").unwrap_or(0.0) * view.f64(row, "scaling").unwrap_or(1.0),
                vm_pu: view.f64(row, "vm_pu").unwrap_or(1.0),
                min_q_mvar: view.f64(row, "min_q_mvar"),
                max_q_mvar: view.f64(row, "max_q_mvar"),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_ext_grids(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let Some(bus) = known_bus(net, diag, &format!("ext_grid {idx}"), view.usize(row, "bus"))
        else {
            continue;
        };
        place(
            &mut net.ext_grid,
            diag,
            "ext_grid",
            idx,
            ExtGrid {
                name: view.string(row, "name"),
                bus,
                vm_pu: view.f64(row, "vm_pu").unwrap_or(1.0),
                va_degree: view.f64(row, "va_degree").unwrap_or(0.0),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_loads(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let entity = format!("load {idx}");
        let Some(bus) = known_bus(net, diag, &entity, view.usize(row, "bus")) else {
            continue;
        };
        let voltage_dependent = ["const_z_percent", "const_i_percent"]
            .iter()
            .any(|c| view.f64(row, c).is_some_and(|v| v != 0.0));
        if voltage_dependent {
            diag.add_warning_with_entity(
                "import",
                "voltage-dependent load modelled as constant power",
                &entity,
            );
        }
        place(
            &mut net.load,
            diag,
            "load",
            idx,
            Load {
                name: view.string(row, "name"),
                bus,
                p_mw: view.f64(row, "p_mw").unwrap_or(0.0),
                q_mvar: view.f64(row, "q_mvar").unwrap_or(0.0),
                scaling: view.f64(row, "scaling").unwrap_or(1.0),
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_shunts(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let Some(bus) = known_bus(net, diag, &format!("shunt {idx}"), view.usize(row, "bus")) else {
            continue;
        };
        let step = view.f64(row, "step").unwrap_or(1.0);
        place(
            &mut net.shunt,
            diag,
            "shunt",
            idx,
            Shunt {
                name: view.string(row, "name"),
                bus,
                p_mw: view.f64(row, "p_mw").unwrap_or(0.0) * step,
                q_mvar: view.f64(row, "q_mvar").unwrap_or(0.0) * step,
                in_service: view.bool(row, "in_service").unwrap_or(true),
            },
        );
    }
}

fn read_switches(view: &DataFrameView, net: &mut PowerNet, diag: &mut Diagnostics) {
    for row in view.rows() {
        let idx = view.index(row);
        let entity = format!("switch {idx}");
        let Some(bus) = known_bus(net, diag, &entity, view.usize(row, "bus")) else {
            continue;
        };
        let target = match (view.string(row, "et"), view.usize(row, "element")) {
            (Some(et), Some(element)) => SwitchTarget::from_code(&et, element),
            _ => Err(GridError::validation("missing et/element")),
        };
        let target = match target {
            Ok(t) => t,
            Err(err) => {
                diag.add_error_with_entity("import", &format!("{err}, row skipped"), &entity);
                continue;
            }
        };
        let target_known = match target {
            SwitchTarget::Bus(b) => net.bus.contains(b),
            SwitchTarget::Line(l) => net.line.contains(l),
            SwitchTarget::Trafo(t) => net.trafo.contains(t),
        };
        if !target_known {
            diag.add_error_with_entity(
                "reference",
                &format!("unknown target {}:{}, row skipped", target.code(), target.element()),
                &entity,
            );
            continue;
        }
        place(
            &mut net.switch,
            diag,
            "switch",
            idx,
            Switch {
                name: view.string(row, "name"),
                bus,
                target,
                closed: view.bool(row, "closed").unwrap_or(true),
            },
        );
    }
}

// ============================================================================
// Writing
// ============================================================================

fn f64_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn opt_f64_value(value: Option<f64>) -> Value {
    value.map(f64_value).unwrap_or(Value::Null)
}

fn opt_str_value(value: Option<&str>) -> Value {
    value
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

fn make_dataframe(columns: &[(&str, &str)], index: Vec<usize>, rows: Vec<Vec<Value>>) -> GridResult<Value> {
    let object = DataFrameContent {
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        index,
        data: rows,
    };
    let obj_str =
        serde_json::to_string(&object).map_err(|e| parse_error("serializing table", e))?;
    let dtype: Map<String, Value> = columns
        .iter()
        .map(|(name, dtype)| (name.to_string(), Value::String(dtype.to_string())))
        .collect();
    Ok(json!({
        "_module": "pandas.core.frame",
        "_class": "DataFrame",
        "_object": obj_str,
        "orient": "split",
        "dtype": dtype,
        "is_multiindex": false,
        "is_multicolumn": false,
    }))
}

fn table<T>(
    rows: &Table<T>,
    columns: &[(&str, &str)],
    row: impl Fn(&T) -> Vec<Value>,
) -> GridResult<Value> {
    make_dataframe(
        columns,
        rows.indices().collect(),
        rows.values().map(row).collect(),
    )
}

pub fn write_json(net: &PowerNet, path: &Path) -> GridResult<()> {
    let doc = to_json_value(net)?;
    let text =
        serde_json::to_string_pretty(&doc).map_err(|e| parse_error("serializing network", e))?;
    fs::write(path, text)?;
    Ok(())
}

pub fn to_json_value(net: &PowerNet) -> GridResult<Value> {
    let bus = table(
        &net.bus,
        &[
            ("name", "object"),
            ("vn_kv", "float64"),
            ("type", "object"),
            ("zone", "object"),
            ("in_service", "bool"),
        ],
        |b| {
            vec![
                Value::String(b.name.clone()),
                f64_value(b.vn_kv),
                Value::String(b.bus_type.code().to_string()),
                opt_str_value(b.zone.as_deref()),
                Value::Bool(b.in_service),
            ]
        },
    )?;

    let line = table(
        &net.line,
        &[
            ("name", "object"),
            ("std_type", "object"),
            ("from_bus", "uint32"),
            ("to_bus", "uint32"),
            ("length_km", "float64"),
            ("r_ohm_per_km", "float64"),
            ("x_ohm_per_km", "float64"),
            ("c_nf_per_km", "float64"),
            ("g_us_per_km", "float64"),
            ("max_i_ka", "float64"),
            ("df", "float64"),
            ("parallel", "uint32"),
            ("type", "object"),
            ("in_service", "bool"),
        ],
        |l| {
            vec![
                opt_str_value(l.name.as_deref()),
                opt_str_value(l.std_type.as_deref()),
                json!(l.from_bus),
                json!(l.to_bus),
                f64_value(l.length_km),
                f64_value(l.r_ohm_per_km),
                f64_value(l.x_ohm_per_km),
                f64_value(l.c_nf_per_km),
                f64_value(0.0),
                f64_value(l.max_i_ka),
                f64_value(l.df),
                json!(l.parallel),
                Value::String("cs".to_string()),
                Value::Bool(l.in_service),
            ]
        },
    )?;

    let trafo = table(
        &net.trafo,
        &[
            ("name", "object"),
            ("std_type", "object"),
            ("hv_bus", "uint32"),
            ("lv_bus", "uint32"),
            ("sn_mva", "float64"),
            ("vn_hv_kv", "float64"),
            ("vn_lv_kv", "float64"),
            ("vk_percent", "float64"),
            ("vkr_percent", "float64"),
            ("pfe_kw", "float64"),
            ("i0_percent", "float64"),
            ("shift_degree", "float64"),
            ("tap_side", "object"),
            ("tap_neutral", "float64"),
            ("tap_step_percent", "float64"),
            ("tap_pos", "float64"),
            ("parallel", "uint32"),
            ("df", "float64"),
            ("in_service", "bool"),
        ],
        |t| {
            vec![
                opt_str_value(t.name.as_deref()),
                opt_str_value(t.std_type.as_deref()),
                json!(t.hv_bus),
                json!(t.lv_bus),
                f64_value(t.sn_mva),
                f64_value(t.vn_hv_kv),
                f64_value(t.vn_lv_kv),
                f64_value(t.vk_percent),
                f64_value(t.vkr_percent),
                f64_value(0.0),
                f64_value(0.0),
                f64_value(t.shift_degree),
                Value::String("hv".to_string()),
                opt_f64_value(t.tap_neutral),
                opt_f64_value(t.tap_step_percent),
                opt_f64_value(t.tap_pos),
                json!(t.parallel),
                f64_value(1.0),
                Value::Bool(t.in_service),
            ]
        },
    )?;

    let gen = table(
        &net.gen,
        &[
            ("name", "object"),
            ("bus", "uint32"),
            ("p_mw", "float64"),
            ("vm_pu", "float64"),
            ("min_q_mvar", "float64"),
            ("max_q_mvar", "float64"),
            ("scaling", "float64"),
            ("slack", "bool"),
            ("in_service", "bool"),
        ],
        |g| {
            vec![
                opt_str_value(g.name.as_deref()),
                json!(g.bus),
                f64_value(g.p_mw),
                f64_value(g.vm_pu),
                opt_f64_value(g.min_q_mvar),
                opt_f64_value(g.max_q_mvar),
                f64_value(1.0),
                Value::Bool(false),
                Value::Bool(g.in_service),
            ]
        },
    )?;

    let ext_grid = table(
        &net.ext_grid,
        &[
            ("name", "object"),
            ("bus", "uint32"),
            ("vm_pu", "float64"),
            ("va_degree", "float64"),
            ("in_service", "bool"),
        ],
        |e| {
            vec![
                opt_str_value(e.name.as_deref()),
                json!(e.bus),
                f64_value(e.vm_pu),
                f64_value(e.va_degree),
                Value::Bool(e.in_service),
            ]
        },
    )?;

    let load = table(
        &net.load,
        &[
            ("name", "object"),
            ("bus", "uint32"),
            ("p_mw", "float64"),
            ("q_mvar", "float64"),
            ("const_z_percent", "float64"),
            ("const_i_percent", "float64"),
            ("scaling", "float64"),
            ("in_service", "bool"),
            ("type", "object"),
        ],
        |l| {
            vec![
                opt_str_value(l.name.as_deref()),
                json!(l.bus),
                f64_value(l.p_mw),
                f64_value(l.q_mvar),
                f64_value(0.0),
                f64_value(0.0),
                f64_value(l.scaling),
                Value::Bool(l.in_service),
                Value::String("wye".to_string()),
            ]
        },
    )?;

    let shunt = table(
        &net.shunt,
        &[
            ("name", "object"),
            ("bus", "uint32"),
            ("p_mw", "float64"),
            ("q_mvar", "float64"),
            ("vn_kv", "float64"),
            ("step", "uint32"),
            ("max_step", "uint32"),
            ("in_service", "bool"),
        ],
        |s| {
            let vn_kv = net.bus.get(s.bus).map(|b| b.vn_kv);
            vec![
                opt_str_value(s.name.as_deref()),
                json!(s.bus),
                f64_value(s.p_mw),
                f64_value(s.q_mvar),
                opt_f64_value(vn_kv),
                json!(1),
                json!(1),
                Value::Bool(s.in_service),
            ]
        },
    )?;

    let switch = table(
        &net.switch,
        &[
            ("bus", "int64"),
            ("element", "int64"),
            ("et", "object"),
            ("type", "object"),
            ("closed", "bool"),
            ("name", "object"),
            ("z_ohm", "float64"),
        ],
        |s| {
            vec![
                json!(s.bus),
                json!(s.target.element()),
                Value::String(s.target.code().to_string()),
                Value::Null,
                Value::Bool(s.closed),
                opt_str_value(s.name.as_deref()),
                f64_value(0.0),
            ]
        },
    )?;

    let next_index = json!({
        "bus": net.bus.next_index(),
        "line": net.line.next_index(),
        "trafo": net.trafo.next_index(),
        "gen": net.gen.next_index(),
        "ext_grid": net.ext_grid.next_index(),
        "load": net.load.next_index(),
        "shunt": net.shunt.next_index(),
        "switch": net.switch.next_index(),
    });

    Ok(json!({
        "_module": "pandapower.auxiliary",
        "_class": "pandapowerNet",
        "_object": {
            "bus": bus,
            "line": line,
            "trafo": trafo,
            "gen": gen,
            "ext_grid": ext_grid,
            "load": load,
            "shunt": shunt,
            "switch": switch,
            "name": net.name,
            "f_hz": f64_value(net.f_hz),
            "sn_mva": f64_value(net.sn_mva),
            "version": FORMAT_VERSION,
            META_KEY: {
                "writer": concat!("gridmate ", env!("CARGO_PKG_VERSION")),
                "saved_at": Utc::now().to_rfc3339(),
                "next_index": next_index,
            },
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PowerNet {
        let mut net = PowerNet::new("sample", 50.0, 1.0);
        let b0 = net.create_bus("mv", 20.0, BusType::Busbar, Some("north".into())).unwrap();
        let b1 = net.create_bus("lv", 0.4, BusType::Node, None).unwrap();
        let b2 = net.create_bus("lv2", 0.4, BusType::Node, None).unwrap();
        net.create_ext_grid(b0, 1.02, 0.0, Some("grid".into())).unwrap();
        net.create_transformer(b0, b1, "0.4 MVA 20/0.4 kV", None).unwrap();
        let l = net.create_line(b1, b2, 0.1, "NAYY 4x50 SE", Some("feeder".into())).unwrap();
        net.create_load(b2, 0.1, 0.05, None).unwrap();
        net.create_shunt(b1, 0.0, -0.02, None).unwrap();
        net.create_switch(b1, SwitchTarget::Line(l), true, None).unwrap();
        net
    }

    #[test]
    fn test_json_preserves_tables() {
        let net = sample();
        let text = serde_json::to_string(&to_json_value(&net).unwrap()).unwrap();
        let loaded = parse_json(&text).unwrap();
        assert!(!loaded.diagnostics.has_errors(), "{:?}", loaded.diagnostics);
        let back = loaded.network;
        assert_eq!(back.counts(), net.counts());
        assert_eq!(back.name, "sample");
        assert_eq!(back.bus.get(0), net.bus.get(0));
        assert_eq!(back.line.get(0), net.line.get(0));
        assert_eq!(back.trafo.get(0), net.trafo.get(0));
        assert_eq!(back.switch.get(0), net.switch.get(0));
    }

    #[test]
    fn test_next_index_survives_reload() {
        let mut net = sample();
        let extra = net.create_bus("tmp", 0.4, BusType::Node, None).unwrap();
        net.remove_element(ElementKind::Bus, extra).unwrap();
        let text = serde_json::to_string(&to_json_value(&net).unwrap()).unwrap();
        let mut back = parse_json(&text).unwrap().network;
        let fresh = back.create_bus("new", 0.4, BusType::Node, None).unwrap();
        assert!(fresh > extra);
    }

    #[test]
    fn test_rejects_non_network_document() {
        let err = parse_json(r#"{"_module": "x", "_class": "Other", "_object": {}}"#).unwrap_err();
        assert!(matches!(err, GridError::Parse(_)));
        assert!(parse_json("not json").is_err());
    }

    #[test]
    fn test_dangling_reference_skipped_with_error() {
        let bus = make_dataframe(
            &[("name", "object"), ("vn_kv", "float64")],
            vec![0],
            vec![vec![json!("a"), json!(20.0)]],
        )
        .unwrap();
        let load = make_dataframe(
            &[("bus", "uint32"), ("p_mw", "float64")],
            vec![0, 1],
            vec![vec![json!(0), json!(1.0)], vec![json!(5), json!(2.0)]],
        )
        .unwrap();
        let doc = json!({
            "_module": "pandapower.auxiliary",
            "_class": "pandapowerNet",
            "_object": {"bus": bus, "load": load, "f_hz": 60.0},
        });
        let loaded = parse_json(&doc.to_string()).unwrap();
        assert_eq!(loaded.network.counts().loads, 1);
        assert_eq!(loaded.network.f_hz, 60.0);
        assert_eq!(loaded.diagnostics.error_count(), 1);
    }

    #[test]
    fn test_line_parameters_from_std_type() {
        let bus = make_dataframe(
            &[("vn_kv", "float64")],
            vec![0, 1],
            vec![vec![json!(0.4)], vec![json!(0.4)]],
        )
        .unwrap();
        let line = make_dataframe(
            &[("from_bus", "uint32"), ("to_bus", "uint32"), ("std_type", "object"), ("length_km", "float64")],
            vec![3],
            vec![vec![json!(0), json!(1), json!("NAYY 4x150 SE"), json!(0.5)]],
        )
        .unwrap();
        let doc = json!({
            "_module": "pandapower.auxiliary",
            "_class": "pandapowerNet",
            "_object": {"bus": bus, "line": line},
        });
        let net = parse_json(&doc.to_string()).unwrap().network;
        let l = net.line.get(3).unwrap();
        assert_eq!(l.r_ohm_per_km, 0.208);
        assert_eq!(net.line.next_index(), 4);
    }

    fn two_bus_doc(index: Vec<usize>, meta: Value) -> String {
        let bus = make_dataframe(
            &[("name", "object"), ("vn_kv", "float64")],
            index,
            vec![vec![json!("a"), json!(20.0)], vec![json!("b"), json!(20.0)]],
        )
        .unwrap();
        json!({
            "_module": "pandapower.auxiliary",
            "_class": "pandapowerNet",
            "_object": {"bus": bus, "f_hz": 50.0, META_KEY: meta},
        })
        .to_string()
    }

    #[test]
    fn test_duplicate_index_keeps_first_row() {
        let loaded = parse_json(&two_bus_doc(vec![0, 0], Value::Null)).unwrap();
        assert_eq!(loaded.network.counts().buses, 1);
        assert_eq!(loaded.network.bus.get(0).unwrap().name, "a");
        assert_eq!(loaded.diagnostics.error_count(), 1);
        let issue = &loaded.diagnostics.issues[0];
        assert!(issue.message.contains("duplicate index 0"), "{}", issue.message);
        assert_eq!(issue.entity.as_deref(), Some("bus 0"));
    }

    #[test]
    fn test_out_of_range_index_skipped() {
        let loaded = parse_json(&two_bus_doc(vec![1, usize::MAX], Value::Null)).unwrap();
        assert_eq!(loaded.network.counts().buses, 1);
        assert_eq!(loaded.diagnostics.error_count(), 1);

        let mut net = loaded.network;
        assert_eq!(net.create_bus("c", 20.0, BusType::Node, None).unwrap(), 2);
    }

    #[test]
    fn test_oversized_next_index_ignored() {
        let meta = json!({"next_index": {"bus": u64::MAX, "line": 7}});
        let loaded = parse_json(&two_bus_doc(vec![0, 1], meta)).unwrap();
        assert!(!loaded.diagnostics.has_errors());
        assert_eq!(loaded.diagnostics.warning_count(), 1);

        let mut net = loaded.network;
        assert_eq!(net.bus.next_index(), 2);
        assert_eq!(net.line.next_index(), 7);
        assert_eq!(net.create_bus("c", 20.0, BusType::Node, None).unwrap(), 2);
    }

    #[test]
    fn test_exhausted_next_index_fails_cleanly() {
        let meta = json!({"next_index": {"bus": MAX_INDEX}});
        let mut net = parse_json(&two_bus_doc(vec![0, 1], meta)).unwrap().network;
        let err = net.create_bus("c", 20.0, BusType::Node, None).unwrap_err();
        assert!(matches!(err, GridError::Validation(_)));
        assert_eq!(net.counts().buses, 2);
    }

    #[test]
    fn test_parallel_clamped_after_narrowing() {
        let bus = make_dataframe(
            &[("vn_kv", "float64")],
            vec![0, 1],
            vec![vec![json!(0.4)], vec![json!(0.4)]],
        )
        .unwrap();
        let line = make_dataframe(
            &[("from_bus", "uint32"), ("to_bus", "uint32"), ("std_type", "object"), ("parallel", "uint32")],
            vec![0],
            vec![vec![json!(0), json!(1), json!("NAYY 4x150 SE"), json!(1u64 << 32)]],
        )
        .unwrap();
        let doc = json!({
            "_module": "pandapower.auxiliary",
            "_class": "pandapowerNet",
            "_object": {"bus": bus, "line": line},
        });
        let net = parse_json(&doc.to_string()).unwrap().network;
        assert_eq!(net.line.get(0).unwrap().parallel, u32::MAX);
    }
}

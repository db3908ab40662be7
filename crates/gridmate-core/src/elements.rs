//! Element records stored in the network tables.
//!
//! Field names follow the column names of the pandapower table layout
//! (`vn_kv`, `p_mw`, `vk_percent`, ...) so records map one-to-one onto the
//! interchange format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{GridError, GridResult};

/// Element classes of a network, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Bus,
    Line,
    Trafo,
    Gen,
    ExtGrid,
    Load,
    Shunt,
    Switch,
}

impl ElementKind {
    pub const ALL: [ElementKind; 8] = [
        ElementKind::Bus,
        ElementKind::Line,
        ElementKind::Trafo,
        ElementKind::Gen,
        ElementKind::ExtGrid,
        ElementKind::Load,
        ElementKind::Shunt,
        ElementKind::Switch,
    ];

    /// Table name used in files and tool payloads.
    pub fn table_name(&self) -> &'static str {
        match self {
            ElementKind::Bus => "bus",
            ElementKind::Line => "line",
            ElementKind::Trafo => "trafo",
            ElementKind::Gen => "gen",
            ElementKind::ExtGrid => "ext_grid",
            ElementKind::Load => "load",
            ElementKind::Shunt => "shunt",
            ElementKind::Switch => "switch",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for ElementKind {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bus" | "buses" => Ok(ElementKind::Bus),
            "line" | "lines" => Ok(ElementKind::Line),
            "trafo" | "trafos" | "transformer" | "transformers" => Ok(ElementKind::Trafo),
            "gen" | "generator" | "generators" => Ok(ElementKind::Gen),
            "ext_grid" | "external_grid" | "ext_grids" => Ok(ElementKind::ExtGrid),
            "load" | "loads" => Ok(ElementKind::Load),
            "shunt" | "shunts" => Ok(ElementKind::Shunt),
            "switch" | "switches" => Ok(ElementKind::Switch),
            other => Err(GridError::validation(format!(
                "unknown element class '{other}'"
            ))),
        }
    }
}

/// Bus type code: busbar `b`, node `n`, equivalent `e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BusType {
    #[default]
    #[serde(rename = "b")]
    Busbar,
    #[serde(rename = "n")]
    Node,
    #[serde(rename = "e")]
    Equivalent,
}

impl BusType {
    pub fn code(&self) -> &'static str {
        match self {
            BusType::Busbar => "b",
            BusType::Node => "n",
            BusType::Equivalent => "e",
        }
    }
}

impl FromStr for BusType {
    type Err = GridError;

    fn from_str(s: &str) -> GridResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b" | "busbar" => Ok(BusType::Busbar),
            "n" | "node" => Ok(BusType::Node),
            "e" | "equivalent" => Ok(BusType::Equivalent),
            other => Err(GridError::validation(format!(
                "invalid bus type '{other}', expected one of b, n, e"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub name: String,
    pub vn_kv: f64,
    #[serde(rename = "type")]
    pub bus_type: BusType,
    pub zone: Option<String>,
    pub in_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub name: Option<String>,
    pub std_type: Option<String>,
    pub from_bus: usize,
    pub to_bus: usize,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub c_nf_per_km: f64,
    pub max_i_ka: f64,
    /// Derating factor applied to `max_i_ka`
    pub df: f64,
    pub parallel: u32,
    pub in_service: bool,
}

impl Line {
    pub fn connects(&self, bus: usize) -> bool {
        self.from_bus == bus || self.to_bus == bus
    }
}

/// Two-winding transformer, tap changer on the HV side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub name: Option<String>,
    pub std_type: Option<String>,
    pub hv_bus: usize,
    pub lv_bus: usize,
    pub sn_mva: f64,
    pub vn_hv_kv: f64,
    pub vn_lv_kv: f64,
    pub vk_percent: f64,
    pub vkr_percent: f64,
    pub shift_degree: f64,
    pub tap_pos: Option<f64>,
    pub tap_neutral: Option<f64>,
    pub tap_step_percent: Option<f64>,
    pub parallel: u32,
    pub in_service: bool,
}

impl Transformer {
    pub fn connects(&self, bus: usize) -> bool {
        self.hv_bus == bus || self.lv_bus == bus
    }

    /// HV rated voltage after applying the tap position.
    pub fn effective_vn_hv_kv(&self) -> f64 {
        match (self.tap_pos, self.tap_step_percent) {
            (Some(pos), Some(step)) => {
                let neutral = self.tap_neutral.unwrap_or(0.0);
                self.vn_hv_kv * (1.0 + (pos - neutral) * step / 100.0)
            }
            _ => self.vn_hv_kv,
        }
    }
}

/// Voltage-controlled generator (PV bus).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gen {
    pub name: Option<String>,
    pub bus: usize,
    pub p_mw: f64,
    pub vm_pu: f64,
    pub min_q_mvar: Option<f64>,
    pub max_q_mvar: Option<f64>,
    pub in_service: bool,
}

/// Slack source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtGrid {
    pub name: Option<String>,
    pub bus: usize,
    pub vm_pu: f64,
    pub va_degree: f64,
    pub in_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub name: Option<String>,
    pub bus: usize,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub scaling: f64,
    pub in_service: bool,
}

impl Load {
    pub fn scaled_p_mw(&self) -> f64 {
        self.p_mw * self.scaling
    }

    pub fn scaled_q_mvar(&self) -> f64 {
        self.q_mvar * self.scaling
    }
}

/// Constant-impedance shunt; `p_mw`/`q_mvar` are consumed at 1.0 p.u.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shunt {
    pub name: Option<String>,
    pub bus: usize,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub in_service: bool,
}

/// What the far side of a switch is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchTarget {
    Bus(usize),
    Line(usize),
    Trafo(usize),
}

impl SwitchTarget {
    /// Builds a target from the `et` code and element index.
    pub fn from_code(code: &str, element: usize) -> GridResult<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "b" | "bus" => Ok(SwitchTarget::Bus(element)),
            "l" | "line" => Ok(SwitchTarget::Line(element)),
            "t" | "trafo" => Ok(SwitchTarget::Trafo(element)),
            other => Err(GridError::validation(format!(
                "invalid switch element type '{other}', expected one of b, l, t"
            ))),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SwitchTarget::Bus(_) => "b",
            SwitchTarget::Line(_) => "l",
            SwitchTarget::Trafo(_) => "t",
        }
    }

    pub fn element(&self) -> usize {
        match self {
            SwitchTarget::Bus(e) | SwitchTarget::Line(e) | SwitchTarget::Trafo(e) => *e,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub name: Option<String>,
    pub bus: usize,
    pub target: SwitchTarget,
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_kind_parse_aliases() {
        assert_eq!("line".parse::<ElementKind>().unwrap(), ElementKind::Line);
        assert_eq!("Transformer".parse::<ElementKind>().unwrap(), ElementKind::Trafo);
        assert_eq!("ext_grid".parse::<ElementKind>().unwrap(), ElementKind::ExtGrid);
        assert!("breaker".parse::<ElementKind>().is_err());
    }

    #[test]
    fn test_bus_type_codes() {
        for code in ["b", "n", "e"] {
            let ty: BusType = code.parse().unwrap();
            assert_eq!(ty.code(), code);
        }
        assert!("x".parse::<BusType>().is_err());
    }

    #[test]
    fn test_bus_type_serializes_as_code() {
        let json = serde_json::to_string(&BusType::Node).unwrap();
        assert_eq!(json, "\"n\"");
    }

    #[test]
    fn test_tap_changes_effective_voltage() {
        let trafo = Transformer {
            name: None,
            std_type: None,
            hv_bus: 0,
            lv_bus: 1,
            sn_mva: 25.0,
            vn_hv_kv: 110.0,
            vn_lv_kv: 20.0,
            vk_percent: 12.0,
            vkr_percent: 0.41,
            shift_degree: 150.0,
            tap_pos: Some(2.0),
            tap_neutral: Some(0.0),
            tap_step_percent: Some(1.5),
            parallel: 1,
            in_service: true,
        };
        assert!((trafo.effective_vn_hv_kv() - 113.3).abs() < 1e-9);
    }

    #[test]
    fn test_switch_target_from_code() {
        assert_eq!(SwitchTarget::from_code("l", 3).unwrap(), SwitchTarget::Line(3));
        assert_eq!(SwitchTarget::Trafo(1).code(), "t");
        assert!(SwitchTarget::from_code("z", 0).is_err());
    }
}

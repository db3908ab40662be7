//! Power-flow results attached to a network.
//!
//! Result tables are keyed by element index. Elements that were out of
//! service or isolated during the solve have no entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BusResult {
    pub vm_pu: f64,
    pub va_degree: f64,
    /// Net consumption at the bus (loads minus generation)
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineResult {
    pub p_from_mw: f64,
    pub q_from_mvar: f64,
    pub p_to_mw: f64,
    pub q_to_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_from_ka: f64,
    pub i_to_ka: f64,
    pub i_ka: f64,
    pub loading_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafoResult {
    pub p_hv_mw: f64,
    pub q_hv_mvar: f64,
    pub p_lv_mw: f64,
    pub q_lv_mvar: f64,
    pub pl_mw: f64,
    pub ql_mvar: f64,
    pub i_hv_ka: f64,
    pub i_lv_ka: f64,
    pub loading_percent: f64,
}

/// Injection of a source element; positive means power fed into the bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectionResult {
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowResults {
    pub converged: bool,
    pub algorithm: String,
    pub iterations: usize,
    pub max_mismatch_mva: f64,
    /// Structure revision of the network the results were computed on
    pub revision: u64,
    pub bus: BTreeMap<usize, BusResult>,
    pub line: BTreeMap<usize, LineResult>,
    pub trafo: BTreeMap<usize, TrafoResult>,
    pub ext_grid: BTreeMap<usize, InjectionResult>,
    pub gen: BTreeMap<usize, InjectionResult>,
}

impl PowerFlowResults {
    /// Lowest and highest solved bus voltage.
    pub fn voltage_range(&self) -> Option<(f64, f64)> {
        self.bus.values().fold(None, |acc, r| match acc {
            None => Some((r.vm_pu, r.vm_pu)),
            Some((lo, hi)) => Some((lo.min(r.vm_pu), hi.max(r.vm_pu))),
        })
    }

    /// Highest line or transformer loading.
    pub fn max_loading_percent(&self) -> Option<f64> {
        self.line
            .values()
            .map(|l| l.loading_percent)
            .chain(self.trafo.values().map(|t| t.loading_percent))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }

    /// Active losses over all lines and transformers.
    pub fn total_losses_mw(&self) -> f64 {
        self.line.values().map(|l| l.pl_mw).sum::<f64>()
            + self.trafo.values().map(|t| t.pl_mw).sum::<f64>()
    }
}

/// Whether attached results describe the current structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Absent,
    Current,
    Stale,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Absent => "absent",
            ResultStatus::Current => "current",
            ResultStatus::Stale => "stale",
        }
    }
}

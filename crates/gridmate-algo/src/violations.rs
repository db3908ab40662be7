//! Voltage and loading limit checks on solved results.

use gridmate_core::{GridError, GridResult, PowerFlowResults};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationLimits {
    pub vm_min_pu: f64,
    pub vm_max_pu: f64,
    pub max_loading_percent: f64,
}

impl Default for ViolationLimits {
    fn default() -> Self {
        Self {
            vm_min_pu: 0.95,
            vm_max_pu: 1.05,
            max_loading_percent: 100.0,
        }
    }
}

impl ViolationLimits {
    pub fn validate(&self) -> GridResult<()> {
        let finite = [self.vm_min_pu, self.vm_max_pu, self.max_loading_percent]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.vm_min_pu <= 0.0 || self.vm_min_pu >= self.vm_max_pu {
            return Err(GridError::validation(format!(
                "voltage band [{}, {}] p.u. is not a valid range",
                self.vm_min_pu, self.vm_max_pu
            )));
        }
        if self.max_loading_percent <= 0.0 {
            return Err(GridError::validation(format!(
                "max_loading_percent must be positive, got {}",
                self.max_loading_percent
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageViolationKind {
    Undervoltage,
    Overvoltage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageViolation {
    pub bus: usize,
    pub vm_pu: f64,
    pub kind: VoltageViolationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingViolation {
    /// `line` or `trafo`
    pub element: String,
    pub index: usize,
    pub loading_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationSet {
    pub voltage: Vec<VoltageViolation>,
    pub loading: Vec<LoadingViolation>,
}

impl ViolationSet {
    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty() && self.loading.is_empty()
    }

    pub fn len(&self) -> usize {
        self.voltage.len() + self.loading.len()
    }
}

/// Collects every bus outside the voltage band and every branch above the
/// loading limit, in index order.
pub fn check(results: &PowerFlowResults, limits: &ViolationLimits) -> ViolationSet {
    let mut set = ViolationSet::default();
    for (&bus, r) in &results.bus {
        let kind = if r.vm_pu < limits.vm_min_pu {
            VoltageViolationKind::Undervoltage
        } else if r.vm_pu > limits.vm_max_pu {
            VoltageViolationKind::Overvoltage
        } else {
            continue;
        };
        set.voltage.push(VoltageViolation {
            bus,
            vm_pu: r.vm_pu,
            kind,
        });
    }

    let lines = results.line.iter().map(|(&i, r)| ("line", i, r.loading_percent));
    let trafos = results.trafo.iter().map(|(&i, r)| ("trafo", i, r.loading_percent));
    for (element, index, loading_percent) in lines.chain(trafos) {
        if loading_percent > limits.max_loading_percent {
            set.loading.push(LoadingViolation {
                element: element.to_string(),
                index,
                loading_percent,
            });
        }
    }
    set
}

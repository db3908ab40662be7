//! The session: one current network plus the server configuration.
//!
//! The server loop owns the session and calls one operation at a time.
//! State is [`SessionState::NoNetwork`] until a network is created or
//! loaded; every network-dependent operation checks that first.

use std::path::Path;

use gridmate_algo::{
    run_contingency_analysis, ContingencyOptions, ContingencyReport, ContingencyType,
    PowerFlowOptions, ViolationLimits,
};
use gridmate_core::std_types::{line_std_types, trafo_std_types};
use gridmate_core::{
    BusType, DiagnosticIssue, ElementCounts, ElementKind, PowerFlowResults, PowerNet,
    ResultStatus, SwitchTarget, Topology,
};
use gridmate_io::{load_network, save_network, CaseName};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone)]
pub enum SessionState {
    NoNetwork,
    NetworkLoaded(Box<PowerNet>),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::NoNetwork => "NO_NETWORK",
            SessionState::NetworkLoaded(_) => "NETWORK_LOADED",
        }
    }
}

/// Counts and attributes reported after create/load/save/remove.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkSummary {
    pub name: String,
    pub f_hz: f64,
    pub sn_mva: f64,
    #[serde(flatten)]
    pub counts: ElementCounts,
    pub result_status: ResultStatus,
}

impl NetworkSummary {
    pub fn of(net: &PowerNet) -> Self {
        Self {
            name: net.name.clone(),
            f_hz: net.f_hz,
            sn_mva: net.sn_mva,
            counts: net.counts(),
            result_status: net.result_status(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub summary: NetworkSummary,
    /// Rows skipped or adjusted while reading, plus validation findings
    pub issues: Vec<DiagnosticIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultOverview {
    pub converged: bool,
    pub algorithm: String,
    pub min_vm_pu: Option<f64>,
    pub max_vm_pu: Option<f64>,
    pub max_loading_percent: Option<f64>,
    pub total_losses_mw: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub summary: NetworkSummary,
    pub total_load_mw: f64,
    pub total_generation_mw: f64,
    pub islands: usize,
    pub radial: bool,
    pub results: Option<ResultOverview>,
    pub issues: Vec<DiagnosticIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StdTypeEntry {
    pub name: String,
    pub parameters: Value,
}

/// Optional per-call overrides of the configured power flow settings.
#[derive(Debug, Clone, Default)]
pub struct PowerFlowOverrides {
    pub algorithm: Option<gridmate_algo::Algorithm>,
    pub calculate_voltage_angles: Option<bool>,
    pub max_iteration: Option<usize>,
    pub tolerance_mva: Option<f64>,
}

/// Optional per-call overrides of the configured violation limits.
#[derive(Debug, Clone, Default)]
pub struct LimitOverrides {
    pub vm_min_pu: Option<f64>,
    pub vm_max_pu: Option<f64>,
    pub max_loading_percent: Option<f64>,
}

pub struct Session {
    state: SessionState,
    config: ServerConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Session {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            state: SessionState::NoNetwork,
            config,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn network(&self) -> ToolResult<&PowerNet> {
        match &self.state {
            SessionState::NetworkLoaded(net) => Ok(net),
            SessionState::NoNetwork => Err(ToolError::NoNetworkLoaded),
        }
    }

    fn network_mut(&mut self) -> ToolResult<&mut PowerNet> {
        match &mut self.state {
            SessionState::NetworkLoaded(net) => Ok(net),
            SessionState::NoNetwork => Err(ToolError::NoNetworkLoaded),
        }
    }

    /// Makes `net` current, discarding any previous network.
    fn replace_network(&mut self, net: PowerNet) -> NetworkSummary {
        if let SessionState::NetworkLoaded(previous) = &self.state {
            warn!(
                previous = %previous.name,
                counts = %previous.counts(),
                "discarding current network"
            );
        }
        let summary = NetworkSummary::of(&net);
        self.state = SessionState::NetworkLoaded(Box::new(net));
        summary
    }

    // ------------------------------------------------------------------
    // Network lifecycle
    // ------------------------------------------------------------------

    pub fn create_empty_network(
        &mut self,
        name: Option<String>,
        f_hz: Option<f64>,
        sn_mva: Option<f64>,
    ) -> ToolResult<NetworkSummary> {
        let f_hz = f_hz.unwrap_or(self.config.network.f_hz);
        let sn_mva = sn_mva.unwrap_or(self.config.network.sn_mva);
        for (what, value) in [("f_hz", f_hz), ("sn_mva", sn_mva)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ToolError::invalid_argument(format!(
                    "{what} must be a positive number, got {value}"
                )));
            }
        }
        let net = PowerNet::new(name.unwrap_or_default(), f_hz, sn_mva);
        info!(f_hz, sn_mva, "created empty network");
        Ok(self.replace_network(net))
    }

    pub fn create_example_network(&mut self, case: CaseName) -> ToolResult<NetworkSummary> {
        let net = case.build()?;
        info!(case = %case, "created example network");
        Ok(self.replace_network(net))
    }

    /// Loads a `.json` or `.p` file. A failed load leaves the session as it
    /// was.
    pub fn load_network(&mut self, path: &Path) -> ToolResult<LoadOutcome> {
        let imported = load_network(path)?;
        let issues = imported.diagnostics.issues.clone();
        if !imported.diagnostics.is_empty() {
            warn!(
                path = %path.display(),
                summary = %imported.diagnostics.summary(),
                "network loaded with issues"
            );
        }
        info!(path = %path.display(), counts = %imported.network.counts(), "loaded network");
        let summary = self.replace_network(imported.network);
        Ok(LoadOutcome { summary, issues })
    }

    pub fn save_network(&self, path: &Path) -> ToolResult<NetworkSummary> {
        let net = self.network()?;
        save_network(net, path)?;
        info!(path = %path.display(), "saved network");
        Ok(NetworkSummary::of(net))
    }

    // ------------------------------------------------------------------
    // Element editing
    // ------------------------------------------------------------------

    pub fn add_bus(
        &mut self,
        name: String,
        vn_kv: f64,
        bus_type: BusType,
        zone: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_bus(name, vn_kv, bus_type, zone)?;
        debug!(index = idx, vn_kv, "added bus");
        Ok(idx)
    }

    pub fn add_line(
        &mut self,
        from_bus: usize,
        to_bus: usize,
        length_km: f64,
        std_type: &str,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_line(from_bus, to_bus, length_km, std_type, name)?;
        debug!(index = idx, from_bus, to_bus, std_type, "added line");
        Ok(idx)
    }

    pub fn add_transformer(
        &mut self,
        hv_bus: usize,
        lv_bus: usize,
        std_type: &str,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_transformer(hv_bus, lv_bus, std_type, name)?;
        debug!(index = idx, hv_bus, lv_bus, std_type, "added transformer");
        Ok(idx)
    }

    pub fn add_load(
        &mut self,
        bus: usize,
        p_mw: f64,
        q_mvar: f64,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_load(bus, p_mw, q_mvar, name)?;
        debug!(index = idx, bus, p_mw, "added load");
        Ok(idx)
    }

    pub fn add_generator(
        &mut self,
        bus: usize,
        p_mw: f64,
        vm_pu: f64,
        q_limits: (Option<f64>, Option<f64>),
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_gen(bus, p_mw, vm_pu, q_limits.0, q_limits.1, name)?;
        debug!(index = idx, bus, p_mw, vm_pu, "added generator");
        Ok(idx)
    }

    pub fn add_ext_grid(
        &mut self,
        bus: usize,
        vm_pu: f64,
        va_degree: f64,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_ext_grid(bus, vm_pu, va_degree, name)?;
        debug!(index = idx, bus, vm_pu, "added external grid");
        Ok(idx)
    }

    pub fn add_shunt(
        &mut self,
        bus: usize,
        p_mw: f64,
        q_mvar: f64,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_shunt(bus, p_mw, q_mvar, name)?;
        debug!(index = idx, bus, q_mvar, "added shunt");
        Ok(idx)
    }

    pub fn add_switch(
        &mut self,
        bus: usize,
        target: SwitchTarget,
        closed: bool,
        name: Option<String>,
    ) -> ToolResult<usize> {
        let net = self.network_mut()?;
        let idx = net.create_switch(bus, target, closed, name)?;
        debug!(index = idx, bus, closed, "added switch");
        Ok(idx)
    }

    pub fn remove_element(&mut self, kind: ElementKind, index: usize) -> ToolResult<NetworkSummary> {
        let net = self.network_mut()?;
        net.remove_element(kind, index)?;
        info!(element = %kind, index, "removed element");
        Ok(NetworkSummary::of(net))
    }

    /// Returns the previous flag.
    pub fn set_in_service(
        &mut self,
        kind: ElementKind,
        index: usize,
        in_service: bool,
    ) -> ToolResult<bool> {
        let net = self.network_mut()?;
        let previous = net.set_in_service(kind, index, in_service)?;
        debug!(element = %kind, index, in_service, previous, "service flag updated");
        Ok(previous)
    }

    // ------------------------------------------------------------------
    // Analysis
    // ------------------------------------------------------------------

    fn power_flow_options(&self, overrides: &PowerFlowOverrides) -> PowerFlowOptions {
        let base = &self.config.power_flow;
        PowerFlowOptions {
            algorithm: overrides.algorithm.unwrap_or(base.algorithm),
            calculate_voltage_angles: overrides
                .calculate_voltage_angles
                .unwrap_or(base.calculate_voltage_angles),
            max_iteration: overrides.max_iteration.unwrap_or(base.max_iteration),
            tolerance_mva: overrides.tolerance_mva.unwrap_or(base.tolerance_mva),
        }
    }

    pub fn run_power_flow(&mut self, overrides: &PowerFlowOverrides) -> ToolResult<PowerFlowResults> {
        let options = self.power_flow_options(overrides);
        let net = self.network_mut()?;
        Ok(gridmate_algo::run_power_flow(net, &options)?)
    }

    pub fn run_contingency_analysis(
        &self,
        contingency_type: ContingencyType,
        element_kinds: Option<Vec<ElementKind>>,
        limits: &LimitOverrides,
    ) -> ToolResult<ContingencyReport> {
        let net = self.network()?;
        let configured = self.config.contingency.limits();
        let options = ContingencyOptions {
            contingency_type,
            element_kinds: element_kinds
                .unwrap_or_else(|| gridmate_algo::contingency::OUTAGE_KINDS.to_vec()),
            power_flow: self.config.power_flow.clone(),
            limits: ViolationLimits {
                vm_min_pu: limits.vm_min_pu.unwrap_or(configured.vm_min_pu),
                vm_max_pu: limits.vm_max_pu.unwrap_or(configured.vm_max_pu),
                max_loading_percent: limits
                    .max_loading_percent
                    .unwrap_or(configured.max_loading_percent),
            },
            parallel: self.config.contingency.parallel,
        };
        Ok(run_contingency_analysis(net, &options)?)
    }

    pub fn get_network_info(&self) -> ToolResult<NetworkInfo> {
        let net = self.network()?;
        let topo = Topology::build(net);
        let results = net.results().map(|r| {
            let range = r.voltage_range();
            ResultOverview {
                converged: r.converged,
                algorithm: r.algorithm.clone(),
                min_vm_pu: range.map(|(lo, _)| lo),
                max_vm_pu: range.map(|(_, hi)| hi),
                max_loading_percent: r.max_loading_percent(),
                total_losses_mw: r.total_losses_mw(),
            }
        });
        Ok(NetworkInfo {
            summary: NetworkSummary::of(net),
            total_load_mw: net.total_load_mw(),
            total_generation_mw: net.total_generation_mw(),
            islands: topo.island_count(),
            radial: topo.is_radial(),
            results,
            issues: net.validate().issues,
        })
    }

    pub fn list_std_types(&self, kind: ElementKind) -> ToolResult<Vec<StdTypeEntry>> {
        let entries = match kind {
            ElementKind::Line => line_std_types()
                .map(|(name, ty)| -> ToolResult<StdTypeEntry> {
                    Ok(entry(name, serde_json::to_value(ty)?))
                })
                .collect::<ToolResult<Vec<_>>>()?,
            ElementKind::Trafo => trafo_std_types()
                .map(|(name, ty)| -> ToolResult<StdTypeEntry> {
                    Ok(entry(name, serde_json::to_value(ty)?))
                })
                .collect::<ToolResult<Vec<_>>>()?,
            other => {
                return Err(ToolError::invalid_argument(format!(
                    "standard types exist for line and trafo, not '{other}'"
                )))
            }
        };
        Ok(entries)
    }
}

fn entry(name: &str, parameters: Value) -> StdTypeEntry {
    StdTypeEntry {
        name: name.to_string(),
        parameters,
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::elements::*;
use crate::results::{PowerFlowResults, ResultStatus};
use crate::std_types::{line_std_type, trafo_std_type};
use crate::table::Table;
use crate::topology::Topology;
use crate::{GridError, GridResult};

pub const DEFAULT_F_HZ: f64 = 50.0;
pub const DEFAULT_SN_MVA: f64 = 1.0;

/// A power-system model: one table per element class plus network-level
/// attributes and the results of the last solve.
///
/// Tables are public for reading and for codecs that rebuild a network row
/// by row. The `create_*`, [`PowerNet::remove_element`] and
/// [`PowerNet::set_in_service`] methods validate references and bump the
/// structure revision; code that edits tables directly must call
/// [`PowerNet::mark_modified`] itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerNet {
    pub name: String,
    pub f_hz: f64,
    pub sn_mva: f64,
    pub bus: Table<Bus>,
    pub line: Table<Line>,
    pub trafo: Table<Transformer>,
    pub gen: Table<Gen>,
    pub ext_grid: Table<ExtGrid>,
    pub load: Table<Load>,
    pub shunt: Table<Shunt>,
    pub switch: Table<Switch>,
    revision: u64,
    results: Option<PowerFlowResults>,
}

impl Default for PowerNet {
    fn default() -> Self {
        Self::new("", DEFAULT_F_HZ, DEFAULT_SN_MVA)
    }
}

/// Element counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementCounts {
    pub buses: usize,
    pub lines: usize,
    pub trafos: usize,
    pub generators: usize,
    pub ext_grids: usize,
    pub loads: usize,
    pub shunts: usize,
    pub switches: usize,
}

impl fmt::Display for ElementCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} trafos, {} generators, {} ext grids, {} loads, {} shunts, {} switches",
            self.buses,
            self.lines,
            self.trafos,
            self.generators,
            self.ext_grids,
            self.loads,
            self.shunts,
            self.switches
        )
    }
}

fn ensure_positive(what: &str, value: f64) -> GridResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GridError::validation(format!(
            "{what} must be a positive number, got {value}"
        )))
    }
}

fn ensure_finite(what: &str, value: f64) -> GridResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(GridError::validation(format!(
            "{what} must be a finite number, got {value}"
        )))
    }
}

impl PowerNet {
    pub fn new(name: impl Into<String>, f_hz: f64, sn_mva: f64) -> Self {
        Self {
            name: name.into(),
            f_hz,
            sn_mva,
            bus: Table::new(),
            line: Table::new(),
            trafo: Table::new(),
            gen: Table::new(),
            ext_grid: Table::new(),
            load: Table::new(),
            shunt: Table::new(),
            switch: Table::new(),
            revision: 0,
            results: None,
        }
    }

    // ------------------------------------------------------------------
    // Element creation
    // ------------------------------------------------------------------

    pub fn create_bus(
        &mut self,
        name: impl Into<String>,
        vn_kv: f64,
        bus_type: BusType,
        zone: Option<String>,
    ) -> GridResult<usize> {
        ensure_positive("vn_kv", vn_kv)?;
        let idx = self.bus.insert(Bus {
            name: name.into(),
            vn_kv,
            bus_type,
            zone,
            in_service: true,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    /// Creates a line whose electrical data comes from the standard-type
    /// catalogue.
    pub fn create_line(
        &mut self,
        from_bus: usize,
        to_bus: usize,
        length_km: f64,
        std_type: &str,
        name: Option<String>,
    ) -> GridResult<usize> {
        let ty = line_std_type(std_type)?;
        self.create_line_from_parameters(Line {
            name,
            std_type: Some(std_type.to_string()),
            from_bus,
            to_bus,
            length_km,
            r_ohm_per_km: ty.r_ohm_per_km,
            x_ohm_per_km: ty.x_ohm_per_km,
            c_nf_per_km: ty.c_nf_per_km,
            max_i_ka: ty.max_i_ka,
            df: 1.0,
            parallel: 1,
            in_service: true,
        })
    }

    pub fn create_line_from_parameters(&mut self, line: Line) -> GridResult<usize> {
        self.require(ElementKind::Bus, line.from_bus)?;
        self.require(ElementKind::Bus, line.to_bus)?;
        if line.from_bus == line.to_bus {
            return Err(GridError::validation(format!(
                "line cannot connect bus {} to itself",
                line.from_bus
            )));
        }
        ensure_positive("length_km", line.length_km)?;
        ensure_positive("max_i_ka", line.max_i_ka)?;
        if line.parallel == 0 {
            return Err(GridError::validation("parallel must be at least 1"));
        }
        let idx = self.line.insert(line)?;
        self.mark_modified();
        Ok(idx)
    }

    /// Creates a transformer from the standard-type catalogue.
    pub fn create_transformer(
        &mut self,
        hv_bus: usize,
        lv_bus: usize,
        std_type: &str,
        name: Option<String>,
    ) -> GridResult<usize> {
        let ty = trafo_std_type(std_type)?;
        self.create_transformer_from_parameters(Transformer {
            name,
            std_type: Some(std_type.to_string()),
            hv_bus,
            lv_bus,
            sn_mva: ty.sn_mva,
            vn_hv_kv: ty.vn_hv_kv,
            vn_lv_kv: ty.vn_lv_kv,
            vk_percent: ty.vk_percent,
            vkr_percent: ty.vkr_percent,
            shift_degree: ty.shift_degree,
            tap_pos: Some(ty.tap_neutral),
            tap_neutral: Some(ty.tap_neutral),
            tap_step_percent: Some(ty.tap_step_percent),
            parallel: 1,
            in_service: true,
        })
    }

    pub fn create_transformer_from_parameters(&mut self, trafo: Transformer) -> GridResult<usize> {
        self.require(ElementKind::Bus, trafo.hv_bus)?;
        self.require(ElementKind::Bus, trafo.lv_bus)?;
        if trafo.hv_bus == trafo.lv_bus {
            return Err(GridError::validation(format!(
                "transformer cannot connect bus {} to itself",
                trafo.hv_bus
            )));
        }
        ensure_positive("sn_mva", trafo.sn_mva)?;
        ensure_positive("vn_hv_kv", trafo.vn_hv_kv)?;
        ensure_positive("vn_lv_kv", trafo.vn_lv_kv)?;
        ensure_positive("vk_percent", trafo.vk_percent)?;
        if trafo.vkr_percent < 0.0 || trafo.vkr_percent > trafo.vk_percent {
            return Err(GridError::validation(format!(
                "vkr_percent must lie in [0, vk_percent], got {}",
                trafo.vkr_percent
            )));
        }
        let idx = self.trafo.insert(trafo)?;
        self.mark_modified();
        Ok(idx)
    }

    pub fn create_gen(
        &mut self,
        bus: usize,
        p_mw: f64,
        vm_pu: f64,
        min_q_mvar: Option<f64>,
        max_q_mvar: Option<f64>,
        name: Option<String>,
    ) -> GridResult<usize> {
        self.require(ElementKind::Bus, bus)?;
        ensure_finite("p_mw", p_mw)?;
        ensure_positive("vm_pu", vm_pu)?;
        if let (Some(lo), Some(hi)) = (min_q_mvar, max_q_mvar) {
            if lo > hi {
                return Err(GridError::validation(format!(
                    "min_q_mvar {lo} exceeds max_q_mvar {hi}"
                )));
            }
        }
        let idx = self.gen.insert(Gen {
            name,
            bus,
            p_mw,
            vm_pu,
            min_q_mvar,
            max_q_mvar,
            in_service: true,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    pub fn create_ext_grid(
        &mut self,
        bus: usize,
        vm_pu: f64,
        va_degree: f64,
        name: Option<String>,
    ) -> GridResult<usize> {
        self.require(ElementKind::Bus, bus)?;
        ensure_positive("vm_pu", vm_pu)?;
        ensure_finite("va_degree", va_degree)?;
        let idx = self.ext_grid.insert(ExtGrid {
            name,
            bus,
            vm_pu,
            va_degree,
            in_service: true,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    pub fn create_load(
        &mut self,
        bus: usize,
        p_mw: f64,
        q_mvar: f64,
        name: Option<String>,
    ) -> GridResult<usize> {
        self.require(ElementKind::Bus, bus)?;
        ensure_finite("p_mw", p_mw)?;
        ensure_finite("q_mvar", q_mvar)?;
        let idx = self.load.insert(Load {
            name,
            bus,
            p_mw,
            q_mvar,
            scaling: 1.0,
            in_service: true,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    pub fn create_shunt(
        &mut self,
        bus: usize,
        p_mw: f64,
        q_mvar: f64,
        name: Option<String>,
    ) -> GridResult<usize> {
        self.require(ElementKind::Bus, bus)?;
        ensure_finite("p_mw", p_mw)?;
        ensure_finite("q_mvar", q_mvar)?;
        let idx = self.shunt.insert(Shunt {
            name,
            bus,
            p_mw,
            q_mvar,
            in_service: true,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    pub fn create_switch(
        &mut self,
        bus: usize,
        target: SwitchTarget,
        closed: bool,
        name: Option<String>,
    ) -> GridResult<usize> {
        self.require(ElementKind::Bus, bus)?;
        match target {
            SwitchTarget::Bus(other) => {
                self.require(ElementKind::Bus, other)?;
                if other == bus {
                    return Err(GridError::validation(format!(
                        "bus switch cannot connect bus {bus} to itself"
                    )));
                }
            }
            SwitchTarget::Line(idx) => {
                let line = self.line.get(idx).ok_or(GridError::InvalidReference {
                    kind: ElementKind::Line,
                    index: idx,
                })?;
                if !line.connects(bus) {
                    return Err(GridError::validation(format!(
                        "line {idx} is not connected to bus {bus}"
                    )));
                }
            }
            SwitchTarget::Trafo(idx) => {
                let trafo = self.trafo.get(idx).ok_or(GridError::InvalidReference {
                    kind: ElementKind::Trafo,
                    index: idx,
                })?;
                if !trafo.connects(bus) {
                    return Err(GridError::validation(format!(
                        "trafo {idx} is not connected to bus {bus}"
                    )));
                }
            }
        }
        let idx = self.switch.insert(Switch {
            name,
            bus,
            target,
            closed,
        })?;
        self.mark_modified();
        Ok(idx)
    }

    // ------------------------------------------------------------------
    // Generic element access
    // ------------------------------------------------------------------

    pub fn contains(&self, kind: ElementKind, index: usize) -> bool {
        match kind {
            ElementKind::Bus => self.bus.contains(index),
            ElementKind::Line => self.line.contains(index),
            ElementKind::Trafo => self.trafo.contains(index),
            ElementKind::Gen => self.gen.contains(index),
            ElementKind::ExtGrid => self.ext_grid.contains(index),
            ElementKind::Load => self.load.contains(index),
            ElementKind::Shunt => self.shunt.contains(index),
            ElementKind::Switch => self.switch.contains(index),
        }
    }

    pub fn require(&self, kind: ElementKind, index: usize) -> GridResult<()> {
        if self.contains(kind, index) {
            Ok(())
        } else {
            Err(GridError::InvalidReference { kind, index })
        }
    }

    /// Elements that point at `bus`, as labels like `load 2`.
    pub fn bus_references(&self, bus: usize) -> Vec<String> {
        let mut refs = Vec::new();
        let mut push = |kind: ElementKind, idx: usize| refs.push(format!("{kind} {idx}"));
        for (idx, _) in self.line.iter().filter(|(_, l)| l.connects(bus)) {
            push(ElementKind::Line, idx);
        }
        for (idx, _) in self.trafo.iter().filter(|(_, t)| t.connects(bus)) {
            push(ElementKind::Trafo, idx);
        }
        for (idx, _) in self.gen.iter().filter(|(_, g)| g.bus == bus) {
            push(ElementKind::Gen, idx);
        }
        for (idx, _) in self.ext_grid.iter().filter(|(_, e)| e.bus == bus) {
            push(ElementKind::ExtGrid, idx);
        }
        for (idx, _) in self.load.iter().filter(|(_, l)| l.bus == bus) {
            push(ElementKind::Load, idx);
        }
        for (idx, _) in self.shunt.iter().filter(|(_, s)| s.bus == bus) {
            push(ElementKind::Shunt, idx);
        }
        for (idx, _) in self
            .switch
            .iter()
            .filter(|(_, s)| s.bus == bus || s.target == SwitchTarget::Bus(bus))
        {
            push(ElementKind::Switch, idx);
        }
        refs
    }

    fn switch_references(&self, target: SwitchTarget) -> Vec<String> {
        self.switch
            .iter()
            .filter(|(_, s)| s.target == target)
            .map(|(idx, _)| format!("switch {idx}"))
            .collect()
    }

    /// Removes an element. Buses, lines and transformers that other
    /// elements still point at are refused.
    pub fn remove_element(&mut self, kind: ElementKind, index: usize) -> GridResult<()> {
        self.require(kind, index)?;
        let referenced_by = match kind {
            ElementKind::Bus => self.bus_references(index),
            ElementKind::Line => self.switch_references(SwitchTarget::Line(index)),
            ElementKind::Trafo => self.switch_references(SwitchTarget::Trafo(index)),
            _ => Vec::new(),
        };
        if !referenced_by.is_empty() {
            return Err(GridError::StillReferenced {
                kind,
                index,
                referenced_by: referenced_by.join(", "),
            });
        }
        match kind {
            ElementKind::Bus => self.bus.remove(index).map(drop),
            ElementKind::Line => self.line.remove(index).map(drop),
            ElementKind::Trafo => self.trafo.remove(index).map(drop),
            ElementKind::Gen => self.gen.remove(index).map(drop),
            ElementKind::ExtGrid => self.ext_grid.remove(index).map(drop),
            ElementKind::Load => self.load.remove(index).map(drop),
            ElementKind::Shunt => self.shunt.remove(index).map(drop),
            ElementKind::Switch => self.switch.remove(index).map(drop),
        };
        self.mark_modified();
        Ok(())
    }

    /// Service flag of an element. For switches this is the closed state.
    pub fn in_service(&self, kind: ElementKind, index: usize) -> GridResult<bool> {
        let flag = match kind {
            ElementKind::Bus => self.bus.get(index).map(|e| e.in_service),
            ElementKind::Line => self.line.get(index).map(|e| e.in_service),
            ElementKind::Trafo => self.trafo.get(index).map(|e| e.in_service),
            ElementKind::Gen => self.gen.get(index).map(|e| e.in_service),
            ElementKind::ExtGrid => self.ext_grid.get(index).map(|e| e.in_service),
            ElementKind::Load => self.load.get(index).map(|e| e.in_service),
            ElementKind::Shunt => self.shunt.get(index).map(|e| e.in_service),
            ElementKind::Switch => self.switch.get(index).map(|e| e.closed),
        };
        flag.ok_or(GridError::InvalidReference { kind, index })
    }

    /// Sets the service flag (closes/opens switches). Returns the previous
    /// value.
    pub fn set_in_service(
        &mut self,
        kind: ElementKind,
        index: usize,
        in_service: bool,
    ) -> GridResult<bool> {
        let slot = match kind {
            ElementKind::Bus => self.bus.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Line => self.line.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Trafo => self.trafo.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Gen => self.gen.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::ExtGrid => self.ext_grid.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Load => self.load.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Shunt => self.shunt.get_mut(index).map(|e| &mut e.in_service),
            ElementKind::Switch => self.switch.get_mut(index).map(|e| &mut e.closed),
        };
        let slot = slot.ok_or(GridError::InvalidReference { kind, index })?;
        let previous = std::mem::replace(slot, in_service);
        self.mark_modified();
        Ok(previous)
    }

    // ------------------------------------------------------------------
    // Summary, revision and results
    // ------------------------------------------------------------------

    pub fn counts(&self) -> ElementCounts {
        ElementCounts {
            buses: self.bus.len(),
            lines: self.line.len(),
            trafos: self.trafo.len(),
            generators: self.gen.len(),
            ext_grids: self.ext_grid.len(),
            loads: self.load.len(),
            shunts: self.shunt.len(),
            switches: self.switch.len(),
        }
    }

    pub fn total_load_mw(&self) -> f64 {
        self.load
            .values()
            .filter(|l| l.in_service)
            .map(Load::scaled_p_mw)
            .sum()
    }

    pub fn total_generation_mw(&self) -> f64 {
        self.gen
            .values()
            .filter(|g| g.in_service)
            .map(|g| g.p_mw)
            .sum()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Records a structural edit; attached results become stale.
    pub fn mark_modified(&mut self) {
        self.revision += 1;
    }

    pub fn results(&self) -> Option<&PowerFlowResults> {
        self.results.as_ref()
    }

    pub fn result_status(&self) -> ResultStatus {
        match &self.results {
            None => ResultStatus::Absent,
            Some(r) if r.revision == self.revision => ResultStatus::Current,
            Some(_) => ResultStatus::Stale,
        }
    }

    pub fn attach_results(&mut self, results: PowerFlowResults) {
        self.results = Some(results);
    }

    pub fn clear_results(&mut self) {
        self.results = None;
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Collects reference, physical and topology issues without failing.
    pub fn validate(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();

        if self.bus.is_empty() {
            diag.add_warning("topology", "network has no buses");
            return diag;
        }

        for (idx, bus) in self.bus.iter() {
            if !(bus.vn_kv.is_finite() && bus.vn_kv > 0.0) {
                diag.add_error_with_entity(
                    "physical",
                    &format!("invalid nominal voltage {} kV", bus.vn_kv),
                    &format!("bus {idx}"),
                );
            }
        }

        let check_bus = |diag: &mut Diagnostics, entity: String, bus: usize| {
            if !self.bus.contains(bus) {
                diag.add_error_with_entity("reference", &format!("unknown bus {bus}"), &entity);
            }
        };
        for (idx, line) in self.line.iter() {
            check_bus(&mut diag, format!("line {idx}"), line.from_bus);
            check_bus(&mut diag, format!("line {idx}"), line.to_bus);
            if !(line.length_km > 0.0) {
                diag.add_error_with_entity(
                    "physical",
                    &format!("non-positive length {} km", line.length_km),
                    &format!("line {idx}"),
                );
            }
        }
        for (idx, trafo) in self.trafo.iter() {
            let entity = format!("trafo {idx}");
            check_bus(&mut diag, entity.clone(), trafo.hv_bus);
            check_bus(&mut diag, entity.clone(), trafo.lv_bus);
            for (bus, rated) in [(trafo.hv_bus, trafo.vn_hv_kv), (trafo.lv_bus, trafo.vn_lv_kv)] {
                if let Some(b) = self.bus.get(bus) {
                    if ((rated - b.vn_kv) / b.vn_kv).abs() > 0.1 {
                        diag.add_warning_with_entity(
                            "physical",
                            &format!(
                                "rated voltage {rated} kV differs from bus {bus} voltage {} kV",
                                b.vn_kv
                            ),
                            &entity,
                        );
                    }
                }
            }
        }
        for (idx, g) in self.gen.iter() {
            check_bus(&mut diag, format!("gen {idx}"), g.bus);
        }
        for (idx, e) in self.ext_grid.iter() {
            check_bus(&mut diag, format!("ext_grid {idx}"), e.bus);
        }
        for (idx, l) in self.load.iter() {
            check_bus(&mut diag, format!("load {idx}"), l.bus);
        }
        for (idx, s) in self.shunt.iter() {
            check_bus(&mut diag, format!("shunt {idx}"), s.bus);
        }
        for (idx, s) in self.switch.iter() {
            let entity = format!("switch {idx}");
            check_bus(&mut diag, entity.clone(), s.bus);
            let target_known = match s.target {
                SwitchTarget::Bus(b) => self.bus.contains(b),
                SwitchTarget::Line(l) => self.line.contains(l),
                SwitchTarget::Trafo(t) => self.trafo.contains(t),
            };
            if !target_known {
                diag.add_error_with_entity(
                    "reference",
                    &format!("unknown target {}:{}", s.target.code(), s.target.element()),
                    &entity,
                );
            }
        }

        if !self.ext_grid.values().any(|e| e.in_service) {
            diag.add_warning("topology", "no in-service external grid (slack source)");
        }
        if self.load.is_empty() {
            diag.add_warning("physical", "network has no loads");
        }

        if !diag.has_errors() {
            let topo = Topology::build(self);
            let supplied = topo.supplied_buses(self);
            for (idx, bus) in self.bus.iter().filter(|(_, b)| b.in_service) {
                if !supplied.contains(&idx) {
                    diag.add_warning_with_entity(
                        "topology",
                        &format!("bus '{}' is not supplied by any external grid", bus.name),
                        &format!("bus {idx}"),
                    );
                }
            }
        }

        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bus() -> PowerNet {
        let mut net = PowerNet::new("test", 50.0, 1.0);
        let b0 = net.create_bus("hv", 20.0, BusType::Busbar, None).unwrap();
        let b1 = net.create_bus("lv", 20.0, BusType::Node, None).unwrap();
        net.create_ext_grid(b0, 1.0, 0.0, None).unwrap();
        net.create_line(b0, b1, 2.0, "NA2XS2Y 1x95 RM/25 12/20 kV", None)
            .unwrap();
        net.create_load(b1, 1.0, 0.3, None).unwrap();
        net
    }

    #[test]
    fn test_create_line_fills_std_type() {
        let net = two_bus();
        let line = net.line.get(0).unwrap();
        assert_eq!(line.r_ohm_per_km, 0.313);
        assert_eq!(line.std_type.as_deref(), Some("NA2XS2Y 1x95 RM/25 12/20 kV"));
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let mut net = two_bus();
        assert!(matches!(
            net.create_bus("x", 0.0, BusType::Busbar, None),
            Err(GridError::Validation(_))
        ));
        assert!(matches!(
            net.create_line(0, 9, 1.0, "NAYY 4x50 SE", None),
            Err(GridError::InvalidReference { kind: ElementKind::Bus, index: 9 })
        ));
        assert!(matches!(
            net.create_line(0, 1, 1.0, "bogus", None),
            Err(GridError::UnknownStdType { .. })
        ));
        assert_eq!(net.counts().lines, 1);
    }

    #[test]
    fn test_bus_removal_refused_while_referenced() {
        let mut net = two_bus();
        let err = net.remove_element(ElementKind::Bus, 1).unwrap_err();
        match err {
            GridError::StillReferenced { referenced_by, .. } => {
                assert!(referenced_by.contains("line 0"));
                assert!(referenced_by.contains("load 0"));
            }
            other => panic!("unexpected error: {other}"),
        }
        net.remove_element(ElementKind::Load, 0).unwrap();
        net.remove_element(ElementKind::Line, 0).unwrap();
        net.remove_element(ElementKind::Bus, 1).unwrap();
        assert_eq!(net.counts().buses, 1);
    }

    #[test]
    fn test_indices_not_reused_after_removal() {
        let mut net = two_bus();
        let b = net.create_bus("spare", 20.0, BusType::Busbar, None).unwrap();
        net.remove_element(ElementKind::Bus, b).unwrap();
        let next = net.create_bus("spare2", 20.0, BusType::Busbar, None).unwrap();
        assert!(next > b);
    }

    #[test]
    fn test_set_in_service_returns_previous() {
        let mut net = two_bus();
        assert!(net.set_in_service(ElementKind::Line, 0, false).unwrap());
        assert!(!net.in_service(ElementKind::Line, 0).unwrap());
        assert!(net.set_in_service(ElementKind::Line, 7, true).is_err());
    }

    #[test]
    fn test_results_become_stale_after_edit() {
        let mut net = two_bus();
        assert_eq!(net.result_status(), ResultStatus::Absent);
        net.attach_results(PowerFlowResults {
            converged: true,
            algorithm: "nr".into(),
            iterations: 2,
            max_mismatch_mva: 0.0,
            revision: net.revision(),
            bus: Default::default(),
            line: Default::default(),
            trafo: Default::default(),
            ext_grid: Default::default(),
            gen: Default::default(),
        });
        assert_eq!(net.result_status(), ResultStatus::Current);
        net.create_load(0, 0.1, 0.0, None).unwrap();
        assert_eq!(net.result_status(), ResultStatus::Stale);
        assert!(net.results().is_some());
    }

    #[test]
    fn test_validate_flags_unsupplied_bus() {
        let mut net = two_bus();
        net.create_bus("orphan", 20.0, BusType::Busbar, None).unwrap();
        let diag = net.validate();
        assert!(!diag.has_errors());
        assert!(diag
            .issues
            .iter()
            .any(|i| i.entity.as_deref() == Some("bus 2")));
    }

    #[test]
    fn test_switch_must_touch_its_line() {
        let mut net = two_bus();
        let b2 = net.create_bus("far", 20.0, BusType::Busbar, None).unwrap();
        assert!(net
            .create_switch(b2, SwitchTarget::Line(0), false, None)
            .is_err());
        assert!(net
            .create_switch(1, SwitchTarget::Line(0), false, None)
            .is_ok());
        assert!(net.remove_element(ElementKind::Line, 0).is_err());
    }
}

//! Turns a solved voltage vector into per-element result tables.

use std::collections::BTreeMap;

use gridmate_core::{
    BusResult, InjectionResult, LineResult, PowerFlowResults, PowerNet, TrafoResult,
};
use num_complex::Complex64;

use super::model::{BranchModel, BranchRef, NetworkModel, NodeKind};
use super::Solution;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Current magnitude in kA for a per-unit current at a bus of `vn_kv`.
fn current_ka(i_pu: Complex64, sn_mva: f64, vn_kv: f64) -> f64 {
    i_pu.norm() * sn_mva / (SQRT_3 * vn_kv)
}

fn sum_split(total: Complex64, count: usize) -> Complex64 {
    if count == 0 {
        total
    } else {
        total / count as f64
    }
}

pub fn assemble(
    net: &PowerNet,
    model: &NetworkModel,
    solution: &Solution,
    algorithm: &str,
) -> PowerFlowResults {
    let sn = model.sn_mva;
    let v = &solution.v;
    let y_bus = model.y_bus();
    let s_calc: Vec<Complex64> = model
        .injections(&y_bus, v)
        .into_iter()
        .map(|s| s * sn)
        .collect();

    // Load and shunt consumption per bus, in MW / Mvar
    let mut consumption: BTreeMap<usize, Complex64> = BTreeMap::new();
    let mut node_load = vec![Complex64::new(0.0, 0.0); model.len()];
    for load in net.load.values().filter(|l| l.in_service) {
        if let Some(&pos) = model.node_of_bus.get(&load.bus) {
            let s = Complex64::new(load.scaled_p_mw(), load.scaled_q_mvar());
            *consumption.entry(load.bus).or_default() += s;
            node_load[pos] += s;
        }
    }
    for shunt in net.shunt.values().filter(|s| s.in_service) {
        if let Some(&pos) = model.node_of_bus.get(&shunt.bus) {
            let s = Complex64::new(shunt.p_mw, shunt.q_mvar) * v[pos].norm_sqr();
            *consumption.entry(shunt.bus).or_default() += s;
        }
    }

    // Sources: generators keep their P setpoint and share the node's
    // reactive balance, external grids take the remainder at the slack.
    let mut gens_at = vec![Vec::new(); model.len()];
    for (idx, gen) in net.gen.iter().filter(|(_, g)| g.in_service) {
        if let Some(&pos) = model.node_of_bus.get(&gen.bus) {
            gens_at[pos].push((idx, gen.bus, gen.p_mw));
        }
    }
    let mut grids_at = vec![Vec::new(); model.len()];
    for (idx, grid) in net.ext_grid.iter().filter(|(_, e)| e.in_service) {
        if let Some(&pos) = model.node_of_bus.get(&grid.bus) {
            grids_at[pos].push((idx, grid.bus));
        }
    }

    let mut gen = BTreeMap::new();
    let mut ext_grid = BTreeMap::new();
    let mut sources: BTreeMap<usize, Complex64> = BTreeMap::new();
    for pos in 0..model.len() {
        // Power the sources at this node deliver (shunts are inside Y-bus)
        let delivered = s_calc[pos] + node_load[pos];
        let gen_p: f64 = gens_at[pos].iter().map(|g| g.2).sum();
        match model.kind[pos] {
            NodeKind::Slack => {
                for &(idx, bus, p_mw) in &gens_at[pos] {
                    gen.insert(idx, InjectionResult { p_mw, q_mvar: 0.0 });
                    *sources.entry(bus).or_default() += Complex64::new(p_mw, 0.0);
                }
                let share = sum_split(delivered - gen_p, grids_at[pos].len());
                for &(idx, bus) in &grids_at[pos] {
                    ext_grid.insert(
                        idx,
                        InjectionResult {
                            p_mw: share.re,
                            q_mvar: share.im,
                        },
                    );
                    *sources.entry(bus).or_default() += share;
                }
            }
            NodeKind::Pv | NodeKind::Pq => {
                let q_share = match gens_at[pos].len() {
                    0 => 0.0,
                    count => delivered.im / count as f64,
                };
                for &(idx, bus, p_mw) in &gens_at[pos] {
                    gen.insert(idx, InjectionResult { p_mw, q_mvar: q_share });
                    *sources.entry(bus).or_default() += Complex64::new(p_mw, q_share);
                }
            }
        }
    }

    let mut bus = BTreeMap::new();
    for (pos, buses) in model.node_buses.iter().enumerate() {
        for &b in buses {
            let net_consumption = consumption.get(&b).copied().unwrap_or_default()
                - sources.get(&b).copied().unwrap_or_default();
            bus.insert(
                b,
                BusResult {
                    vm_pu: v[pos].norm(),
                    va_degree: v[pos].arg().to_degrees(),
                    p_mw: net_consumption.re,
                    q_mvar: net_consumption.im,
                },
            );
        }
    }

    let mut line = BTreeMap::new();
    let mut trafo = BTreeMap::new();
    for br in model.branches.iter().chain(&model.loop_branches) {
        let flow = BranchFlow::compute(br, v, sn);
        let kv = |b: usize| net.bus.get(b).map(|bus| bus.vn_kv).unwrap_or(1.0);
        let i_from_ka = current_ka(flow.i_from, sn, kv(br.from_bus));
        let i_to_ka = current_ka(flow.i_to, sn, kv(br.to_bus));
        match br.element {
            BranchRef::Line(idx) => {
                let Some(l) = net.line.get(idx) else {
                    continue;
                };
                let i_ka = i_from_ka.max(i_to_ka);
                let rating = l.max_i_ka * l.df * l.parallel.max(1) as f64;
                line.insert(
                    idx,
                    LineResult {
                        p_from_mw: flow.s_from.re,
                        q_from_mvar: flow.s_from.im,
                        p_to_mw: flow.s_to.re,
                        q_to_mvar: flow.s_to.im,
                        pl_mw: flow.s_from.re + flow.s_to.re,
                        ql_mvar: flow.s_from.im + flow.s_to.im,
                        i_from_ka,
                        i_to_ka,
                        i_ka,
                        loading_percent: loading(i_ka, rating),
                    },
                );
            }
            BranchRef::Trafo(idx) => {
                let Some(t) = net.trafo.get(idx) else {
                    continue;
                };
                let s_max = flow.s_from.norm().max(flow.s_to.norm());
                let rating = t.sn_mva * t.parallel.max(1) as f64;
                trafo.insert(
                    idx,
                    TrafoResult {
                        p_hv_mw: flow.s_from.re,
                        q_hv_mvar: flow.s_from.im,
                        p_lv_mw: flow.s_to.re,
                        q_lv_mvar: flow.s_to.im,
                        pl_mw: flow.s_from.re + flow.s_to.re,
                        ql_mvar: flow.s_from.im + flow.s_to.im,
                        i_hv_ka: i_from_ka,
                        i_lv_ka: i_to_ka,
                        loading_percent: loading(s_max, rating),
                    },
                );
            }
        }
    }

    PowerFlowResults {
        converged: solution.converged,
        algorithm: algorithm.to_string(),
        iterations: solution.iterations,
        max_mismatch_mva: solution.max_mismatch_mva,
        revision: net.revision(),
        bus,
        line,
        trafo,
        ext_grid,
        gen,
    }
}

fn loading(value: f64, rating: f64) -> f64 {
    if rating > 0.0 {
        value / rating * 100.0
    } else {
        0.0
    }
}

/// Terminal currents (p.u.) and powers (MVA) of one branch.
struct BranchFlow {
    i_from: Complex64,
    i_to: Complex64,
    s_from: Complex64,
    s_to: Complex64,
}

impl BranchFlow {
    fn compute(br: &BranchModel, v: &[Complex64], sn_mva: f64) -> Self {
        let (v_from, v_to) = (v[br.from], v[br.to]);
        let (i_from, i_to) = br.terminal_currents(v_from, v_to);
        Self {
            i_from,
            i_to,
            s_from: v_from * i_from.conj() * sn_mva,
            s_to: v_to * i_to.conj() * sn_mva,
        }
    }
}

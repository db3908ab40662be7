//! Per-unit network model shared by the power-flow solvers.
//!
//! Every energized fused bus group becomes one node. Quantities are in
//! per-unit on the network's `sn_mva` with each bus's `vn_kv` as voltage
//! base. Branches use the pi model with an ideal transformer of complex
//! ratio `a` on the from side:
//!
//! ```text
//! I_f = (y + ysh/2) / |a|^2 * V_f - y / conj(a) * V_t
//! I_t = -y / a * V_f + (y + ysh/2) * V_t
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};

use gridmate_core::topology::branch_switched_open;
use gridmate_core::units::{BaseValues, Degrees, Kilovolts, MegavoltAmperes};
use gridmate_core::{GridError, GridResult, Line, PowerNet, SwitchTarget, Topology, Transformer};
use num_complex::Complex64;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Slack,
    Pv,
    Pq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRef {
    Line(usize),
    Trafo(usize),
}

#[derive(Debug, Clone)]
pub struct BranchModel {
    pub element: BranchRef,
    /// Node positions of the two terminals
    pub from: usize,
    pub to: usize,
    /// Bus indices of the two terminals
    pub from_bus: usize,
    pub to_bus: usize,
    pub y_series: Complex64,
    pub y_shunt: Complex64,
    pub ratio: Complex64,
}

impl BranchModel {
    /// Two-port coefficients `[A, B, C, D]` with `I_f = A V_f + B V_t` and
    /// `I_t = C V_f + D V_t`.
    pub fn coefficients(&self) -> [Complex64; 4] {
        let y = self.y_series;
        let half = self.y_shunt * 0.5;
        let a = self.ratio;
        [
            (y + half) / a.norm_sqr(),
            -y / a.conj(),
            -y / a,
            y + half,
        ]
    }

    pub fn terminal_currents(&self, v_from: Complex64, v_to: Complex64) -> (Complex64, Complex64) {
        let [a, b, c, d] = self.coefficients();
        (a * v_from + b * v_to, c * v_from + d * v_to)
    }

    pub fn shift_rad(&self) -> f64 {
        self.ratio.arg()
    }
}

#[derive(Debug, Clone)]
pub struct NetworkModel {
    pub sn_mva: f64,
    /// Buses of each node, ascending
    pub node_buses: Vec<Vec<usize>>,
    pub node_of_bus: HashMap<usize, usize>,
    pub kind: Vec<NodeKind>,
    /// Voltage magnitude setpoint (slack and PV nodes), 1.0 elsewhere
    pub v_set: Vec<f64>,
    /// Starting angles in radians, slack angles included
    pub theta_init: Vec<f64>,
    /// Specified injection (generation minus load) in p.u.
    pub s_spec: Vec<Complex64>,
    /// Shunt admittance to ground per node (shunt elements and branches
    /// whose terminals were fused into the same node)
    pub y_shunt: Vec<Complex64>,
    pub branches: Vec<BranchModel>,
    pub loop_branches: Vec<BranchModel>,
}

fn bus_kv(net: &PowerNet, bus: usize) -> GridResult<f64> {
    net.bus
        .get(bus)
        .map(|b| b.vn_kv)
        .ok_or(GridError::InvalidReference {
            kind: gridmate_core::ElementKind::Bus,
            index: bus,
        })
}

fn line_admittances(net: &PowerNet, idx: usize, line: &Line) -> GridResult<(Complex64, Complex64)> {
    let base = BaseValues::new(
        MegavoltAmperes(net.sn_mva),
        Kilovolts(bus_kv(net, line.from_bus)?),
    );
    let z_base = base.z_base_ohm();
    let parallel = line.parallel.max(1) as f64;
    let z_ohm = Complex64::new(line.r_ohm_per_km, line.x_ohm_per_km) * line.length_km / parallel;
    if z_ohm.norm() < 1e-12 {
        return Err(GridError::solver(format!("line {idx} has zero series impedance")));
    }
    let b_siemens =
        2.0 * std::f64::consts::PI * net.f_hz * line.c_nf_per_km * 1e-9 * line.length_km * parallel;
    Ok((
        Complex64::new(z_base, 0.0) / z_ohm,
        Complex64::new(0.0, b_siemens * z_base),
    ))
}

fn trafo_parameters(
    net: &PowerNet,
    idx: usize,
    trafo: &Transformer,
    calculate_voltage_angles: bool,
) -> GridResult<(Complex64, Complex64)> {
    let vn_hv_bus = bus_kv(net, trafo.hv_bus)?;
    let vn_lv_bus = bus_kv(net, trafo.lv_bus)?;
    let parallel = trafo.parallel.max(1) as f64;
    let scale = net.sn_mva / trafo.sn_mva * (trafo.vn_lv_kv / vn_lv_bus).powi(2) / parallel;
    let z = trafo.vk_percent / 100.0 * scale;
    let r = trafo.vkr_percent / 100.0 * scale;
    let x = (z * z - r * r).max(0.0).sqrt();
    if z < 1e-12 {
        return Err(GridError::solver(format!("trafo {idx} has zero short-circuit impedance")));
    }
    let magnitude = (trafo.effective_vn_hv_kv() / vn_hv_bus) / (trafo.vn_lv_kv / vn_lv_bus);
    let shift = if calculate_voltage_angles {
        Degrees(trafo.shift_degree).to_radians().value()
    } else {
        0.0
    };
    Ok((
        Complex64::new(1.0, 0.0) / Complex64::new(r, x),
        Complex64::from_polar(magnitude, shift),
    ))
}

impl NetworkModel {
    pub fn len(&self) -> usize {
        self.kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }

    pub fn build(net: &PowerNet, calculate_voltage_angles: bool) -> GridResult<Self> {
        if !(net.sn_mva.is_finite() && net.sn_mva > 0.0) {
            return Err(GridError::solver(format!("invalid sn_mva {}", net.sn_mva)));
        }
        let topo = Topology::build(net);
        let slack_grids: Vec<(usize, f64, f64)> = net
            .ext_grid
            .values()
            .filter(|e| e.in_service && topo.node_of(e.bus).is_some())
            .map(|e| (e.bus, e.vm_pu, e.va_degree))
            .collect();
        if slack_grids.is_empty() {
            return Err(GridError::solver(
                "no in-service external grid: the network has no slack source",
            ));
        }

        let supplied = topo.supplied_buses(net);
        let mut stranded: BTreeSet<usize> = BTreeSet::new();
        for bus in net
            .load
            .values()
            .filter(|l| l.in_service)
            .map(|l| l.bus)
            .chain(net.gen.values().filter(|g| g.in_service).map(|g| g.bus))
        {
            let bus_live = net.bus.get(bus).is_some_and(|b| b.in_service);
            if bus_live && !supplied.contains(&bus) {
                stranded.insert(bus);
            }
        }
        if !stranded.is_empty() {
            let list: Vec<String> = stranded.iter().map(|b| b.to_string()).collect();
            return Err(GridError::solver(format!(
                "buses [{}] carry load or generation but have no path to an external grid",
                list.join(", ")
            )));
        }

        // Node positions over energized bus groups
        let mut position_of_node = HashMap::new();
        let mut node_buses: Vec<Vec<usize>> = Vec::new();
        let mut node_of_bus = HashMap::new();
        for &bus in &supplied {
            let Some(node) = topo.node_of(bus) else {
                continue;
            };
            let pos = *position_of_node.entry(node).or_insert_with(|| {
                node_buses.push(Vec::new());
                node_buses.len() - 1
            });
            node_buses[pos].push(bus);
            node_of_bus.insert(bus, pos);
        }
        let n = node_buses.len();

        let mut kind = vec![NodeKind::Pq; n];
        let mut v_set = vec![1.0; n];
        let mut theta_slack = vec![None; n];
        for &(bus, vm_pu, va_degree) in &slack_grids {
            let pos = node_of_bus[&bus];
            if kind[pos] == NodeKind::Slack {
                if (v_set[pos] - vm_pu).abs() > 1e-9 {
                    debug!(bus, "ignoring second external grid setpoint on the same node");
                }
                continue;
            }
            kind[pos] = NodeKind::Slack;
            v_set[pos] = vm_pu;
            theta_slack[pos] = Some(if calculate_voltage_angles {
                Degrees(va_degree).to_radians().value()
            } else {
                0.0
            });
        }

        let mut s_spec = vec![Complex64::new(0.0, 0.0); n];
        for gen in net.gen.values().filter(|g| g.in_service) {
            let Some(&pos) = node_of_bus.get(&gen.bus) else {
                continue;
            };
            s_spec[pos] += Complex64::new(gen.p_mw / net.sn_mva, 0.0);
            if kind[pos] == NodeKind::Pq {
                kind[pos] = NodeKind::Pv;
                v_set[pos] = gen.vm_pu;
            }
        }
        for load in net.load.values().filter(|l| l.in_service) {
            if let Some(&pos) = node_of_bus.get(&load.bus) {
                s_spec[pos] -= Complex64::new(load.scaled_p_mw(), load.scaled_q_mvar()) / net.sn_mva;
            }
        }

        let mut y_shunt = vec![Complex64::new(0.0, 0.0); n];
        for shunt in net.shunt.values().filter(|s| s.in_service) {
            if let Some(&pos) = node_of_bus.get(&shunt.bus) {
                y_shunt[pos] += Complex64::new(shunt.p_mw, -shunt.q_mvar) / net.sn_mva;
            }
        }

        let mut branches = Vec::new();
        let mut loop_branches = Vec::new();
        let mut push_branch = |branch: BranchModel, y_shunt: &mut Vec<Complex64>| {
            if branch.from == branch.to {
                let [a, b, c, d] = branch.coefficients();
                y_shunt[branch.from] += a + b + c + d;
                loop_branches.push(branch);
            } else {
                branches.push(branch);
            }
        };
        for (idx, line) in net.line.iter() {
            if !line.in_service || branch_switched_open(net, SwitchTarget::Line(idx)) {
                continue;
            }
            let (Some(&from), Some(&to)) =
                (node_of_bus.get(&line.from_bus), node_of_bus.get(&line.to_bus))
            else {
                continue;
            };
            let (y_series, y_sh) = line_admittances(net, idx, line)?;
            push_branch(
                BranchModel {
                    element: BranchRef::Line(idx),
                    from,
                    to,
                    from_bus: line.from_bus,
                    to_bus: line.to_bus,
                    y_series,
                    y_shunt: y_sh,
                    ratio: Complex64::new(1.0, 0.0),
                },
                &mut y_shunt,
            );
        }
        for (idx, trafo) in net.trafo.iter() {
            if !trafo.in_service || branch_switched_open(net, SwitchTarget::Trafo(idx)) {
                continue;
            }
            let (Some(&from), Some(&to)) =
                (node_of_bus.get(&trafo.hv_bus), node_of_bus.get(&trafo.lv_bus))
            else {
                continue;
            };
            let (y_series, ratio) = trafo_parameters(net, idx, trafo, calculate_voltage_angles)?;
            push_branch(
                BranchModel {
                    element: BranchRef::Trafo(idx),
                    from,
                    to,
                    from_bus: trafo.hv_bus,
                    to_bus: trafo.lv_bus,
                    y_series,
                    y_shunt: Complex64::new(0.0, 0.0),
                    ratio,
                },
                &mut y_shunt,
            );
        }

        let theta_init = initial_angles(n, &branches, &theta_slack);

        Ok(Self {
            sn_mva: net.sn_mva,
            node_buses,
            node_of_bus,
            kind,
            v_set,
            theta_init,
            s_spec,
            y_shunt,
            branches,
            loop_branches,
        })
    }

    /// Dense admittance matrix, row-major `n x n`.
    pub fn y_bus(&self) -> Vec<Complex64> {
        let n = self.len();
        let mut y = vec![Complex64::new(0.0, 0.0); n * n];
        for (i, ysh) in self.y_shunt.iter().enumerate() {
            y[i * n + i] += *ysh;
        }
        for br in &self.branches {
            let [a, b, c, d] = br.coefficients();
            y[br.from * n + br.from] += a;
            y[br.from * n + br.to] += b;
            y[br.to * n + br.from] += c;
            y[br.to * n + br.to] += d;
        }
        y
    }

    /// Complex power injected into the network at each node, `V * conj(Y V)`.
    pub fn injections(&self, y_bus: &[Complex64], v: &[Complex64]) -> Vec<Complex64> {
        let n = v.len();
        (0..n)
            .map(|i| {
                let current: Complex64 = (0..n).map(|j| y_bus[i * n + j] * v[j]).sum();
                v[i] * current.conj()
            })
            .collect()
    }

    /// Largest injection mismatch over the given nodes, in MVA.
    pub fn mismatch_mva(&self, s_calc: &[Complex64], nodes: impl Iterator<Item = usize>) -> f64 {
        nodes
            .map(|i| (self.s_spec[i] - s_calc[i]).norm())
            .fold(0.0, f64::max)
            * self.sn_mva
    }
}

/// Walks out from the slack nodes, carrying transformer phase shifts so the
/// starting point sits close to the solution when angles are honoured.
fn initial_angles(n: usize, branches: &[BranchModel], theta_slack: &[Option<f64>]) -> Vec<f64> {
    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for br in branches {
        let shift = br.shift_rad();
        adjacency[br.from].push((br.to, -shift));
        adjacency[br.to].push((br.from, shift));
    }
    let mut theta = vec![0.0; n];
    let mut seen = vec![false; n];
    let mut queue = VecDeque::new();
    for (i, t) in theta_slack.iter().enumerate() {
        if let Some(t) = t {
            theta[i] = *t;
            seen[i] = true;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        for &(j, delta) in &adjacency[i] {
            if !seen[j] {
                seen[j] = true;
                theta[j] = theta[i] + delta;
                queue.push_back(j);
            }
        }
    }
    theta
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridmate_core::{BusType, ElementKind};

    fn feeder() -> PowerNet {
        let mut net = PowerNet::default();
        let hv = net.create_bus("hv", 110.0, BusType::Busbar, None).unwrap();
        let mv = net.create_bus("mv", 20.0, BusType::Busbar, None).unwrap();
        let far = net.create_bus("far", 20.0, BusType::Busbar, None).unwrap();
        net.create_ext_grid(hv, 1.0, 0.0, None).unwrap();
        net.create_transformer(hv, mv, "25 MVA 110/20 kV", None).unwrap();
        net.create_line(mv, far, 3.0, "NA2XS2Y 1x185 RM/25 12/20 kV", None)
            .unwrap();
        net.create_load(far, 2.0, 0.5, None).unwrap();
        net
    }

    #[test]
    fn test_line_admittance_per_unit() {
        let net = feeder();
        let line = net.line.get(0).unwrap();
        let (y, ysh) = line_admittances(&net, 0, line).unwrap();
        let z_base = 20.0 * 20.0 / 1.0;
        let z_pu = Complex64::new(0.161, 0.117) * 3.0 / z_base;
        assert!((y - Complex64::new(1.0, 0.0) / z_pu).norm() < 1e-9);
        let b_pu = 2.0 * std::f64::consts::PI * 50.0 * 273e-9 * 3.0 * z_base;
        assert!((ysh.im - b_pu).abs() < 1e-12);
    }

    #[test]
    fn test_trafo_shift_only_with_angles() {
        let net = feeder();
        let trafo = net.trafo.get(0).unwrap();
        let (_, with) = trafo_parameters(&net, 0, trafo, true).unwrap();
        let (_, without) = trafo_parameters(&net, 0, trafo, false).unwrap();
        assert!((with.arg().to_degrees() - 150.0).abs() < 1e-9);
        assert!(without.arg().abs() < 1e-12);
        assert!((without.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_initial_angles_follow_shift() {
        let model = NetworkModel::build(&feeder(), true).unwrap();
        let far = model.node_of_bus[&2];
        assert!((model.theta_init[far].to_degrees() + 150.0).abs() < 1e-9);
        assert_eq!(model.kind[model.node_of_bus[&0]], NodeKind::Slack);
    }

    #[test]
    fn test_stranded_load_fails() {
        let mut net = feeder();
        net.set_in_service(ElementKind::Line, 0, false).unwrap();
        let err = NetworkModel::build(&net, true).unwrap_err();
        assert!(matches!(err, GridError::Solver(_)));
        assert!(err.to_string().contains("[2]"));
    }

    #[test]
    fn test_unsupplied_empty_bus_is_dropped() {
        let mut net = feeder();
        net.create_bus("spare", 20.0, BusType::Node, None).unwrap();
        let model = NetworkModel::build(&net, true).unwrap();
        assert_eq!(model.len(), 3);
        assert!(!model.node_of_bus.contains_key(&3));
    }

    #[test]
    fn test_no_slack_fails() {
        let mut net = feeder();
        net.set_in_service(ElementKind::ExtGrid, 0, false).unwrap();
        assert!(NetworkModel::build(&net, false).is_err());
    }
}

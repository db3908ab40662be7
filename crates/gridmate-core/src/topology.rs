//! Electrical topology of a network.
//!
//! Buses joined by closed bus-bus switches are fused into one graph node.
//! In-service lines and transformers become edges unless a switch on them is
//! open. Out-of-service buses are left out entirely.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::Bfs;

use crate::{PowerNet, SwitchTarget};

/// Branch carried by a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Line(usize),
    Trafo(usize),
}

#[derive(Debug, Clone)]
pub struct Topology {
    /// Node weight is the representative (lowest) bus index of the group
    graph: UnGraph<usize, Connection>,
    node_of_bus: BTreeMap<usize, NodeIndex>,
}

/// True when an open switch sits on the given line or transformer.
pub fn branch_switched_open(net: &PowerNet, target: SwitchTarget) -> bool {
    net.switch
        .values()
        .any(|sw| !sw.closed && sw.target == target)
}

impl Topology {
    pub fn build(net: &PowerNet) -> Self {
        let buses: Vec<usize> = net
            .bus
            .iter()
            .filter(|(_, b)| b.in_service)
            .map(|(idx, _)| idx)
            .collect();
        let position: HashMap<usize, usize> =
            buses.iter().enumerate().map(|(pos, &b)| (b, pos)).collect();

        let mut fused = UnionFind::<usize>::new(buses.len());
        for sw in net.switch.values().filter(|sw| sw.closed) {
            if let SwitchTarget::Bus(other) = sw.target {
                if let (Some(&a), Some(&b)) = (position.get(&sw.bus), position.get(&other)) {
                    fused.union(a, b);
                }
            }
        }

        let mut graph = UnGraph::new_undirected();
        let mut node_of_root: HashMap<usize, NodeIndex> = HashMap::new();
        let mut node_of_bus = BTreeMap::new();
        for (pos, &bus) in buses.iter().enumerate() {
            let root = fused.find(pos);
            let node = *node_of_root
                .entry(root)
                .or_insert_with(|| graph.add_node(bus));
            node_of_bus.insert(bus, node);
        }

        let mut add_edge = |a: usize, b: usize, conn: Connection| {
            if let (Some(&na), Some(&nb)) = (node_of_bus.get(&a), node_of_bus.get(&b)) {
                if na != nb {
                    graph.add_edge(na, nb, conn);
                }
            }
        };
        for (idx, line) in net.line.iter() {
            if line.in_service && !branch_switched_open(net, SwitchTarget::Line(idx)) {
                add_edge(line.from_bus, line.to_bus, Connection::Line(idx));
            }
        }
        for (idx, trafo) in net.trafo.iter() {
            if trafo.in_service && !branch_switched_open(net, SwitchTarget::Trafo(idx)) {
                add_edge(trafo.hv_bus, trafo.lv_bus, Connection::Trafo(idx));
            }
        }

        Self { graph, node_of_bus }
    }

    pub fn graph(&self) -> &UnGraph<usize, Connection> {
        &self.graph
    }

    pub fn node_of(&self, bus: usize) -> Option<NodeIndex> {
        self.node_of_bus.get(&bus).copied()
    }

    pub fn island_count(&self) -> usize {
        connected_components(&self.graph)
    }

    /// All buses connected to any of `roots` (fused members included).
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut nodes = BTreeSet::new();
        for root in roots {
            let Some(start) = self.node_of(root) else {
                continue;
            };
            if nodes.contains(&start) {
                continue;
            }
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(node) = bfs.next(&self.graph) {
                nodes.insert(node);
            }
        }
        self.node_of_bus
            .iter()
            .filter(|(_, node)| nodes.contains(node))
            .map(|(&bus, _)| bus)
            .collect()
    }

    /// Buses with a path to an in-service external grid.
    pub fn supplied_buses(&self, net: &PowerNet) -> BTreeSet<usize> {
        self.reachable_from(
            net.ext_grid
                .values()
                .filter(|eg| eg.in_service)
                .map(|eg| eg.bus),
        )
    }

    /// True when the graph is a forest (no loops, no parallel branches).
    pub fn is_radial(&self) -> bool {
        self.graph.edge_count() + self.island_count() == self.graph.node_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusType;

    fn chain(n: usize) -> PowerNet {
        let mut net = PowerNet::default();
        let buses: Vec<usize> = (0..n)
            .map(|i| {
                net.create_bus(format!("b{i}"), 20.0, BusType::Busbar, None)
                    .unwrap()
            })
            .collect();
        for pair in buses.windows(2) {
            net.create_line(pair[0], pair[1], 1.0, "NA2XS2Y 1x95 RM/25 12/20 kV", None)
                .unwrap();
        }
        net.create_ext_grid(buses[0], 1.0, 0.0, None).unwrap();
        net
    }

    #[test]
    fn test_chain_is_radial_single_island() {
        let net = chain(4);
        let topo = Topology::build(&net);
        assert!(topo.is_radial());
        assert_eq!(topo.island_count(), 1);
        assert_eq!(topo.supplied_buses(&net).len(), 4);
    }

    #[test]
    fn test_closing_loop_makes_mesh() {
        let mut net = chain(3);
        net.create_line(2, 0, 1.0, "NAYY 4x50 SE", None).unwrap();
        assert!(!Topology::build(&net).is_radial());
    }

    #[test]
    fn test_open_line_switch_splits_island() {
        let mut net = chain(3);
        net.create_switch(1, SwitchTarget::Line(1), false, None)
            .unwrap();
        let topo = Topology::build(&net);
        assert_eq!(topo.island_count(), 2);
        assert_eq!(topo.reachable_from([2]), BTreeSet::from([2]));
        let supplied = topo.supplied_buses(&net);
        assert!(!supplied.contains(&2));
    }

    #[test]
    fn test_bus_switch_fuses_buses() {
        let mut net = chain(2);
        let extra = net
            .create_bus("coupler", 20.0, BusType::Node, None)
            .unwrap();
        net.create_switch(1, SwitchTarget::Bus(extra), true, None)
            .unwrap();
        let topo = Topology::build(&net);
        assert_eq!(topo.graph().node_count(), 2);
        assert_eq!(topo.node_of(extra), topo.node_of(1));
        assert!(topo.supplied_buses(&net).contains(&extra));
    }

    #[test]
    fn test_out_of_service_bus_excluded() {
        let mut net = chain(3);
        net.set_in_service(crate::ElementKind::Bus, 2, false).unwrap();
        let topo = Topology::build(&net);
        assert_eq!(topo.node_of(2), None);
        assert_eq!(topo.graph().edge_count(), 1);
    }
}

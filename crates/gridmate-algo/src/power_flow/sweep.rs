//! Backward/forward sweep for radial networks.
//!
//! Each island must be a tree rooted at exactly one slack node. The backward
//! pass walks leaves to root accumulating branch currents from the nodal
//! injections; the forward pass walks root to leaves updating voltages from
//! the branch two-port equations. Generators are treated as fixed-P
//! injections, so PV setpoints are not held.

use std::collections::VecDeque;

use gridmate_core::{GridError, GridResult};
use num_complex::Complex64;
use tracing::{debug, trace};

use super::model::{NetworkModel, NodeKind};
use super::Solution;

#[derive(Debug, Clone, Copy)]
struct Link {
    parent: usize,
    branch: usize,
    /// True when the child sits on the branch's to (lv) side
    child_is_to: bool,
}

/// Spanning tree of the energized network, rooted at the slack nodes.
#[derive(Debug)]
struct FeederTree {
    /// Non-root nodes in breadth-first order
    order: Vec<usize>,
    link: Vec<Option<Link>>,
}

impl FeederTree {
    fn build(model: &NetworkModel) -> GridResult<Self> {
        let n = model.len();
        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for (b, br) in model.branches.iter().enumerate() {
            adjacency[br.from].push((b, br.to));
            adjacency[br.to].push((b, br.from));
        }

        let mut visited = vec![false; n];
        let mut link: Vec<Option<Link>> = vec![None; n];
        let mut order = Vec::with_capacity(n);
        for root in (0..n).filter(|&i| model.kind[i] == NodeKind::Slack) {
            if visited[root] {
                return Err(GridError::solver(
                    "backward/forward sweep needs exactly one external grid per island",
                ));
            }
            visited[root] = true;
            let mut queue = VecDeque::from([root]);
            while let Some(node) = queue.pop_front() {
                let parent_branch = link[node].map(|l| l.branch);
                for &(b, next) in &adjacency[node] {
                    if Some(b) == parent_branch {
                        continue;
                    }
                    if visited[next] {
                        return Err(GridError::solver(
                            "backward/forward sweep requires a radial network, found a meshed topology",
                        ));
                    }
                    visited[next] = true;
                    link[next] = Some(Link {
                        parent: node,
                        branch: b,
                        child_is_to: model.branches[b].to == next,
                    });
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        if let Some(stray) = visited.iter().position(|v| !v) {
            return Err(GridError::solver(format!(
                "bus {} is not reachable from an external grid",
                model.node_buses[stray].first().copied().unwrap_or_default()
            )));
        }
        Ok(Self { order, link })
    }
}

pub fn solve(model: &NetworkModel, max_iteration: usize, tolerance_mva: f64) -> GridResult<Solution> {
    let tree = FeederTree::build(model)?;
    let n = model.len();
    let y_bus = model.y_bus();
    let zero = Complex64::new(0.0, 0.0);

    let mut v: Vec<Complex64> = (0..n)
        .map(|i| {
            let magnitude = if model.kind[i] == NodeKind::Slack {
                model.v_set[i]
            } else {
                1.0
            };
            Complex64::from_polar(magnitude, model.theta_init[i])
        })
        .collect();
    let check_nodes: Vec<usize> = (0..n).filter(|&i| model.kind[i] != NodeKind::Slack).collect();

    let mut branch_current = vec![zero; n];
    let mut iterations = 0;
    loop {
        let s_calc = model.injections(&y_bus, &v);
        let max_mismatch_mva = model.mismatch_mva(&s_calc, check_nodes.iter().copied());
        trace!(iteration = iterations, max_mismatch_mva, "sweep step");

        if !max_mismatch_mva.is_finite() {
            return Err(GridError::solver("backward/forward sweep diverged (non-finite mismatch)"));
        }
        if max_mismatch_mva < tolerance_mva || iterations >= max_iteration {
            let converged = max_mismatch_mva < tolerance_mva;
            debug!(iterations, max_mismatch_mva, converged, "sweep finished");
            return Ok(Solution::from_complex(v, converged, iterations, max_mismatch_mva));
        }

        // Backward: current entering each parent branch at the child terminal
        let mut into_children = vec![zero; n];
        for &c in tree.order.iter().rev() {
            let Some(link) = tree.link[c] else {
                continue;
            };
            let injected = (model.s_spec[c] / v[c]).conj() - model.y_shunt[c] * v[c];
            let i_child = injected - into_children[c];
            let [a, b, cc, d] = model.branches[link.branch].coefficients();
            let i_parent = if link.child_is_to {
                let v_from = (i_child - d * v[c]) / cc;
                a * v_from + b * v[c]
            } else {
                let v_to = (i_child - a * v[c]) / b;
                cc * v[c] + d * v_to
            };
            branch_current[c] = i_child;
            into_children[link.parent] += i_parent;
        }

        // Forward: child voltage from the updated parent voltage
        for &c in &tree.order {
            let Some(link) = tree.link[c] else {
                continue;
            };
            let [a, b, cc, d] = model.branches[link.branch].coefficients();
            let v_parent = v[link.parent];
            v[c] = if link.child_is_to {
                (branch_current[c] - cc * v_parent) / d
            } else {
                (branch_current[c] - b * v_parent) / a
            };
        }
        iterations += 1;
    }
}

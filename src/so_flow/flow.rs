//! Traffic assignment definitions
//! - EdgeFlow
//! - Assignment
//! - SystemOptimum
use super::error::SoResult;
use super::network::{EdgeCost, Network};
use super::utils::sim_eq;
use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef; // for EdgeReference.id()
use petgraph::Direction;
use std::collections::HashMap;

/// Solved values of one edge
/// - `total` flow l(e)
/// - `cost` total cost phi(e)
/// - `per_od` flow x(e, k) of each od pair, in the order of `Network::od_pairs`
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFlow {
    pub total: f64,
    pub cost: f64,
    pub per_od: Vec<f64>,
}

impl EdgeFlow {
    pub fn new(total: f64, cost: f64, per_od: Vec<f64>) -> EdgeFlow {
        EdgeFlow {
            total,
            cost,
            per_od,
        }
    }
}

impl std::fmt::Display for EdgeFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "flow={} cost={}", self.total, self.cost)
    }
}

/// Assignment is a mapping of `EdgeFlow` to each edge
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment(HashMap<EdgeIndex, EdgeFlow>);

impl Assignment {
    pub fn empty() -> Assignment {
        Assignment(HashMap::new())
    }
    pub fn from_vec(vec: Vec<(EdgeIndex, EdgeFlow)>) -> Assignment {
        Assignment(vec.into_iter().collect())
    }
    pub fn get(&self, e: EdgeIndex) -> Option<&EdgeFlow> {
        self.0.get(&e)
    }
    pub fn set(&mut self, e: EdgeIndex, v: EdgeFlow) {
        self.0.insert(e, v);
    }
    pub fn has(&self, e: EdgeIndex) -> bool {
        self.0.contains_key(&e)
    }
    /// total flow l(e), 0 if undefined
    pub fn flow(&self, e: EdgeIndex) -> f64 {
        self.get(e).map_or(0.0, |ef| ef.total)
    }
    /// flow x(e, k) of the `k`-th od pair, 0 if undefined
    pub fn od_flow(&self, e: EdgeIndex, k: usize) -> f64 {
        self.get(e)
            .and_then(|ef| ef.per_od.get(k).copied())
            .unwrap_or(0.0)
    }
    ///
    /// `Σ_e l(e) * cost_e(l(e))` evaluated with the cost functions of the network
    ///
    pub fn total_cost(&self, network: &Network) -> SoResult<f64> {
        let graph = network.graph();
        graph.edge_indices().try_fold(0.0, |acc, e| {
            let flow = self.flow(e);
            Ok(acc + flow * graph[e].cost(flow)?)
        })
    }
}

/// Result of a system optimum solve
#[derive(Debug, Clone, PartialEq)]
pub struct SystemOptimum {
    /// optimal `Σ_e phi(e)`
    pub objective: f64,
    pub total_demand: f64,
    pub assignment: Assignment,
}

impl SystemOptimum {
    ///
    /// Average cost per unit of demand, the reported System Optimum.
    /// `None` if there is no demand.
    ///
    pub fn average_cost(&self) -> Option<f64> {
        if self.total_demand > 0.0 {
            Some(self.objective / self.total_demand)
        } else {
            None
        }
    }
}

///
/// Check if the assignment is valid, i.e. it satisfies
/// - values of all edges are defined
/// - every value is non-negative
/// - total flows are the sums of od flows
/// - flow conservation of every od pair
///
pub fn is_valid_assignment(a: &Assignment, network: &Network, eps: f64) -> bool {
    is_defined_for_all_edges(a, network)
        && is_non_negative(a, eps)
        && is_aggregated(a, eps)
        && is_satisfying_flow_conservation(a, network, eps)
}

///
/// Check if the assignment contains all edges and all od pairs
///
pub fn is_defined_for_all_edges(a: &Assignment, network: &Network) -> bool {
    let n_od = network.od_pairs().len();
    network
        .graph()
        .edge_indices()
        .all(|e| a.get(e).map_or(false, |ef| ef.per_od.len() == n_od))
}

pub fn is_non_negative(a: &Assignment, eps: f64) -> bool {
    a.0.values().all(|ef| {
        ef.total >= -eps && ef.cost >= -eps && ef.per_od.iter().all(|&x| x >= -eps)
    })
}

///
/// For each edge, `l(e) = Σ_k x(e, k)`
///
pub fn is_aggregated(a: &Assignment, eps: f64) -> bool {
    a.0.values()
        .all(|ef| sim_eq(ef.total, ef.per_od.iter().sum(), eps))
}

///
/// For each od pair and each node,
/// (the sum of in-coming flows) - (the sum of out-going flows) should be
/// `-demand` at the origin, `demand` at the destination and 0 elsewhere.
///
pub fn is_satisfying_flow_conservation(a: &Assignment, network: &Network, eps: f64) -> bool {
    let graph = network.graph();
    network.od_pairs().iter().enumerate().all(|(k, od)| {
        graph.node_indices().all(|v| {
            let in_flow: f64 = graph
                .edges_directed(v, Direction::Incoming)
                .map(|er| a.od_flow(er.id(), k))
                .sum();
            let out_flow: f64 = graph
                .edges_directed(v, Direction::Outgoing)
                .map(|er| a.od_flow(er.id(), k))
                .sum();
            sim_eq(in_flow - out_flow, od.demand_at(&graph[v].name), eps)
        })
    })
}

//! # `Network`
//!
//! Road network with per-edge cost functions and an OD demand matrix.
//!
//! `NetworkGraph` is a DiGraph whose node is `Node` and whose edge is `Edge`.
//!
//! `Edge` has
//! * `start`, `end` names of the end nodes
//! * `function` the shared `CostFunction` template
//! * `values` the constant values bound to this edge
//!
//! The network is built once by the parser and only read afterwards.
//!
use super::error::{FormatReason, SoResult};
use super::expr::Expr;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Node of the network, identified by its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
}

impl Node {
    pub fn new(name: &str) -> Node {
        Node {
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Cost function template `name (param) expr`
///
/// Every free variable of `expr` other than `param` is a constant, listed in
/// `constants` in the order it first occurs in the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CostFunction {
    pub name: String,
    /// flow parameter
    pub param: String,
    pub constants: Vec<String>,
    pub expr: Expr,
}

impl CostFunction {
    pub fn new(name: &str, param: &str, expr: Expr) -> CostFunction {
        let constants = expr
            .variables()
            .into_iter()
            .filter(|v| v != param)
            .collect();
        CostFunction {
            name: name.to_string(),
            param: param.to_string(),
            constants,
            expr,
        }
    }
}

/// Directed edge `start -> end` with its cost function
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// name given in the network file
    pub name: String,
    pub start: String,
    pub end: String,
    pub function: Arc<CostFunction>,
    /// constant values, in the order of `function.constants`
    pub values: Vec<f64>,
}

impl Edge {
    pub fn new(
        name: &str,
        start: &str,
        end: &str,
        function: Arc<CostFunction>,
        values: Vec<f64>,
    ) -> Edge {
        Edge {
            name: name.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            function,
            values,
        }
    }

    /// name of the flow parameter of the cost function
    pub fn param(&self) -> &str {
        &self.function.param
    }

    /// `(constant name, value)` pairs of this edge
    pub fn constants(&self) -> Vec<(&str, f64)> {
        self.function
            .constants
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
            .collect()
    }

    ///
    /// Cost function with every constant replaced by its value, folded.
    /// Only the flow parameter stays symbolic.
    ///
    pub fn bound_expr(&self) -> Expr {
        self.function.expr.bind(&self.constants()).simplify()
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

///
/// cost trait
///
pub trait EdgeCost {
    /// travel cost of one unit of flow when `flow` units use the edge
    fn cost(&self, flow: f64) -> SoResult<f64>;
}

impl EdgeCost for Edge {
    fn cost(&self, flow: f64) -> SoResult<f64> {
        let constants = self.constants();
        let param = self.param();
        let cost = self.function.expr.eval(&|name: &str| {
            if name == param {
                Some(flow)
            } else {
                constants
                    .iter()
                    .find(|(c, _)| *c == name)
                    .map(|(_, v)| *v)
            }
        })?;
        Ok(cost)
    }
}

/// Travel demand between two distinct nodes
#[derive(Debug, Clone, PartialEq)]
pub struct OdPair {
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub demand: f64,
}

impl OdPair {
    pub fn new(name: &str, origin: &str, destination: &str, demand: f64) -> OdPair {
        OdPair {
            name: name.to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            demand,
        }
    }

    /// `"origin|destination"`
    pub fn key(&self) -> String {
        format!("{}|{}", self.origin, self.destination)
    }

    ///
    /// Right-hand side of the flow conservation of this pair at `node`:
    /// `-demand` at the origin, `+demand` at the destination, 0 elsewhere.
    ///
    pub fn demand_at(&self, node: &str) -> f64 {
        if node == self.origin {
            -self.demand
        } else if node == self.destination {
            self.demand
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for OdPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key(), self.demand)
    }
}

/// Network graph definition
pub type NetworkGraph = DiGraph<Node, Edge>;

/// Nodes and edges in declaration order, plus the OD matrix
#[derive(Debug, Clone, Default)]
pub struct Network {
    graph: NetworkGraph,
    node_ids: HashMap<String, NodeIndex>,
    od_pairs: Vec<OdPair>,
}

impl Network {
    pub fn new() -> Network {
        Network::default()
    }

    pub fn add_node(&mut self, name: &str) -> Result<NodeIndex, FormatReason> {
        if self.node_ids.contains_key(name) {
            return Err(FormatReason::DuplicateNode(name.to_string()));
        }
        let v = self.graph.add_node(Node::new(name));
        self.node_ids.insert(name.to_string(), v);
        Ok(v)
    }

    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.node_ids.get(name).copied()
    }

    fn require_node(&self, name: &str) -> Result<NodeIndex, FormatReason> {
        self.node_index(name)
            .ok_or_else(|| FormatReason::UnknownNode(name.to_string()))
    }

    /// Add a directed edge. Both end nodes must be declared already.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeIndex, FormatReason> {
        let v = self.require_node(&edge.start)?;
        let w = self.require_node(&edge.end)?;
        Ok(self.graph.add_edge(v, w, edge))
    }

    ///
    /// Register the demand of an OD pair.
    ///
    /// A pair whose origin and destination coincide is not stored. A second
    /// declaration of the same pair replaces the first demand.
    ///
    pub fn set_demand(&mut self, od: OdPair) -> Result<(), FormatReason> {
        self.require_node(&od.origin)?;
        self.require_node(&od.destination)?;
        if od.demand < 0.0 {
            return Err(FormatReason::NegativeDemand(od.demand));
        }
        if od.origin == od.destination {
            return Ok(());
        }
        match self
            .od_pairs
            .iter_mut()
            .find(|p| p.origin == od.origin && p.destination == od.destination)
        {
            Some(p) => {
                warn!("demand of {} redeclared: {} -> {}", p.key(), p.demand, od.demand);
                *p = od;
            }
            None => self.od_pairs.push(od),
        }
        Ok(())
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edge_weights()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn od_pairs(&self) -> &[OdPair] {
        &self.od_pairs
    }

    pub fn od_pair(&self, key: &str) -> Option<&OdPair> {
        self.od_pairs.iter().find(|p| p.key() == key)
    }

    /// Sum of all OD demands
    pub fn total_demand(&self) -> f64 {
        self.od_pairs.iter().map(|p| p.demand).sum()
    }
}

//
// tests
//
#[cfg(test)]
mod tests {
    use super::*;

    fn affine() -> Arc<CostFunction> {
        Arc::new(CostFunction::new(
            "aff",
            "f",
            Expr::parse("m*f+n").unwrap(),
        ))
    }

    #[test]
    fn cost_function_constants_exclude_param() {
        let c = CostFunction::new("bpr", "f", Expr::parse("t*(1+a*(f/c)^4)").unwrap());
        assert_eq!(c.constants, vec!["t", "a", "c"]);
    }

    #[test]
    fn edge_cost_and_bound_expr() {
        let e = Edge::new("e1", "A", "B", affine(), vec![2.0, 1.0]);
        assert_eq!(e.constants(), vec![("m", 2.0), ("n", 1.0)]);
        assert_eq!(e.cost(0.0).unwrap(), 1.0);
        assert_eq!(e.cost(10.0).unwrap(), 21.0);
        assert_eq!(e.bound_expr().to_string(), "2*f+1");
        assert_eq!(e.to_string(), "A-B");
    }

    #[test]
    fn edges_need_declared_nodes() {
        let mut n = Network::new();
        n.add_node("A").unwrap();
        assert_eq!(n.add_node("A"), Err(FormatReason::DuplicateNode("A".into())));
        let e = Edge::new("e1", "A", "B", affine(), vec![2.0, 1.0]);
        assert_eq!(n.add_edge(e.clone()), Err(FormatReason::UnknownNode("B".into())));
        n.add_node("B").unwrap();
        assert!(n.add_edge(e).is_ok());
        assert_eq!(n.edge_count(), 1);
    }

    #[test]
    fn od_pairs() {
        let mut n = Network::new();
        n.add_node("A").unwrap();
        n.add_node("B").unwrap();
        n.set_demand(OdPair::new("A|A", "A", "A", 3.0)).unwrap();
        assert!(n.od_pairs().is_empty());

        n.set_demand(OdPair::new("A|B", "A", "B", 3.0)).unwrap();
        n.set_demand(OdPair::new("again", "A", "B", 5.0)).unwrap();
        assert_eq!(n.od_pairs().len(), 1);
        assert_eq!(n.od_pair("A|B").unwrap().demand, 5.0);
        assert_eq!(n.total_demand(), 5.0);

        assert_eq!(
            n.set_demand(OdPair::new("B|A", "B", "A", -1.0)),
            Err(FormatReason::NegativeDemand(-1.0))
        );
        assert_eq!(
            n.set_demand(OdPair::new("B|C", "B", "C", 1.0)),
            Err(FormatReason::UnknownNode("C".into()))
        );
    }

    #[test]
    fn demand_at_sums_to_zero() {
        let od = OdPair::new("A|C", "A", "C", 7.5);
        assert_eq!(od.demand_at("A"), -7.5);
        assert_eq!(od.demand_at("C"), 7.5);
        assert_eq!(od.demand_at("B"), 0.0);
        let total: f64 = ["A", "B", "C"].iter().map(|v| od.demand_at(v)).sum();
        assert_eq!(total, 0.0);
    }
}

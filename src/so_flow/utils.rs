//!
//! utils
//!
use super::network::Network;
use petgraph::dot::Dot;

///
/// check if `a` and `b` are equal up to an absolute error `eps`
///
pub fn sim_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

///
/// graphviz dot of the network, each edge labeled with its bound cost function
///
pub fn draw(network: &Network) -> String {
    let graph = network
        .graph()
        .map(|_, n| n.name.clone(), |_, e| e.bound_expr().to_string());
    format!("{}", Dot::with_config(&graph, &[]))
}

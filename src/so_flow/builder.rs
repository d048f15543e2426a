//!
//! System optimum model of a network
//!
//! Variables, for each edge `e` and od pair `k`
//! * `phi_e` total cost of the edge
//! * `l_e` total flow of the edge
//! * `x_e_{k}` flow of the pair `k` on the edge
//!
//! ```text
//! minimize    Σ_e phi_e
//! subject to  m_e l_e^2 + n_e l_e <= phi_e       (cost)
//!             l_e = Σ_k x_e_k                    (total flow)
//!             Σ_in x_e_k - Σ_out x_e_k = d_v_k   (flow conservation)
//!             phi_e, l_e, x_e_k >= 0             (domain)
//! ```
//! where `cost_e(f) = m_e f + n_e`.
//!
use super::affine::{linearize, AffineCost};
use super::backend::{Outcome, Solution, SolverBackend};
use super::error::{NonAffine, SoError, SoResult};
use super::flow::{Assignment, EdgeFlow, SystemOptimum};
use super::model::{LinearExpr, OptimizationModel, QuadExpr, Relation, Sense, Var, VarKind};
use super::network::Network;
use itertools::iproduct;
use petgraph::graph::EdgeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashSet;
use tracing::{debug, info};

/// Optimization model of the system optimum of `network`
#[derive(Debug, Clone)]
pub struct SoModel<'a> {
    network: &'a Network,
    model: OptimizationModel,
    /// affine cost of each edge
    costs: Vec<AffineCost>,
    /// unique name of each edge used in variable names
    stems: Vec<String>,
    phi: Vec<Var>,
    l: Vec<Var>,
    /// `x[e][k]`
    x: Vec<Vec<Var>>,
}

impl<'a> SoModel<'a> {
    ///
    /// Build the model.
    ///
    /// Every cost function is linearized first, so an unsupported function
    /// fails before any variable is declared.
    ///
    pub fn build(network: &'a Network, name: &str) -> SoResult<SoModel<'a>> {
        let costs = network
            .edges()
            .map(|edge| {
                let cost = linearize(edge)?;
                if cost.slope < 0.0 {
                    return Err(SoError::UnsupportedFunction {
                        edge: edge.to_string(),
                        expr: edge.bound_expr().to_string(),
                        reason: NonAffine::Decreasing(cost.slope),
                    });
                }
                Ok(cost)
            })
            .collect::<SoResult<Vec<AffineCost>>>()?;

        let mut so = SoModel {
            network,
            model: OptimizationModel::new(name),
            costs,
            stems: edge_stems(network),
            phi: Vec::new(),
            l: Vec::new(),
            x: Vec::new(),
        };
        so.generate_vars();
        so.generate_objective_function();
        so.generate_cost_constraints();
        so.generate_total_flow_constraints();
        so.generate_flow_conservation_constraints();
        so.generate_domain_constraints();
        info!(
            "model {}: {} edges, {} od pairs, {} variables, {} constraints",
            name,
            network.edge_count(),
            network.od_pairs().len(),
            so.model.num_vars(),
            so.model.constraints().len()
        );
        Ok(so)
    }

    pub fn network(&self) -> &Network {
        self.network
    }
    pub fn model(&self) -> &OptimizationModel {
        &self.model
    }
    pub fn cost(&self, e: EdgeIndex) -> AffineCost {
        self.costs[e.index()]
    }
    pub fn stem(&self, e: EdgeIndex) -> &str {
        &self.stems[e.index()]
    }
    pub fn phi(&self, e: EdgeIndex) -> Var {
        self.phi[e.index()]
    }
    pub fn l(&self, e: EdgeIndex) -> Var {
        self.l[e.index()]
    }
    pub fn x(&self, e: EdgeIndex, k: usize) -> Var {
        self.x[e.index()][k]
    }

    fn generate_vars(&mut self) {
        let od_pairs = self.network.od_pairs();
        for stem in self.stems.iter() {
            self.phi.push(
                self.model
                    .declare_variable(&format!("phi_{}", stem), VarKind::Continuous),
            );
            self.l.push(
                self.model
                    .declare_variable(&format!("l_{}", stem), VarKind::Continuous),
            );
            let x = od_pairs
                .iter()
                .map(|od| {
                    self.model.declare_variable(
                        &format!("x_{}_{{{}}}", stem, od.key()),
                        VarKind::Continuous,
                    )
                })
                .collect();
            self.x.push(x);
        }
    }

    /// `minimize Σ_e phi_e`
    fn generate_objective_function(&mut self) {
        let objective = LinearExpr::sum(self.phi.iter().copied());
        self.model.set_objective(objective, Sense::Minimize);
    }

    /// `m l^2 + n l - phi <= 0`
    fn generate_cost_constraints(&mut self) {
        for (i, cost) in self.costs.iter().enumerate() {
            let (phi, l) = (self.phi[i], self.l[i]);
            let linear = LinearExpr::zero().term(l, cost.intercept).term(phi, -1.0);
            let mut expr = QuadExpr::from(linear);
            if cost.slope != 0.0 {
                expr = expr.quad_term(l, l, cost.slope);
            }
            debug!("cost of {}: {}*l^2 + {}*l <= phi", self.stems[i], cost.slope, cost.intercept);
            self.model
                .add_constraint(expr, Relation::Le, 0.0, Some(format!("cost_{}", self.stems[i])));
        }
    }

    /// `l - Σ_k x_k = 0`
    fn generate_total_flow_constraints(&mut self) {
        for (i, stem) in self.stems.iter().enumerate() {
            let expr = LinearExpr::from(self.l[i]).minus(LinearExpr::sum(self.x[i].iter().copied()));
            self.model
                .add_constraint(expr, Relation::Eq, 0.0, Some(format!("total_{}", stem)));
        }
    }

    /// `Σ_in x_k - Σ_out x_k = demand_at(v)` for every node `v` and pair `k`
    fn generate_flow_conservation_constraints(&mut self) {
        let network = self.network;
        let graph = network.graph();
        let od_pairs = network.od_pairs();
        for ((k, od), v) in iproduct!(od_pairs.iter().enumerate(), graph.node_indices()) {
            let arriving = LinearExpr::sum(
                graph
                    .edges_directed(v, Direction::Incoming)
                    .map(|er| self.x[er.id().index()][k]),
            );
            let leaving = LinearExpr::sum(
                graph
                    .edges_directed(v, Direction::Outgoing)
                    .map(|er| self.x[er.id().index()][k]),
            );
            let node = &graph[v].name;
            self.model.add_constraint(
                arriving.minus(leaving),
                Relation::Eq,
                od.demand_at(node),
                Some(format!("flow_{}_{{{}}}", node, od.key())),
            );
        }
    }

    /// every variable `>= 0`
    fn generate_domain_constraints(&mut self) {
        let vars = self
            .phi
            .iter()
            .chain(self.l.iter())
            .chain(self.x.iter().flatten())
            .copied()
            .collect::<Vec<Var>>();
        for v in vars {
            self.model.add_constraint(v, Relation::Ge, 0.0, None);
        }
    }

    ///
    /// Solve the model with `backend`.
    ///
    /// A backend outcome without an optimum becomes `SoError::NoSolution`.
    /// Edge costs and the objective are taken from the cost rows at the
    /// solved flows, `m l^2 + n l`, not from the solved `phi`.
    ///
    pub fn solve<B: SolverBackend + ?Sized>(&self, backend: &B) -> SoResult<SystemOptimum> {
        match backend.solve(&self.model)? {
            Outcome::Optimal(solution) => {
                let assignment = self.assignment(&solution);
                let objective = self
                    .network
                    .graph()
                    .edge_indices()
                    .map(|e| assignment.get(e).map_or(0.0, |ef| ef.cost))
                    .sum::<f64>();
                debug!(
                    "objective {} (solver reported {})",
                    objective,
                    solution.objective_value()
                );
                Ok(SystemOptimum {
                    objective,
                    total_demand: self.network.total_demand(),
                    assignment,
                })
            }
            Outcome::NoSolution { status } => Err(SoError::NoSolution {
                model: self.model.name().to_string(),
                status,
            }),
        }
    }

    fn assignment(&self, solution: &Solution) -> Assignment {
        Assignment::from_vec(
            self.network
                .graph()
                .edge_indices()
                .map(|e| {
                    let i = e.index();
                    let total = solution.value(self.l[i]);
                    let per_od = self.x[i].iter().map(|&x| solution.value(x)).collect();
                    let flow = EdgeFlow::new(total, self.costs[i].total_cost(total), per_od);
                    (e, flow)
                })
                .collect(),
        )
    }
}

///
/// `start` and `end` names concatenated, e.g. `AB`.
/// A repeated name gets a suffix `_2`, `_3`, ...
///
fn edge_stems(network: &Network) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    network
        .edges()
        .map(|e| {
            let base = format!("{}{}", e.start, e.end);
            let mut stem = base.clone();
            let mut n = 1;
            while used.contains(&stem) {
                n += 1;
                stem = format!("{}_{}", base, n);
            }
            used.insert(stem.clone());
            stem
        })
        .collect()
}

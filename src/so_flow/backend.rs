//!
//! Solver backends
//!
//! A `SolverBackend` takes an `OptimizationModel` and reports either an optimal
//! point or the status the solver stopped with.
//!
//! `ClarabelBackend` maps the model to the conic form of clarabel
//!
//! ```text
//! minimize   1/2 x'Px + q'x
//! subject to Ax + s = b,  s in K
//! ```
//!
//! * `=` rows go to the zero cone
//! * linear `<=`, `>=` rows go to the nonnegative cone
//! * convex diagonal quadratic rows `Σ q_i x_i^2 + a'x <= b` go to a second order
//!   cone of dimension `k + 2`, using
//!   `(b + 1 - a'x)^2 >= Σ (2 sqrt(q_i) x_i)^2 + (b - 1 - a'x)^2`
//!
use super::config::SolverSettings;
use super::error::{SoError, SoResult};
use super::model::{Constraint, OptimizationModel, QuadExpr, Relation, Sense, Var};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use tracing::{debug, info, warn};

/// Values of the variables at the optimum
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    objective: f64,
    values: Vec<f64>,
}

impl Solution {
    pub fn new(objective: f64, values: Vec<f64>) -> Solution {
        Solution { objective, values }
    }
    pub fn objective_value(&self) -> f64 {
        self.objective
    }
    pub fn value(&self, v: Var) -> f64 {
        self.values[v.index()]
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Optimal(Solution),
    /// solver finished without an optimal point
    NoSolution { status: String },
}

pub trait SolverBackend {
    ///
    /// Solve `model`.
    ///
    /// `Err` is reserved for models the backend cannot represent; infeasible
    /// or unbounded models are reported as `Outcome::NoSolution`.
    ///
    fn solve(&self, model: &OptimizationModel) -> SoResult<Outcome>;
}

/// Interior point conic solver
#[derive(Debug, Clone, Default)]
pub struct ClarabelBackend {
    settings: SolverSettings,
}

impl ClarabelBackend {
    pub fn new(settings: SolverSettings) -> ClarabelBackend {
        ClarabelBackend { settings }
    }
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }
}

impl SolverBackend for ClarabelBackend {
    fn solve(&self, model: &OptimizationModel) -> SoResult<Outcome> {
        let n_var = model.num_vars();
        if n_var == 0 {
            return Ok(solve_constant(model));
        }

        let mut conic = ConicForm::new(n_var);
        for (row, constraint) in model.constraints().iter().enumerate() {
            conic.push_constraint(row, constraint)?;
        }
        let (objective, sense) = model.objective();
        let (p_mat, q) = objective_matrices(objective, sense, n_var);
        let n_rows = conic.rhs.len();
        debug!(
            "model {}: {} variables, {} cone rows, {} cones",
            model.name(),
            n_var,
            n_rows,
            conic.cones.len()
        );
        let a_mat = csc(n_rows, n_var, conic.cols);

        let s = &self.settings;
        let settings = DefaultSettingsBuilder::default()
            .verbose(s.verbose)
            .max_iter(s.max_iter)
            .tol_gap_abs(s.tol_gap_abs)
            .tol_gap_rel(s.tol_gap_rel)
            .tol_feas(s.tol_feas)
            .time_limit(s.time_limit.unwrap_or(f64::INFINITY))
            .build()
            .map_err(|e| SoError::Solver(format!("clarabel settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(&p_mat, &q, &a_mat, &conic.rhs, &conic.cones, settings)
            .map_err(|e| SoError::Solver(format!("clarabel initialization failed: {:?}", e)))?;
        solver.solve();

        let sol = solver.solution;
        match optimality(&sol.status) {
            Some(accuracy) => {
                if accuracy == Optimality::Reduced {
                    warn!(
                        "model {}: clarabel returned status {:?}, optimum has reduced accuracy",
                        model.name(),
                        sol.status
                    );
                }
                let objective = objective.eval(&sol.x);
                info!(
                    "model {} solved in {} iterations, objective={}",
                    model.name(),
                    sol.iterations,
                    objective
                );
                Ok(Outcome::Optimal(Solution::new(objective, sol.x)))
            }
            None => {
                warn!("model {}: clarabel returned status {:?}", model.name(), sol.status);
                Ok(Outcome::NoSolution {
                    status: format!("{:?}", sol.status),
                })
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Optimality {
    Full,
    /// optimum found only within the solver's relaxed tolerances
    Reduced,
}

/// `None` if the status carries no optimum
fn optimality(status: &SolverStatus) -> Option<Optimality> {
    match status {
        SolverStatus::Solved => Some(Optimality::Full),
        SolverStatus::AlmostSolved => Some(Optimality::Reduced),
        _ => None,
    }
}

/// A model without variables is decided by its constant rows alone
fn solve_constant(model: &OptimizationModel) -> Outcome {
    if model.constraints().iter().all(|c| c.is_satisfied(&[], 1e-9)) {
        Outcome::Optimal(Solution::new(model.objective().0.eval(&[]), Vec::new()))
    } else {
        Outcome::NoSolution {
            status: "PrimalInfeasible".to_string(),
        }
    }
}

/// `A`, `b` and cones collected column-wise
struct ConicForm {
    cols: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl ConicForm {
    fn new(n_var: usize) -> ConicForm {
        ConicForm {
            cols: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            cones: Vec::new(),
        }
    }

    /// add the row `b - a'x`
    fn push_row(&mut self, coeffs: &[(Var, f64)], b: f64) {
        let r = self.rhs.len();
        for &(v, c) in coeffs {
            if c != 0.0 {
                self.cols[v.index()].push((r, c));
            }
        }
        self.rhs.push(b);
    }

    /// `a'x = b`
    fn push_eq(&mut self, coeffs: &[(Var, f64)], b: f64) {
        self.push_row(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::ZeroConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::ZeroConeT(1)),
        }
    }

    /// `a'x <= b`
    fn push_leq(&mut self, coeffs: &[(Var, f64)], b: f64) {
        self.push_row(coeffs, b);
        match self.cones.last_mut() {
            Some(SupportedConeT::NonnegativeConeT(n)) => *n += 1,
            _ => self.cones.push(SupportedConeT::NonnegativeConeT(1)),
        }
    }

    /// `Σ q_i x_i^2 + a'x <= b` with every `q_i > 0`
    fn push_quadratic_leq(&mut self, squares: &[(Var, f64)], coeffs: &[(Var, f64)], b: f64) {
        self.push_row(coeffs, b + 1.0);
        for &(v, q) in squares {
            self.push_row(&[(v, -2.0 * q.sqrt())], 0.0);
        }
        self.push_row(coeffs, b - 1.0);
        self.cones
            .push(SupportedConeT::SecondOrderConeT(squares.len() + 2));
    }

    fn push_constraint(&mut self, row: usize, c: &Constraint) -> SoResult<()> {
        let b = c.rhs - c.expr.linear.constant;
        let coeffs = &c.expr.linear.terms;
        if c.expr.is_linear() {
            match c.relation {
                Relation::Eq => self.push_eq(coeffs, b),
                Relation::Le => self.push_leq(coeffs, b),
                Relation::Ge => self.push_leq(&negated(coeffs), -b),
            }
            return Ok(());
        }

        let name = c
            .label
            .clone()
            .unwrap_or_else(|| format!("c{}", row));
        let (squares, coeffs, b) = match c.relation {
            Relation::Le => (diagonal(&c.expr, 1.0), coeffs.clone(), b),
            Relation::Ge => (diagonal(&c.expr, -1.0), negated(coeffs), -b),
            Relation::Eq => {
                return Err(SoError::Solver(format!(
                    "quadratic equality {} is not convex",
                    name
                )))
            }
        };
        let squares = squares.ok_or_else(|| {
            SoError::Solver(format!(
                "quadratic constraint {} is not a convex sum of squares",
                name
            ))
        })?;
        self.push_quadratic_leq(&squares, &coeffs, b);
        Ok(())
    }
}

fn negated(coeffs: &[(Var, f64)]) -> Vec<(Var, f64)> {
    coeffs.iter().map(|&(v, c)| (v, -c)).collect()
}

///
/// `(x_i, q_i)` of `sign * quad`, if it is `Σ q_i x_i^2` with `q_i >= 0`.
/// Zero terms are dropped.
///
fn diagonal(expr: &QuadExpr, sign: f64) -> Option<Vec<(Var, f64)>> {
    let mut squares: Vec<(Var, f64)> = Vec::new();
    for &(v, w, c) in &expr.quad {
        let c = sign * c;
        if c == 0.0 {
            continue;
        }
        if v != w || c < 0.0 {
            return None;
        }
        match squares.iter_mut().find(|(u, _)| *u == v) {
            Some((_, q)) => *q += c,
            None => squares.push((v, c)),
        }
    }
    Some(squares)
}

///
/// Upper triangular `P` and `q` of `1/2 x'Px + q'x`.
/// A maximization is turned into the minimization of the negated objective.
///
fn objective_matrices(
    objective: &QuadExpr,
    sense: Sense,
    n_var: usize,
) -> (CscMatrix<f64>, Vec<f64>) {
    let sign = match sense {
        Sense::Minimize => 1.0,
        Sense::Maximize => -1.0,
    };
    let mut q = vec![0.0; n_var];
    for &(v, c) in &objective.linear.terms {
        q[v.index()] += sign * c;
    }
    let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_var];
    for &(v, w, c) in &objective.quad {
        let (i, j) = if v <= w {
            (v.index(), w.index())
        } else {
            (w.index(), v.index())
        };
        // x'Px counts an off diagonal entry of the upper triangle twice
        let p = if i == j { 2.0 * c } else { c };
        cols[j].push((i, sign * p));
    }
    (csc(n_var, n_var, cols), q)
}

/// Build a CSC matrix; entries sharing a position are summed
fn csc(m: usize, n: usize, mut cols: Vec<Vec<(usize, f64)>>) -> CscMatrix<f64> {
    let mut col_ptr = Vec::with_capacity(n + 1);
    let mut row_idx = Vec::new();
    let mut values = Vec::new();
    for col in cols.iter_mut() {
        col_ptr.push(row_idx.len());
        col.sort_by_key(|(r, _)| *r);
        let mut last: Option<usize> = None;
        for &(r, v) in col.iter() {
            if last == Some(r) {
                if let Some(x) = values.last_mut() {
                    *x += v;
                }
            } else {
                row_idx.push(r);
                values.push(v);
                last = Some(r);
            }
        }
    }
    col_ptr.push(row_idx.len());
    CscMatrix::new(m, n, col_ptr, row_idx, values)
}

//
// tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::so_flow::model::{LinearExpr, VarKind};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
    }

    fn optimal(outcome: Outcome) -> Solution {
        match outcome {
            Outcome::Optimal(s) => s,
            other => panic!("expected an optimal solution, got {:?}", other),
        }
    }

    #[test]
    fn almost_solved_is_a_reduced_optimum() {
        assert_eq!(optimality(&SolverStatus::Solved), Some(Optimality::Full));
        assert_eq!(optimality(&SolverStatus::AlmostSolved), Some(Optimality::Reduced));
        assert_eq!(optimality(&SolverStatus::PrimalInfeasible), None);
        assert_eq!(optimality(&SolverStatus::MaxIterations), None);
    }

    #[test]
    fn csc_merges_duplicates() {
        let a = csc(2, 2, vec![vec![(1, 1.0), (0, 2.0), (1, 3.0)], vec![]]);
        assert_eq!(a.colptr, vec![0, 2, 2]);
        assert_eq!(a.rowval, vec![0, 1]);
        assert_eq!(a.nzval, vec![2.0, 4.0]);
    }

    #[test]
    fn linear_program() {
        // min x + 2y  s.t. x + y = 3, x <= 2, x, y >= 0
        let mut m = OptimizationModel::new("lp");
        let x = m.declare_variable("x", VarKind::Continuous);
        let y = m.declare_variable("y", VarKind::Continuous);
        m.add_constraint(LinearExpr::sum([x, y]), Relation::Eq, 3.0, None);
        m.add_constraint(x, Relation::Le, 2.0, None);
        m.add_constraint(x, Relation::Ge, 0.0, None);
        m.add_constraint(y, Relation::Ge, 0.0, None);
        m.set_objective(LinearExpr::from(x).term(y, 2.0), Sense::Minimize);
        let s = optimal(ClarabelBackend::default().solve(&m).unwrap());
        assert_close(s.value(x), 2.0);
        assert_close(s.value(y), 1.0);
        assert_close(s.objective_value(), 4.0);
    }

    #[test]
    fn epigraph_of_a_square() {
        // min t  s.t. x^2 + x <= t, x = 3
        let mut m = OptimizationModel::new("epi");
        let x = m.declare_variable("x", VarKind::Continuous);
        let t = m.declare_variable("t", VarKind::Continuous);
        let expr = QuadExpr::from(LinearExpr::from(x).term(t, -1.0)).quad_term(x, x, 1.0);
        m.add_constraint(expr, Relation::Le, 0.0, Some("epi".to_string()));
        m.add_constraint(x, Relation::Eq, 3.0, None);
        m.set_objective(t, Sense::Minimize);
        let s = optimal(ClarabelBackend::default().solve(&m).unwrap());
        assert_close(s.value(t), 12.0);
        assert_close(s.objective_value(), 12.0);
    }

    #[test]
    fn quadratic_objective() {
        // min x^2 - 2x  => x = 1
        let mut m = OptimizationModel::new("qp");
        let x = m.declare_variable("x", VarKind::Continuous);
        let obj = QuadExpr::from(LinearExpr::zero().term(x, -2.0)).quad_term(x, x, 1.0);
        m.add_constraint(x, Relation::Ge, -10.0, None);
        m.set_objective(obj, Sense::Minimize);
        let s = optimal(ClarabelBackend::default().solve(&m).unwrap());
        assert_close(s.value(x), 1.0);
        assert_close(s.objective_value(), -1.0);
    }

    #[test]
    fn maximize() {
        let mut m = OptimizationModel::new("max");
        let x = m.declare_variable("x", VarKind::Continuous);
        m.add_constraint(x, Relation::Le, 5.0, None);
        m.set_objective(x, Sense::Maximize);
        let s = optimal(ClarabelBackend::default().solve(&m).unwrap());
        assert_close(s.objective_value(), 5.0);
    }

    #[test]
    fn infeasible_model() {
        let mut m = OptimizationModel::new("infeasible");
        let x = m.declare_variable("x", VarKind::Continuous);
        m.add_constraint(x, Relation::Ge, 2.0, None);
        m.add_constraint(x, Relation::Le, 1.0, None);
        m.set_objective(x, Sense::Minimize);
        let outcome = ClarabelBackend::default().solve(&m).unwrap();
        assert!(matches!(outcome, Outcome::NoSolution { .. }));
    }

    #[test]
    fn non_convex_rows_are_rejected() {
        let mut m = OptimizationModel::new("nc");
        let x = m.declare_variable("x", VarKind::Continuous);
        let y = m.declare_variable("y", VarKind::Continuous);
        m.add_constraint(QuadExpr::default().quad_term(x, y, 1.0), Relation::Le, 1.0, None);
        m.set_objective(x, Sense::Minimize);
        assert!(matches!(
            ClarabelBackend::default().solve(&m),
            Err(SoError::Solver(_))
        ));

        let mut m = OptimizationModel::new("eq");
        let x = m.declare_variable("x", VarKind::Continuous);
        m.add_constraint(QuadExpr::default().quad_term(x, x, 1.0), Relation::Eq, 1.0, None);
        assert!(matches!(
            ClarabelBackend::default().solve(&m),
            Err(SoError::Solver(_))
        ));
    }

    #[test]
    fn empty_model() {
        let m = OptimizationModel::new("empty");
        let s = optimal(ClarabelBackend::default().solve(&m).unwrap());
        assert_eq!(s.objective_value(), 0.0);
    }
}

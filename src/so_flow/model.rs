//!
//! Solver independent optimization model
//!
//! - `Var` handle of a decision variable
//! - `LinearExpr`, `QuadExpr` expressions over variables
//! - `Constraint` `expr relation rhs`
//! - `OptimizationModel` variables, constraints and objective handed to a `SolverBackend`
//!

/// Handle of a variable declared in an `OptimizationModel`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub name: String,
    pub kind: VarKind,
}

/// `Σ c_i x_i + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(Var, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn zero() -> LinearExpr {
        LinearExpr::default()
    }

    /// sum of `vars`, all with coefficient 1
    pub fn sum<I: IntoIterator<Item = Var>>(vars: I) -> LinearExpr {
        vars.into_iter()
            .fold(LinearExpr::zero(), |e, v| e.term(v, 1.0))
    }

    ///
    /// Add `c * v`. Coefficients of a variable that already occurs are merged.
    ///
    pub fn term(mut self, v: Var, c: f64) -> LinearExpr {
        match self.terms.iter_mut().find(|(w, _)| *w == v) {
            Some((_, d)) => *d += c,
            None => self.terms.push((v, c)),
        }
        self
    }

    pub fn plus(mut self, other: LinearExpr) -> LinearExpr {
        self.constant += other.constant;
        other
            .terms
            .into_iter()
            .fold(self, |e, (v, c)| e.term(v, c))
    }

    pub fn minus(self, other: LinearExpr) -> LinearExpr {
        self.plus(other.scale(-1.0))
    }

    pub fn scale(mut self, k: f64) -> LinearExpr {
        self.constant *= k;
        for (_, c) in self.terms.iter_mut() {
            *c *= k;
        }
        self
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values[v.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl From<Var> for LinearExpr {
    fn from(v: Var) -> LinearExpr {
        LinearExpr::zero().term(v, 1.0)
    }
}

/// `Σ q_ij x_i x_j + linear`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadExpr {
    pub quad: Vec<(Var, Var, f64)>,
    pub linear: LinearExpr,
}

impl QuadExpr {
    /// Add `c * v * w`
    pub fn quad_term(mut self, v: Var, w: Var, c: f64) -> QuadExpr {
        let (v, w) = if v <= w { (v, w) } else { (w, v) };
        match self.quad.iter_mut().find(|(a, b, _)| *a == v && *b == w) {
            Some((_, _, d)) => *d += c,
            None => self.quad.push((v, w, c)),
        }
        self
    }

    pub fn is_linear(&self) -> bool {
        self.quad.iter().all(|(_, _, c)| *c == 0.0)
    }

    pub fn eval(&self, values: &[f64]) -> f64 {
        self.quad
            .iter()
            .map(|(v, w, c)| c * values[v.index()] * values[w.index()])
            .sum::<f64>()
            + self.linear.eval(values)
    }
}

impl From<LinearExpr> for QuadExpr {
    fn from(linear: LinearExpr) -> QuadExpr {
        QuadExpr {
            quad: Vec::new(),
            linear,
        }
    }
}

impl From<Var> for QuadExpr {
    fn from(v: Var) -> QuadExpr {
        QuadExpr::from(LinearExpr::from(v))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Relation {
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

/// `expr relation rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub label: Option<String>,
    pub expr: QuadExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// true if the values satisfy the constraint up to `eps`
    pub fn is_satisfied(&self, values: &[f64], eps: f64) -> bool {
        let lhs = self.expr.eval(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + eps,
            Relation::Ge => lhs >= self.rhs - eps,
            Relation::Eq => (lhs - self.rhs).abs() <= eps,
        }
    }
}

///
/// Variables, constraints and objective of one solve.
///
#[derive(Debug, Clone)]
pub struct OptimizationModel {
    name: String,
    vars: Vec<VarInfo>,
    constraints: Vec<Constraint>,
    objective: QuadExpr,
    sense: Sense,
}

impl OptimizationModel {
    pub fn new(name: &str) -> OptimizationModel {
        OptimizationModel {
            name: name.to_string(),
            vars: Vec::new(),
            constraints: Vec::new(),
            objective: QuadExpr::default(),
            sense: Sense::Minimize,
        }
    }

    pub fn declare_variable(&mut self, name: &str, kind: VarKind) -> Var {
        self.vars.push(VarInfo {
            name: name.to_string(),
            kind,
        });
        Var(self.vars.len() - 1)
    }

    /// Add `expr relation rhs` and return its row number
    pub fn add_constraint<E: Into<QuadExpr>>(
        &mut self,
        expr: E,
        relation: Relation,
        rhs: f64,
        label: Option<String>,
    ) -> usize {
        self.constraints.push(Constraint {
            label,
            expr: expr.into(),
            relation,
            rhs,
        });
        self.constraints.len() - 1
    }

    pub fn set_objective<E: Into<QuadExpr>>(&mut self, expr: E, sense: Sense) {
        self.objective = expr.into();
        self.sense = sense;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vars(&self) -> &[VarInfo] {
        &self.vars
    }

    pub fn var_name(&self, v: Var) -> &str {
        &self.vars[v.index()].name
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> (&QuadExpr, Sense) {
        (&self.objective, self.sense)
    }
}

//
// tests
//
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_expr_merges_terms() {
        let mut m = OptimizationModel::new("t");
        let x = m.declare_variable("x", VarKind::Continuous);
        let y = m.declare_variable("y", VarKind::Continuous);
        let e = LinearExpr::sum([x, y, x]).minus(LinearExpr::from(y).scale(2.0));
        assert_eq!(e.terms, vec![(x, 2.0), (y, -1.0)]);
        assert_eq!(e.eval(&[3.0, 4.0]), 2.0);
        assert_eq!(m.var_name(y), "y");
    }

    #[test]
    fn quad_expr_orders_pairs() {
        let mut m = OptimizationModel::new("t");
        let x = m.declare_variable("x", VarKind::Continuous);
        let y = m.declare_variable("y", VarKind::Continuous);
        let q = QuadExpr::from(x).quad_term(y, x, 1.0).quad_term(x, y, 2.0);
        assert_eq!(q.quad, vec![(x, y, 3.0)]);
        assert!(!q.is_linear());
        assert_eq!(q.eval(&[1.0, 2.0]), 7.0);
    }

    #[test]
    fn constraint_satisfaction() {
        let mut m = OptimizationModel::new("t");
        let x = m.declare_variable("x", VarKind::Continuous);
        let row = m.add_constraint(x, Relation::Le, 1.0, Some("c0".to_string()));
        let c = &m.constraints()[row];
        assert!(c.is_satisfied(&[1.0], 0.0));
        assert!(c.is_satisfied(&[1.0 + 1e-9], 1e-6));
        assert!(!c.is_satisfied(&[1.1], 1e-6));
    }
}

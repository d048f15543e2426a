//!
//! Affine cost of an edge
//!
//! The cost function of an edge, once its constants are bound, must reduce to
//! `cost(f) = slope * f + intercept` in the flow parameter `f`.
//! The reduction walks the expression tree, so term order and parentheses do
//! not matter: `m*f+n`, `n+f*m`, `(f/m)+n` all give exact coefficients.
//!
use super::error::{NonAffine, SoError, SoResult};
use super::expr::Expr;
use super::network::{Edge, EdgeCost};
use tracing::debug;

/// `cost(f) = slope * f + intercept`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AffineCost {
    pub slope: f64,
    pub intercept: f64,
}

impl AffineCost {
    pub fn new(slope: f64, intercept: f64) -> AffineCost {
        AffineCost { slope, intercept }
    }
    pub fn constant(intercept: f64) -> AffineCost {
        AffineCost::new(0.0, intercept)
    }
    /// true if the cost does not depend on the flow
    pub fn is_constant(&self) -> bool {
        self.slope == 0.0
    }
    ///
    /// Cost of all `flow` units together, `flow * cost(flow)`
    ///
    pub fn total_cost(&self, flow: f64) -> f64 {
        self.slope * flow * flow + self.intercept * flow
    }
    fn scale(self, k: f64) -> AffineCost {
        AffineCost::new(self.slope * k, self.intercept * k)
    }
    fn divide(self, d: f64) -> AffineCost {
        AffineCost::new(self.slope / d, self.intercept / d)
    }
}

impl std::ops::Add for AffineCost {
    type Output = AffineCost;
    fn add(self, rhs: AffineCost) -> AffineCost {
        AffineCost::new(self.slope + rhs.slope, self.intercept + rhs.intercept)
    }
}

impl std::ops::Sub for AffineCost {
    type Output = AffineCost;
    fn sub(self, rhs: AffineCost) -> AffineCost {
        AffineCost::new(self.slope - rhs.slope, self.intercept - rhs.intercept)
    }
}

impl std::fmt::Display for AffineCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*f+{}", self.slope, self.intercept)
    }
}

impl EdgeCost for AffineCost {
    fn cost(&self, flow: f64) -> SoResult<f64> {
        Ok(self.slope * flow + self.intercept)
    }
}

///
/// Slope and intercept of the cost function of `edge`.
///
/// Fails with `SoError::UnsupportedFunction` if the bound expression is not
/// affine in the flow parameter.
///
pub fn linearize(edge: &Edge) -> SoResult<AffineCost> {
    let expr = edge.bound_expr();
    let unsupported = |reason: NonAffine| SoError::UnsupportedFunction {
        edge: edge.to_string(),
        expr: expr.to_string(),
        reason,
    };
    let cost = affine_in(&expr, edge.param()).map_err(unsupported)?;
    if !cost.slope.is_finite() || !cost.intercept.is_finite() {
        return Err(unsupported(NonAffine::NotFinite));
    }
    debug!("edge {}: {} => slope={} intercept={}", edge, expr, cost.slope, cost.intercept);
    Ok(cost)
}

fn affine_in(expr: &Expr, param: &str) -> Result<AffineCost, NonAffine> {
    match expr {
        Expr::Num(c) => Ok(AffineCost::constant(*c)),
        Expr::Var(v) if v == param => Ok(AffineCost::new(1.0, 0.0)),
        Expr::Var(v) => Err(NonAffine::UnboundConstant(v.clone())),
        Expr::Neg(a) => Ok(affine_in(a, param)?.scale(-1.0)),
        Expr::Add(a, b) => Ok(affine_in(a, param)? + affine_in(b, param)?),
        Expr::Sub(a, b) => Ok(affine_in(a, param)? - affine_in(b, param)?),
        Expr::Mul(a, b) => {
            let (a, b) = (affine_in(a, param)?, affine_in(b, param)?);
            if a.is_constant() {
                Ok(b.scale(a.intercept))
            } else if b.is_constant() {
                Ok(a.scale(b.intercept))
            } else {
                Err(NonAffine::FlowProduct)
            }
        }
        Expr::Div(a, b) => {
            let (a, b) = (affine_in(a, param)?, affine_in(b, param)?);
            if !b.is_constant() {
                Err(NonAffine::FlowDivisor)
            } else if b.intercept == 0.0 {
                Err(NonAffine::DivisionByZero)
            } else {
                Ok(a.divide(b.intercept))
            }
        }
        Expr::Pow(a, b) => {
            let exponent = affine_in(b, param)?;
            if !exponent.is_constant() {
                return Err(NonAffine::FlowExponent);
            }
            let p = exponent.intercept;
            let base = affine_in(a, param)?;
            if base.is_constant() {
                Ok(AffineCost::constant(base.intercept.powf(p)))
            } else if p == 1.0 {
                Ok(base)
            } else if p == 0.0 {
                Ok(AffineCost::constant(1.0))
            } else {
                Err(NonAffine::FlowPower(p))
            }
        }
    }
}

//
// tests
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::so_flow::network::CostFunction;
    use rstest::rstest;
    use std::sync::Arc;

    /// edge A->B with flow parameter `f`
    fn edge(expr: &str, values: &[f64]) -> Edge {
        let function = CostFunction::new("c", "f", Expr::parse(expr).unwrap());
        Edge::new("e", "A", "B", Arc::new(function), values.to_vec())
    }

    #[rstest]
    #[case("m*f+n", &[2.0, 1.0], (2.0, 1.0))]
    #[case("f*m+n", &[2.0, 1.0], (2.0, 1.0))]
    #[case("n+m*f", &[1.0, 2.0], (2.0, 1.0))]
    #[case("(m*f)+(n)", &[2.0, 1.0], (2.0, 1.0))]
    #[case("n+(f*m)", &[1.0, 2.0], (2.0, 1.0))]
    #[case("f/m+n", &[4.0, 1.5], (0.25, 1.5))]
    #[case("n+f/m", &[1.5, 4.0], (0.25, 1.5))]
    #[case("(f/m)+n", &[3.0, 0.0], (1.0 / 3.0, 0.0))]
    #[case("m*f", &[0.5], (0.5, 0.0))]
    #[case("f", &[], (1.0, 0.0))]
    #[case("m*(f+n)", &[2.0, 1.0], (2.0, 2.0))]
    #[case("t*(1+a*f)", &[10.0, 0.25], (2.5, 10.0))]
    #[case("-f*m+n", &[-1.0, 3.0], (1.0, 3.0))]
    #[case("f^1*m+n-n", &[2.0, 7.0], (2.0, 0.0))]
    #[case("m*f+n", &[1e-3, 2.5e2], (0.001, 250.0))]
    fn affine_coefficients(#[case] expr: &str, #[case] values: &[f64], #[case] expected: (f64, f64)) {
        let cost = linearize(&edge(expr, values)).unwrap();
        assert_eq!((cost.slope, cost.intercept), expected);
    }

    #[rstest]
    #[case("c", &[7.5], 7.5)]
    #[case("a+b*c", &[1.0, 2.0, 3.0], 7.0)]
    #[case("f*0+c", &[4.0], 4.0)]
    #[case("c^2", &[3.0], 9.0)]
    fn constant_functions(#[case] expr: &str, #[case] values: &[f64], #[case] value: f64) {
        let cost = linearize(&edge(expr, values)).unwrap();
        assert!(cost.is_constant());
        assert_eq!(cost.intercept, value);
    }

    #[rstest]
    #[case("f*f", &[], NonAffine::FlowProduct)]
    #[case("m*f*f+n", &[1.0, 1.0], NonAffine::FlowProduct)]
    #[case("m/f", &[1.0], NonAffine::FlowDivisor)]
    #[case("t*(1+0.15*(f/c)^4)", &[1.0, 2.0], NonAffine::FlowPower(4.0))]
    #[case("2^f", &[], NonAffine::FlowExponent)]
    #[case("f/m+n", &[0.0, 1.0], NonAffine::DivisionByZero)]
    #[case("f+1/m", &[0.0], NonAffine::NotFinite)]
    fn non_affine_functions(#[case] expr: &str, #[case] values: &[f64], #[case] reason: NonAffine) {
        match linearize(&edge(expr, values)) {
            Err(SoError::UnsupportedFunction { edge, reason: r, .. }) => {
                assert_eq!(edge, "A-B");
                assert_eq!(r, reason);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn affine_cost_matches_edge_cost() {
        let e = edge("m*f+n", &[2.0, 1.0]);
        let a = linearize(&e).unwrap();
        for flow in [0.0, 1.0, 2.5, 10.0] {
            assert_eq!(a.cost(flow).unwrap(), e.cost(flow).unwrap());
        }
        assert_eq!(a.total_cost(10.0), 210.0);
    }
}

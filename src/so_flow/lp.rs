//!
//! CPLEX LP export of an `OptimizationModel`
//!
//! ```text
//! \ Model: braess
//! Minimize
//!  obj: +1 phi_sa +1 phi_at
//! Subject To
//!  cost_sa: -1 phi_sa + [ +20 l_sa ^2 ] <= 0
//!  ...
//! Bounds
//!  phi_sa free
//! End
//! ```
//! Quadratic parts are written in brackets; the objective's bracket is halved
//! by the format, so its coefficients are doubled. Every variable is declared
//! `free` since the domain rows already bound them.
//!
use super::model::{LinearExpr, OptimizationModel, QuadExpr, Sense};
use itertools::Itertools;

pub fn to_lp_string(model: &OptimizationModel) -> String {
    let mut out = String::new();
    out.push_str(&format!("\\ Model: {}\n", model.name()));

    let (objective, sense) = model.objective();
    match sense {
        Sense::Minimize => out.push_str("Minimize\n obj: "),
        Sense::Maximize => out.push_str("Maximize\n obj: "),
    }
    out.push_str(&fmt_quad(model, objective, true));
    out.push('\n');

    out.push_str("Subject To\n");
    for (row, c) in model.constraints().iter().enumerate() {
        let label = c.label.clone().unwrap_or_else(|| format!("c{}", row));
        out.push_str(&format!(
            " {}: {} {} {}\n",
            label,
            fmt_quad(model, &c.expr, false),
            c.relation,
            fmt_num(c.rhs - c.expr.linear.constant)
        ));
    }

    out.push_str("Bounds\n");
    for v in model.vars() {
        out.push_str(&format!(" {} free\n", v.name));
    }
    out.push_str("End\n");
    out
}

fn fmt_num(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn fmt_coef(c: f64) -> String {
    if c < 0.0 {
        format!("-{}", fmt_num(-c))
    } else {
        format!("+{}", fmt_num(c))
    }
}

/// linear terms without the constant
fn fmt_lin(model: &OptimizationModel, e: &LinearExpr) -> String {
    if e.terms.is_empty() {
        return "0".to_string();
    }
    e.terms
        .iter()
        .map(|&(v, c)| format!("{} {}", fmt_coef(c), model.var_name(v)))
        .join(" ")
}

fn fmt_quad(model: &OptimizationModel, e: &QuadExpr, objective: bool) -> String {
    let lin = fmt_lin(model, &e.linear);
    let scale = if objective { 2.0 } else { 1.0 };
    let quad = e
        .quad
        .iter()
        .filter(|(_, _, c)| *c != 0.0)
        .map(|&(v, w, c)| {
            if v == w {
                format!("{} {} ^2", fmt_coef(scale * c), model.var_name(v))
            } else {
                format!(
                    "{} {} * {}",
                    fmt_coef(scale * c),
                    model.var_name(v),
                    model.var_name(w)
                )
            }
        })
        .join(" ");
    if quad.is_empty() {
        lin
    } else if objective {
        format!("{} + [ {} ] / 2", lin, quad)
    } else {
        format!("{} + [ {} ]", lin, quad)
    }
}

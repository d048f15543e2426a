//!
//! Algebraic expressions used as cost functions
//!
//! `Expr::parse("t0*(1+0.15*(f/c)^4)")` builds an expression tree that can be
//! inspected (`variables`), partially bound (`substitute`, `bind`),
//! folded (`simplify`) and evaluated (`eval`).
//!
//! Grammar, from lowest to highest precedence:
//! ```text
//! sum     = product (('+' | '-') product)*
//! product = unary (('*' | '/') unary)*
//! unary   = ('-' | '+') unary | power
//! power   = atom ('^' unary)?
//! atom    = number | identifier | '(' sum ')'
//! ```
//!
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character `{ch}` at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("unexpected `{token}` at position {pos}")]
    UnexpectedToken { pos: usize, token: String },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("variable `{0}` has no value")]
    UnboundVariable(String),
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn parse(text: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(text)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.sum()?;
        match parser.tokens.get(parser.pos) {
            None => Ok(expr),
            Some((pos, token)) => Err(ExprError::UnexpectedToken {
                pos: *pos,
                token: token.to_string(),
            }),
        }
    }

    ///
    /// Free variables, in the order they are first seen from left to right.
    ///
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            Expr::Neg(a) => a.collect_variables(names),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => {
                a.collect_variables(names);
                b.collect_variables(names);
            }
        }
    }

    /// true if the variable `name` occurs in the expression
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Var(v) => v == name,
            Expr::Neg(a) => a.contains(name),
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Div(a, b)
            | Expr::Pow(a, b) => a.contains(name) || b.contains(name),
        }
    }

    /// Replace every occurrence of the variable `name` with `value`.
    pub fn substitute(&self, name: &str, value: f64) -> Expr {
        self.map_vars(&|v: &str| if v == name { Some(value) } else { None })
    }

    /// Replace all variables listed in `values` at once.
    pub fn bind(&self, values: &[(&str, f64)]) -> Expr {
        self.map_vars(&|v: &str| {
            values
                .iter()
                .find(|(name, _)| *name == v)
                .map(|(_, value)| *value)
        })
    }

    fn map_vars<L: Fn(&str) -> Option<f64>>(&self, lookup: &L) -> Expr {
        let map2 = |a: &Expr, b: &Expr| (Box::new(a.map_vars(lookup)), Box::new(b.map_vars(lookup)));
        match self {
            Expr::Num(x) => Expr::Num(*x),
            Expr::Var(v) => match lookup(v) {
                Some(x) => Expr::Num(x),
                None => Expr::Var(v.clone()),
            },
            Expr::Neg(a) => Expr::Neg(Box::new(a.map_vars(lookup))),
            Expr::Add(a, b) => {
                let (a, b) = map2(a, b);
                Expr::Add(a, b)
            }
            Expr::Sub(a, b) => {
                let (a, b) = map2(a, b);
                Expr::Sub(a, b)
            }
            Expr::Mul(a, b) => {
                let (a, b) = map2(a, b);
                Expr::Mul(a, b)
            }
            Expr::Div(a, b) => {
                let (a, b) = map2(a, b);
                Expr::Div(a, b)
            }
            Expr::Pow(a, b) => {
                let (a, b) = map2(a, b);
                Expr::Pow(a, b)
            }
        }
    }

    ///
    /// Evaluate with the variable values given by `lookup`.
    ///
    pub fn eval<L: Fn(&str) -> Option<f64>>(&self, lookup: &L) -> Result<f64, ExprError> {
        Ok(match self {
            Expr::Num(x) => *x,
            Expr::Var(v) => lookup(v).ok_or_else(|| ExprError::UnboundVariable(v.clone()))?,
            Expr::Neg(a) => -a.eval(lookup)?,
            Expr::Add(a, b) => a.eval(lookup)? + b.eval(lookup)?,
            Expr::Sub(a, b) => a.eval(lookup)? - b.eval(lookup)?,
            Expr::Mul(a, b) => a.eval(lookup)? * b.eval(lookup)?,
            Expr::Div(a, b) => a.eval(lookup)? / b.eval(lookup)?,
            Expr::Pow(a, b) => a.eval(lookup)?.powf(b.eval(lookup)?),
        })
    }

    /// Evaluate an expression without free variables.
    pub fn value(&self) -> Result<f64, ExprError> {
        self.eval(&|_: &str| None)
    }

    ///
    /// Fold every variable-free sub-expression into a number.
    ///
    pub fn simplify(&self) -> Expr {
        let folded = match self {
            Expr::Num(_) | Expr::Var(_) => return self.clone(),
            Expr::Neg(a) => Expr::Neg(Box::new(a.simplify())),
            Expr::Add(a, b) => Expr::Add(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Sub(a, b) => Expr::Sub(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Mul(a, b) => Expr::Mul(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Div(a, b) => Expr::Div(Box::new(a.simplify()), Box::new(b.simplify())),
            Expr::Pow(a, b) => Expr::Pow(Box::new(a.simplify()), Box::new(b.simplify())),
        };
        match folded.value() {
            Ok(x) => Expr::Num(x),
            Err(_) => folded,
        }
    }

    /// binding strength used when rendering
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) | Expr::Sub(..) => 1,
            Expr::Mul(..) | Expr::Div(..) => 2,
            Expr::Neg(..) => 3,
            Expr::Num(x) if x.is_sign_negative() => 1,
            Expr::Pow(..) => 4,
            Expr::Num(_) | Expr::Var(_) => 5,
        }
    }
}

/// Write `e`, wrapped in parentheses if it binds weaker than `min`.
fn write_operand(f: &mut std::fmt::Formatter<'_>, e: &Expr, min: u8) -> std::fmt::Result {
    if e.precedence() < min {
        write!(f, "({})", e)
    } else {
        write!(f, "{}", e)
    }
}

fn write_binary(
    f: &mut std::fmt::Formatter<'_>,
    a: &Expr,
    op: char,
    b: &Expr,
    (min_a, min_b): (u8, u8),
) -> std::fmt::Result {
    write_operand(f, a, min_a)?;
    write!(f, "{}", op)?;
    write_operand(f, b, min_b)
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Num(x) => write!(f, "{}", x),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Neg(a) => {
                write!(f, "-")?;
                write_operand(f, a, 3)
            }
            Expr::Add(a, b) => write_binary(f, a, '+', b, (1, 1)),
            Expr::Sub(a, b) => write_binary(f, a, '-', b, (1, 2)),
            Expr::Mul(a, b) => write_binary(f, a, '*', b, (2, 3)),
            Expr::Div(a, b) => write_binary(f, a, '/', b, (2, 3)),
            Expr::Pow(a, b) => write_binary(f, a, '^', b, (5, 3)),
        }
    }
}

//
// tokenizer
//

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(x) => write!(f, "{}", x),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Op(c) => write!(f, "{}", c),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit())) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // exponent part, only if digits follow
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                    i = j;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let x = literal
                .parse::<f64>()
                .map_err(|_| ExprError::InvalidNumber(literal.clone()))?;
            tokens.push((start, Token::Num(x)));
        } else if c.is_ascii_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
        } else {
            let token = match c {
                '+' | '-' | '*' | '/' | '^' => Token::Op(c),
                '(' => Token::Open,
                ')' => Token::Close,
                _ => return Err(ExprError::UnexpectedChar { pos: i, ch: c }),
            };
            tokens.push((start, token));
            i += 1;
        }
    }
    Ok(tokens)
}

//
// recursive descent parser
//

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some((_, Token::Op(c))) => Some(*c),
            _ => None,
        }
    }

    fn next(&mut self) -> Result<(usize, Token), ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = Box::new(self.product()?);
            lhs = match op {
                '+' => Expr::Add(Box::new(lhs), rhs),
                _ => Expr::Sub(Box::new(lhs), rhs),
            };
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        while let Some(op @ ('*' | '/')) = self.peek_op() {
            self.pos += 1;
            let rhs = Box::new(self.unary()?);
            lhs = match op {
                '*' => Expr::Mul(Box::new(lhs), rhs),
                _ => Expr::Div(Box::new(lhs), rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek_op() {
            Some('-') => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some('+') => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if self.peek_op() == Some('^') {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.next()? {
            (_, Token::Num(x)) => Ok(Expr::Num(x)),
            (_, Token::Ident(name)) => Ok(Expr::Var(name)),
            (_, Token::Open) => {
                let inner = self.sum()?;
                match self.next()? {
                    (_, Token::Close) => Ok(inner),
                    (pos, token) => Err(ExprError::UnexpectedToken {
                        pos,
                        token: token.to_string(),
                    }),
                }
            }
            (pos, token) => Err(ExprError::UnexpectedToken {
                pos,
                token: token.to_string(),
            }),
        }
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parse_precedence() {
        let e = Expr::parse("1+2*3^2").unwrap();
        assert_eq!(e.value().unwrap(), 19.0);
        let e = Expr::parse("(1+2)*3").unwrap();
        assert_eq!(e.value().unwrap(), 9.0);
        let e = Expr::parse("2^3^2").unwrap();
        assert_eq!(e.value().unwrap(), 512.0);
        let e = Expr::parse("-2^2").unwrap();
        assert_eq!(e.value().unwrap(), -4.0);
        let e = Expr::parse("8/4/2").unwrap();
        assert_eq!(e.value().unwrap(), 1.0);
        let e = Expr::parse("10-4-3").unwrap();
        assert_eq!(e.value().unwrap(), 3.0);
    }

    #[test]
    fn variables_in_order_of_appearance() {
        let e = Expr::parse("t0*(1+a*(f/c)^b)+t0").unwrap();
        assert_eq!(e.variables(), vec!["t0", "a", "f", "c", "b"]);
        assert!(e.contains("f"));
        assert!(!e.contains("g"));
    }

    #[test]
    fn scientific_notation() {
        assert_eq!(Expr::parse("1e-3").unwrap(), Expr::Num(0.001));
        assert_eq!(Expr::parse("2.5E4*f").unwrap().variables(), vec!["f"]);
        // `e` without digits is a name
        let e = Expr::parse("2*e").unwrap();
        assert_eq!(e.variables(), vec!["e"]);
    }

    #[test]
    fn substitute_and_eval() {
        let e = Expr::parse("a*f+b").unwrap();
        let bound = e.bind(&[("a", 2.0), ("b", 1.0)]);
        assert_eq!(bound.variables(), vec!["f"]);
        assert_eq!(bound.substitute("f", 10.0).value().unwrap(), 21.0);
        assert_eq!(
            bound.value(),
            Err(ExprError::UnboundVariable("f".to_string()))
        );
        let v = e
            .eval(&|name: &str| match name {
                "a" => Some(3.0),
                "b" => Some(4.0),
                "f" => Some(2.0),
                _ => None,
            })
            .unwrap();
        assert_eq!(v, 10.0);
    }

    #[test]
    fn simplify_folds_constants() {
        let e = Expr::parse("(2*3)*f+(10/4)").unwrap().simplify();
        assert_eq!(e.to_string(), "6*f+2.5");
        let e = Expr::parse("1+2").unwrap().simplify();
        assert_eq!(e, Expr::Num(3.0));
    }

    #[rstest]
    #[case("a+b*c", "a+b*c")]
    #[case("(a+b)*c", "(a+b)*c")]
    #[case("a-(b-c)", "a-(b-c)")]
    #[case("a/(b*c)", "a/(b*c)")]
    #[case("(-a)^2", "(-a)^2")]
    #[case("a^(b+1)", "a^(b+1)")]
    #[case("( f / 4 ) + 2", "f/4+2")]
    fn display_minimal_parentheses(#[case] input: &str, #[case] rendered: &str) {
        let e = Expr::parse(input).unwrap();
        assert_eq!(e.to_string(), rendered);
        assert_eq!(Expr::parse(rendered).unwrap(), e);
    }

    #[test]
    fn negative_numbers_are_wrapped() {
        let e = Expr::parse("f*a").unwrap().substitute("a", -2.0);
        assert_eq!(e.to_string(), "f*(-2)");
    }

    #[rstest]
    #[case("", ExprError::Empty)]
    #[case("2*", ExprError::UnexpectedEnd)]
    #[case("(1+2", ExprError::UnexpectedEnd)]
    #[case("1+2)", ExprError::UnexpectedToken { pos: 3, token: ")".to_string() })]
    #[case("f $ 2", ExprError::UnexpectedChar { pos: 2, ch: '$' })]
    #[case("1.2.3", ExprError::InvalidNumber("1.2.3".to_string()))]
    fn parse_errors(#[case] input: &str, #[case] err: ExprError) {
        assert_eq!(Expr::parse(input), Err(err));
    }
}

//!
//! Error types of the system-optimum pipeline
//!
//! * `SoError::Format` a malformed network file line
//! * `SoError::UnsupportedFunction` a cost function that is not affine in the flow
//! * `SoError::NoSolution` the solver finished without an optimal point
//!
use super::expr::ExprError;
use thiserror::Error;

/// Result type of the crate
pub type SoResult<T> = Result<T, SoError>;

#[derive(Error, Debug)]
pub enum SoError {
    /// Malformed network description. Parsing stops at the first one.
    #[error("network file does not comply with the format (line {line}: \"{content}\"): {reason}")]
    Format {
        line: usize,
        content: String,
        reason: FormatReason,
    },

    /// The cost function of an edge cannot be written as `slope * flow + intercept`.
    #[error("cost function of edge {edge} is not supported (`{expr}`): {reason}")]
    UnsupportedFunction {
        edge: String,
        expr: String,
        reason: NonAffine,
    },

    /// The solver returned without an optimal solution (infeasible, unbounded, stalled).
    #[error("no solution for model `{model}` (solver status: {status})")]
    NoSolution { model: String, status: String },

    /// The backend could not be set up for the given model.
    #[error("solver error: {0}")]
    Solver(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("expression error: {0}")]
    Expr(#[from] ExprError),
}

impl SoError {
    /// true if this is the "solver found no solution" outcome
    pub fn is_no_solution(&self) -> bool {
        matches!(self, SoError::NoSolution { .. })
    }
}

/// Why a line of the network file was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatReason {
    #[error("unknown keyword `{0}`")]
    UnknownKeyword(String),
    #[error("expected at least {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },
    #[error("cost functions with more than one parameter are not acceptable (parameters defined: {0})")]
    MultipleParameters(String),
    #[error("cost function has no parameter")]
    NoParameter,
    #[error("parameter list `{0}` must be written as `(name)`")]
    MalformedParameters(String),
    #[error("invalid expression: {0}")]
    Expression(ExprError),
    #[error("unknown cost function `{0}`")]
    UnknownFunction(String),
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    #[error("node `{0}` is already declared")]
    DuplicateNode(String),
    #[error("cost function `{0}` is already declared")]
    DuplicateFunction(String),
    #[error("function `{function}` has {expected} constants but {found} values are given")]
    ConstantCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
    #[error("demand must be non-negative (got {0})")]
    NegativeDemand(f64),
}

/// Why a substituted cost function is not affine in the flow parameter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NonAffine {
    #[error("product of two flow-dependent terms")]
    FlowProduct,
    #[error("division by a flow-dependent term")]
    FlowDivisor,
    #[error("flow-dependent term raised to the power {0}")]
    FlowPower(f64),
    #[error("flow-dependent exponent")]
    FlowExponent,
    #[error("division by zero")]
    DivisionByZero,
    #[error("constant `{0}` has no value")]
    UnboundConstant(String),
    #[error("coefficient is not a finite number")]
    NotFinite,
    #[error("decreasing cost (slope {0}) makes the total cost non-convex")]
    Decreasing(f64),
}

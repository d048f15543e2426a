//!
//! Network file parser
//!
//! Line oriented, whitespace separated, `#` starts a comment:
//! ```text
//! function <name> (<param>) <expression>
//! node <name>
//! dedge <name> <start> <end> <function> <constant values...>
//! edge <name> <start> <end> <function> <constant values...>
//! od <name> <origin> <destination> <demand>
//! ```
//! `edge` declares both directions, `dedge` only `start -> end`.
//! Constant values are bound in the order the constants first appear in the
//! function's expression.
//!
use super::error::{FormatReason, SoError, SoResult};
use super::expr::Expr;
use super::network::{CostFunction, Edge, Network, OdPair};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

///
/// Parse a network description. Stops at the first malformed line.
///
pub fn parse_network(text: &str) -> SoResult<Network> {
    let mut parser = NetworkParser::default();
    for (i, raw) in text.lines().enumerate() {
        let line = strip_comment(raw);
        parser.parse_line(line).map_err(|reason| SoError::Format {
            line: i + 1,
            content: line.trim().to_string(),
            reason,
        })?;
    }
    let network = parser.network;
    debug!(
        "parsed network: {} nodes, {} edges, {} od pairs",
        network.node_count(),
        network.edge_count(),
        network.od_pairs().len()
    );
    Ok(network)
}

/// Read and parse a network file
pub fn read_network<P: AsRef<Path>>(path: P) -> SoResult<Network> {
    let text = std::fs::read_to_string(path)?;
    parse_network(&text)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
}

#[derive(Default)]
struct NetworkParser {
    network: Network,
    functions: HashMap<String, Arc<CostFunction>>,
}

impl NetworkParser {
    fn parse_line(&mut self, line: &str) -> Result<(), FormatReason> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.first() {
            None => Ok(()),
            Some(&"function") => self.function(&tokens),
            Some(&"node") => {
                require_fields(&tokens, 2)?;
                self.network.add_node(tokens[1])?;
                Ok(())
            }
            Some(&"dedge") => self.edge(&tokens, false),
            Some(&"edge") => self.edge(&tokens, true),
            Some(&"od") => self.od(&tokens),
            Some(keyword) => Err(FormatReason::UnknownKeyword(keyword.to_string())),
        }
    }

    /// `function <name> (<param>) <expression>`
    fn function(&mut self, tokens: &[&str]) -> Result<(), FormatReason> {
        require_fields(tokens, 4)?;
        let name = tokens[1];
        if self.functions.contains_key(name) {
            return Err(FormatReason::DuplicateFunction(name.to_string()));
        }

        // the parameter list may contain blanks, e.g. `(f, g)`
        let rest = tokens[2..].join(" ");
        let close = match (rest.starts_with('('), rest.find(')')) {
            (true, Some(close)) => close,
            _ => return Err(FormatReason::MalformedParameters(tokens[2].to_string())),
        };
        let params: Vec<&str> = rest[1..close].split(',').map(str::trim).collect();
        if params.len() > 1 {
            return Err(FormatReason::MultipleParameters(params.join(", ")));
        }
        let param = params[0];
        if param.is_empty() {
            return Err(FormatReason::NoParameter);
        }

        let expr = Expr::parse(&rest[close + 1..]).map_err(FormatReason::Expression)?;
        let function = CostFunction::new(name, param, expr);
        debug!(
            "function {} ({}) {} constants={:?}",
            function.name, function.param, function.expr, function.constants
        );
        self.functions.insert(name.to_string(), Arc::new(function));
        Ok(())
    }

    /// `dedge|edge <name> <start> <end> <function> <values...>`
    fn edge(&mut self, tokens: &[&str], undirected: bool) -> Result<(), FormatReason> {
        require_fields(tokens, 5)?;
        let (name, start, end) = (tokens[1], tokens[2], tokens[3]);
        let function = self
            .functions
            .get(tokens[4])
            .cloned()
            .ok_or_else(|| FormatReason::UnknownFunction(tokens[4].to_string()))?;

        let values = tokens[5..]
            .iter()
            .map(|t| parse_number(t))
            .collect::<Result<Vec<f64>, FormatReason>>()?;
        if values.len() != function.constants.len() {
            return Err(FormatReason::ConstantCount {
                function: function.name.clone(),
                expected: function.constants.len(),
                found: values.len(),
            });
        }

        self.network.add_edge(Edge::new(
            name,
            start,
            end,
            function.clone(),
            values.clone(),
        ))?;
        if undirected {
            self.network
                .add_edge(Edge::new(name, end, start, function, values))?;
        }
        Ok(())
    }

    /// `od <name> <origin> <destination> <demand>`
    fn od(&mut self, tokens: &[&str]) -> Result<(), FormatReason> {
        require_fields(tokens, 5)?;
        let (name, origin, destination) = (tokens[1], tokens[2], tokens[3]);
        if origin == destination {
            warn!("od pair {} dropped: origin and destination are {}", name, origin);
            return Ok(());
        }
        let demand = parse_number(tokens[4])?;
        self.network
            .set_demand(OdPair::new(name, origin, destination, demand))
    }
}

fn require_fields(tokens: &[&str], expected: usize) -> Result<(), FormatReason> {
    if tokens.len() < expected {
        Err(FormatReason::MissingFields {
            expected,
            found: tokens.len(),
        })
    } else {
        Ok(())
    }
}

fn parse_number(token: &str) -> Result<f64, FormatReason> {
    token
        .parse::<f64>()
        .map_err(|_| FormatReason::InvalidNumber(token.to_string()))
}

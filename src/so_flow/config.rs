//!
//! TOML configuration
//!
//! ```toml
//! [solver]
//! verbose = false
//! max_iter = 200
//! tol_gap_abs = 1e-12
//! tol_gap_rel = 1e-12
//! tol_feas = 1e-12
//! time_limit = 60.0
//!
//! [network]
//! initial_flow = 0.0
//! ```
//! Every key is optional.
//!
use super::error::SoResult;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub solver: SolverSettings,
    pub network: NetworkSettings,
}

impl Config {
    pub fn from_toml_str(text: &str) -> SoResult<Config> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SoResult<Config> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml_str(&text)
    }
}

/// Settings of the interior point solver
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSettings {
    /// print the solver's iteration log
    pub verbose: bool,
    pub max_iter: u32,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    pub tol_feas: f64,
    /// seconds; unlimited if absent
    pub time_limit: Option<f64>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            verbose: false,
            max_iter: 200,
            tol_gap_abs: 1e-12,
            tol_gap_rel: 1e-12,
            tol_feas: 1e-12,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    /// flow at which the edge costs are reported before solving
    pub initial_flow: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::so_flow::error::SoError;
    use std::io::Write;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_config() {
        let c = Config::from_toml_str("[solver]\nmax_iter = 50\ntime_limit = 2.5\n").unwrap();
        assert_eq!(c.solver.max_iter, 50);
        assert_eq!(c.solver.time_limit, Some(2.5));
        assert_eq!(c.solver.tol_feas, 1e-12);
        assert_eq!(c.network.initial_flow, 0.0);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let r = Config::from_toml_str("[solver]\nmaxiter = 50\n");
        assert!(matches!(r, Err(SoError::Config(_))));
    }

    #[test]
    fn from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\ninitial_flow = 3.0").unwrap();
        let c = Config::from_file(file.path()).unwrap();
        assert_eq!(c.network.initial_flow, 3.0);
    }
}

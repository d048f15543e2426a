pub mod affine;
pub mod backend;
pub mod builder;
pub mod config;
pub mod error;
pub mod expr;
pub mod flow;
pub mod lp;
#[cfg(test)]
pub mod mocks;
pub mod model;
pub mod network;
pub mod parser;
pub mod utils;

pub use backend::{ClarabelBackend, SolverBackend};
pub use builder::SoModel;
pub use config::Config;
pub use error::{SoError, SoResult};
pub use flow::{Assignment, SystemOptimum};
pub use network::Network;
pub use parser::{parse_network, read_network};

//
// public functions
//

///
/// Find the system optimum of the network with the default solver
///
pub fn system_optimum(network: &Network) -> SoResult<SystemOptimum> {
    system_optimum_with(network, &ClarabelBackend::default())
}

///
/// Find the system optimum of the network with `backend`
///
/// Fails with `SoError::UnsupportedFunction` if an edge cost is not affine,
/// and with `SoError::NoSolution` if the solver finds no optimum (e.g. an
/// od pair without any path).
///
pub fn system_optimum_with<B: SolverBackend + ?Sized>(
    network: &Network,
    backend: &B,
) -> SoResult<SystemOptimum> {
    let so = SoModel::build(network, "system_optimum")?;
    so.solve(backend)
}

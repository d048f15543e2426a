use anyhow::{Context, Result};
use clap::Parser;
use soflow::so_flow::lp::to_lp_string;
use soflow::so_flow::network::EdgeCost;
use soflow::so_flow::utils::draw;
use soflow::so_flow::{read_network, ClarabelBackend, Config, SoModel, SystemOptimum};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// System Optimal traffic assignment of a road network
#[derive(Parser, Debug)]
#[command(name = "soflow", version, about)]
struct Cli {
    /// network file
    #[arg(short = 'f', long = "file")]
    file: PathBuf,
    /// write the model as `<file stem>.lp`
    #[arg(long)]
    lp: bool,
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// debug log and per-edge solution
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let network = read_network(&cli.file)
        .with_context(|| format!("failed to read network {}", cli.file.display()))?;
    info!(
        "network: {} nodes, {} edges, {} od pairs, total demand {}",
        network.node_count(),
        network.edge_count(),
        network.od_pairs().len(),
        network.total_demand()
    );
    debug!("{}", draw(&network));
    let flow = config.network.initial_flow;
    for edge in network.edges() {
        debug!("edge {} ({}): cost({}) = {}", edge, edge.name, flow, edge.cost(flow)?);
    }

    let stem = file_stem(&cli.file);
    let so = SoModel::build(&network, &stem)?;
    if cli.lp {
        let path = format!("{}.lp", stem);
        std::fs::write(&path, to_lp_string(so.model()))
            .with_context(|| format!("failed to write {}", path))?;
        info!("model written to {}", path);
    }

    let backend = ClarabelBackend::new(config.solver.clone());
    let optimum = match so.solve(&backend) {
        Ok(optimum) => optimum,
        Err(e) if e.is_no_solution() => {
            error!("Error calculating System Optimum!");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if cli.verbose {
        print_assignment(&so, &optimum);
    }
    match optimum.average_cost() {
        Some(v) => println!("System Optimum = {}", v),
        None => println!("System Optimum is undefined: total demand is 0"),
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_string())
}

fn print_assignment(so: &SoModel, optimum: &SystemOptimum) {
    let network = so.network();
    println!("objective = {}", optimum.objective);
    for e in network.graph().edge_indices() {
        if let Some(ef) = optimum.assignment.get(e) {
            println!("{} {} {}", so.stem(e), so.cost(e), ef);
            for (od, x) in network.od_pairs().iter().zip(ef.per_od.iter()) {
                println!("  {} {}", od.key(), x);
            }
        }
    }
}

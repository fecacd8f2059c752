use std::path::PathBuf;

use clap::Parser;

use dice_pipeline::config::{load_or_default, validate_config, ConfigError};
use dice_pipeline::observability::logging;
use dice_pipeline::simulator::TrafficSimulator;

#[derive(Parser)]
#[command(name = "traffic-gen")]
#[command(about = "Synthetic dice roll traffic against the gateway", long_about = None)]
struct Cli {
    /// TOML config file; the [simulator] section is used.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    gateway_url: Option<String>,

    /// Concurrent simulated users
    #[arg(short, long)]
    users: Option<usize>,

    /// Upper bound of requests per user
    #[arg(short, long)]
    max_requests: Option<usize>,

    /// Probability that a request is a batch roll
    #[arg(short, long)]
    batch_probability: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    let sim = &mut config.simulator;
    if let Some(url) = cli.gateway_url {
        sim.gateway_url = url;
    }
    if let Some(users) = cli.users {
        sim.users = users;
    }
    if let Some(max) = cli.max_requests {
        sim.max_requests_per_user = max;
    }
    if let Some(p) = cli.batch_probability {
        sim.batch_probability = p;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;

    let simulator = TrafficSimulator::new(config.simulator.clone())?;
    let report = simulator.run().await?;
    println!("{}", report);
    Ok(())
}

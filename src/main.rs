use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use primordial_garden::{Engine, SimulationConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in headless mode (HTTP API server)
    #[cfg(feature = "server")]
    #[arg(long)]
    headless: bool,

    /// Port for headless API server
    #[cfg(feature = "server")]
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Generations per second advanced by the headless server
    #[cfg(feature = "server")]
    #[arg(long, default_value_t = 10.0)]
    rate: f32,

    /// Configuration file path (YAML or JSON). If not specified, searches for config.yaml, config.yml, or config.json in current directory.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the seed from the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Generations to run in batch mode
    #[arg(short, long, default_value_t = 500)]
    generations: u64,

    /// Log a stats line every N generations in batch mode
    #[arg(long, default_value_t = 50)]
    report_every: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    info!(
        width = config.width,
        height = config.height,
        seed = config.seed,
        species = config.species.len(),
        "building world"
    );
    let engine = Engine::new(config)?;
    run(engine, &args).await
}

#[cfg(feature = "server")]
async fn run(engine: Engine, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.headless {
        headless_main(engine, args.port, args.rate).await
    } else {
        batch_main(engine, args.generations, args.report_every);
        Ok(())
    }
}

#[cfg(not(feature = "server"))]
async fn run(engine: Engine, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    // Batch mode only
    batch_main(engine, args.generations, args.report_every);
    Ok(())
}

/// Load configuration from file or use default
fn load_config(config_path: Option<&str>) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        // User specified a config file
        SimulationConfig::from_file(path)
            .map_err(|e| format!("Failed to load config from {}: {}", path, e).into())
    } else {
        // Try default paths
        Ok(SimulationConfig::from_default_paths())
    }
}

/// Batch mode - run a fixed number of generations and log progress
fn batch_main(mut engine: Engine, generations: u64, report_every: u64) {
    let report_every = report_every.max(1);
    info!("{}", engine.last_stats().summary());

    for _ in 0..generations {
        let stats = engine.step();
        if stats.generation % report_every == 0 {
            info!("{}", stats.summary());
        }
        if stats.population == 0 {
            warn!(generation = stats.generation, "all life has died out");
            break;
        }
    }

    let mut table = engine.species_table();
    table.sort_by(|a, b| b.population.cmp(&a.population));
    for record in table.iter().take(10) {
        info!(
            id = %record.id,
            name = %record.name,
            population = record.population,
            born = record.born_generation,
            complexity = record.complexity,
            source = ?record.energy_source,
            "surviving species"
        );
    }
    let registry = engine.registry();
    let total = registry.total_registered();
    let extinct = total - registry.living_count();
    info!(total, extinct, ancestors = registry.ancestor_count(), "species over the run");
}

/// Headless mode - runs HTTP API server
#[cfg(feature = "server")]
async fn headless_main(
    engine: Engine,
    port: u16,
    rate: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    use primordial_garden::api::{run_server, ApiState};

    let api_state = ApiState::new(engine, rate);
    run_server(api_state, port).await?;

    Ok(())
}

//! Genesis Sim - Entry Point
//!
//! Loads configuration and any saved state, seeds the origin consolidation,
//! then either runs a single cycle and prints its summary or drives cycles
//! periodically until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use genesis_sim::core::config::EngineConfig;
use genesis_sim::core::error::Result;
use genesis_sim::simulation::{CycleScheduler, CycleSummary, Engine};
use genesis_sim::store::{snapshot, MemoryStore};

/// Genesis Sim - entity, bond and cell lifecycle engine
#[derive(Parser, Debug)]
#[command(name = "genesis-sim")]
#[command(about = "Run the entity lifecycle simulation")]
struct Args {
    /// TOML configuration file; defaults apply to anything it omits
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON state file, loaded on start and written on shutdown
    #[arg(long)]
    state: Option<PathBuf>,

    /// Random seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Override the cycle period (seconds)
    #[arg(long)]
    period_secs: Option<u64>,

    /// Run one cycle, print its summary as JSON and exit
    #[arg(long)]
    once: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "genesis_sim=info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::new(),
    };
    if let Some(seed) = args.seed {
        config.genesis.seed = Some(seed);
    }
    if let Some(period) = args.period_secs {
        config.cycle.period_secs = period;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    tracing::info!("Genesis Sim starting...");

    let config = load_config(&args)?;

    let store = match args.state.as_deref().map(snapshot::load).transpose()?.flatten() {
        Some(dump) => {
            tracing::info!(
                entities = dump.entities.len(),
                cells = dump.cells.len(),
                "Restored saved state"
            );
            Arc::new(MemoryStore::from_dump(dump))
        }
        None => Arc::new(MemoryStore::new()),
    };

    let entities = config.genesis.entities;
    let engine = Arc::new(Engine::new(store.clone(), config));
    engine.seed_origin(entities).await?;
    // Restored bonds, cooldowns and dense consolidations need their timers back
    engine.resume_pending().await?;

    let scheduler = Arc::new(CycleScheduler::new(Arc::clone(&engine)));

    if args.once {
        let outcome = scheduler.run_cycle().await;
        if let Some(report) = outcome.report() {
            println!("{}", serde_json::to_string_pretty(&CycleSummary::from(report))?);
        }
    } else {
        let handle = scheduler.start();
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested");
        handle.stop().await;
    }

    if let Some(path) = &args.state {
        snapshot::save(path, &store.dump().await)?;
        tracing::info!(path = %path.display(), "Saved state");
    }

    Ok(())
}

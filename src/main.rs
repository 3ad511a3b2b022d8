use std::{path::PathBuf, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bug_explorer::{
    Environment, ExplorerConfig, Learner,
    bugs::BugCatalog,
    runner::{Trainer, write_metrics},
    world::BugWorld,
};

/// Train an exploration agent to uncover scripted bugs.
#[derive(Parser, Debug)]
#[command(name = "bug-explorer")]
struct Cli {
    /// JSON run configuration; every field is optional.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON bug definitions, `{"bugs": [{"id": ..., "message": ...}]}`.
    #[arg(long)]
    bugs: Option<PathBuf>,

    #[arg(long)]
    episodes: Option<usize>,

    /// Step limit per episode.
    #[arg(long)]
    max_steps: Option<usize>,

    /// Where to write per-episode metrics as CSV.
    #[arg(long)]
    metrics: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// Let the agent toggle every command independently each step.
    #[arg(long)]
    multi_binary: bool,

    /// Fallback log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => ExplorerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExplorerConfig::default(),
    };
    if let Some(episodes) = cli.episodes {
        config.episodes = episodes;
    }
    if let Some(max_steps) = cli.max_steps {
        config.max_steps = max_steps;
    }
    if cli.metrics.is_some() {
        config.metrics_path = cli.metrics.clone();
    }
    if cli.seed.is_some() {
        config.learner.seed = cli.seed;
    }
    if cli.multi_binary {
        config.world.multi_binary = true;
    }

    let mut world = BugWorld::new(config.world.clone())?;
    if let Some(path) = &cli.bugs {
        let catalog = BugCatalog::from_json_file(path)
            .with_context(|| format!("loading bug definitions {}", path.display()))?;
        tracing::info!(bugs = catalog.len(), "loaded bug definitions");
        world = world.with_catalog(catalog);
    }

    let learner = Learner::new(world.state_dim(), world.action_space(), config.learner.clone())?;
    tracing::info!(
        state_dim = learner.state_dim(),
        actions = learner.action_count(),
        episodes = config.episodes,
        "starting training"
    );

    let start = Instant::now();
    let mut trainer = Trainer::new(world, learner, config.epsilon_schedule, config.max_steps);
    let reports = trainer.run(config.episodes)?;

    let bugs_found: usize = reports.iter().map(|r| r.bugs_found).sum();
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        bugs_found,
        updates = trainer.learner().updates(),
        "training finished"
    );

    if let Some(path) = &config.metrics_path {
        write_metrics(trainer.reports(), path)
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }
    Ok(())
}

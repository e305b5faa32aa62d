use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use duelist::config::Config;
use duelist::training::{StartMode, TrainingOrchestrator, TrainingOutcome};
use duelist::world::SimWorld;

#[derive(Parser, Debug)]
#[command(
    name = "duelist",
    version,
    about = "Train arena duel agents with reinforcement learning",
    disable_help_flag = true
)]
struct Cli {
    /// Resume from the saved model instead of starting fresh
    #[arg(short = 'l', long = "load", visible_alias = "continue", visible_short_alias = 'c')]
    load: bool,

    /// TOML configuration file (defaults are used for anything it omits)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of episodes to run this session
    #[arg(long, value_name = "N")]
    episodes: Option<usize>,

    /// Seed for the simulator and the agent
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Print usage and the effective configuration
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(episodes) = cli.episodes {
        config.training.episodes_per_session = episodes;
    }
    if let Some(seed) = cli.seed {
        config.training.seed = Some(seed);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Usage followed by the configuration a run would use. A configuration that fails
/// to load or validate is reported alongside the defaults.
fn help_text(cli: &Cli) -> String {
    let usage = Cli::command().render_help();
    match load_config(cli) {
        Ok(config) => format!("{}\n\nEffective configuration:\n{}", usage, config),
        Err(e) => format!(
            "{}\n\nConfiguration error: {:#}\n\nDefault configuration:\n{}",
            usage,
            e,
            Config::default()
        ),
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.help {
        println!("{}", help_text(&cli));
        return Ok(());
    }
    let config = load_config(&cli)?;

    info!(
        server = %format!("{}:{}", config.server.host, config.server.port),
        version = %config.server.version,
        "using the built-in arena simulator in place of the world server"
    );
    let world = SimWorld::new(config.training.seed);
    let mode = if cli.load { StartMode::Resume } else { StartMode::Fresh };
    let mut orchestrator = TrainingOrchestrator::new(config, world, mode)?;

    let shutdown = orchestrator.shutdown_handle();
    ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
        .context("failed to install interrupt handler")?;

    let result = orchestrator.train();
    orchestrator.shutdown();

    match result? {
        TrainingOutcome::Completed(summary) => {
            info!(episodes = summary.total_episodes, "done");
        }
        TrainingOutcome::Interrupted(summary) => {
            info!(episodes = summary.total_episodes, "stopped by interrupt, model saved");
        }
    }
    Ok(())
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        error!("{:#}", e);
        process::exit(1);
    }
}

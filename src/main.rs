use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use msystem_lib::app::{BatchRunner, RunObserver, SimulationController};
use msystem_lib::{calculate_tile_stats, init_logging, load_system, AppConfig, RunLogger, Simulator};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Common {
    /// M System descriptor (JSON)
    #[arg(short, long)]
    model: PathBuf,

    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory the run log is appended to
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one simulation on a background worker
    Run {
        #[command(flatten)]
        common: Common,

        /// Step limit; 0 runs until no rule applies
        #[arg(short, long, default_value_t = 0)]
        steps: u64,

        /// Seed of the run's random source (overrides the config)
        #[arg(long)]
        seed: Option<u64>,

        /// Tile to damage during the run
        #[arg(long)]
        kill_tile: Option<String>,

        /// Per-step kill probability of each `kill_tile` instance
        #[arg(long, requires = "kill_tile", conflicts_with = "kills")]
        kill_probability: Option<f64>,

        /// Number of `kill_tile` instances removed at the first step
        #[arg(long, requires = "kill_tile")]
        kills: Option<usize>,

        /// Choose the killed instances at random
        #[arg(long, requires = "kills")]
        probabilistic: bool,

        /// Print every notification
        #[arg(short, long)]
        verbose: bool,
    },
    /// Run independent trials and aggregate their statistics
    Batch {
        #[command(flatten)]
        common: Common,

        /// Number of trials (overrides the config)
        #[arg(short, long)]
        trials: Option<usize>,

        /// Step limit per trial (overrides the config)
        #[arg(short, long)]
        steps: Option<u64>,

        /// Run trials one after another
        #[arg(long)]
        sequential: bool,
    },
}

fn load(common: &Common) -> Result<(AppConfig, msystem_lib::MSystem, RunLogger)> {
    let config = AppConfig::load_or_default(&common.config)
        .with_context(|| format!("loading config {}", common.config.display()))?;
    let system = load_system(&common.model, config.geometry.tolerance)
        .with_context(|| format!("loading model {}", common.model.display()))?;
    let logger = RunLogger::new_at(&common.log_dir, &config.fingerprint())
        .with_context(|| format!("opening log directory {}", common.log_dir.display()))?;
    Ok((config, system, logger))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            common,
            steps,
            seed,
            kill_tile,
            kill_probability,
            kills,
            probabilistic,
            verbose,
        } => {
            let (config, system, logger) = load(&common)?;
            let logger = Arc::new(logger);
            let seed = seed.or(config.world.seed).unwrap_or_else(rand::random);

            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let simulator = Simulator::new(&system, &config, seed)
                .context("seeding the world")?
                .with_events(tx);
            let observer = tokio::spawn(
                RunObserver::new(logger.clone(), 0)
                    .with_echo(verbose)
                    .observe(rx),
            );

            let controller = SimulationController::spawn(simulator);
            match (kill_tile.as_deref(), kill_probability, kills) {
                (Some(tile), Some(p), _) => controller.start_with_kill_probability(steps, tile, p)?,
                (Some(tile), None, Some(n)) => {
                    controller.start_with_kills(steps, tile, n, probabilistic)?
                }
                _ => controller.start(steps)?,
            }

            let stop = controller.stop_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, stopping at the next step boundary");
                    stop.store(true, std::sync::atomic::Ordering::SeqCst);
                }
            });

            let simulator = tokio::task::spawn_blocking(move || controller.shutdown())
                .await
                .context("joining the simulation worker")??;
            let stats = calculate_tile_stats(simulator.world(), &config.stats);
            logger.log_trial(0, seed, &stats)?;
            drop(simulator);

            let report = observer.await.context("joining the observer")?;
            if let Some(failure) = report.failures.first() {
                anyhow::bail!("run failed: {failure}");
            }
            let steps_done: u64 = report.outcomes.iter().map(|o| o.steps).sum();
            println!("seed={seed};steps={steps_done};{stats}");
        }
        Command::Batch {
            common,
            trials,
            steps,
            sequential,
        } => {
            let (mut config, system, logger) = load(&common)?;
            if let Some(trials) = trials {
                config.batch.trials = trials;
            }
            if let Some(steps) = steps {
                config.batch.max_steps = steps;
            }
            if sequential {
                config.batch.parallel = false;
            }
            config.validate().context("validating batch settings")?;

            let summary = tokio::task::spawn_blocking(move || {
                BatchRunner::new(&system, &config, &logger).run().1
            })
            .await
            .context("joining the batch")?;
            println!("{summary}");
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod database;
mod monitoring;
mod pool;

use config::Config;
use database::{LibsqlSampleStore, SampleStore};
use monitoring::scheduler::progress_line;
use monitoring::{IntervalClock, PingCommand, ProbeExecutor, SamplingLoop};

/// Periodically ping a set of hosts and store latency/loss samples
#[derive(Parser, Debug)]
#[command(name = "pingsaver", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PINGSAVER_CONFIG")]
    config: Option<PathBuf>,

    /// Local database file (overrides config file)
    #[arg(long, env = "PINGSAVER_DB")]
    database: Option<PathBuf>,

    /// Sampling interval in seconds (overrides config file)
    #[arg(long)]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sample all targets forever (default)
    Run,
    /// Print the number of stored samples
    Count,
    /// Probe one host once and print the result without storing it
    Probe {
        host: String,
    },
    /// Print stored samples as JSON lines, oldest first
    Dump {
        /// Only samples for this host
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(path) = cli.database {
        config.database = config::DatabaseConfig::local(path);
    }
    if let Some(interval) = cli.interval {
        config.sampling.interval_seconds = interval;
    }
    config.validate()?;
    tracing::debug!("{}", config);

    let check = Arc::new(PingCommand::new(
        config.sampling.ping_program.clone(),
        Duration::from_secs(config.sampling.probe_grace_seconds),
    ));
    let executor = ProbeExecutor::new(check);

    match cli.command.unwrap_or(Command::Run) {
        Command::Probe { host } => {
            monitoring::validation::validate_target_host(&host)?;
            let sample = executor.probe(&host, config.sampling.echo_count).await;
            println!("{}", progress_line(&sample));
            Ok(())
        }
        command => {
            tracing::info!("Opening sample store at {}", config.database.location());
            let handle = pool::open_store(&config.database).await?;
            let store = Arc::new(LibsqlSampleStore::new(handle.clone()));

            let result = match command {
                Command::Count => count(store.as_ref()).await,
                Command::Dump { host } => dump(store.as_ref(), host.as_deref()).await,
                _ => sample_forever(&config, executor, store).await,
            };

            handle.close();
            tracing::debug!(
                connections = handle.manager().connections_opened(),
                "Sample store closed"
            );
            result
        }
    }
}

async fn count(store: &dyn SampleStore) -> Result<()> {
    store.ensure_schema().await?;
    println!("{}", store.count().await?);
    Ok(())
}

/// The reporting side's view: stored samples in time order
async fn dump(store: &dyn SampleStore, host: Option<&str>) -> Result<()> {
    store.ensure_schema().await?;
    let samples = match host {
        Some(host) => store.samples_for(host).await?,
        None => store.samples().await?,
    };

    for sample in samples {
        println!("{}", serde_json::to_string(&sample)?);
    }
    Ok(())
}

async fn sample_forever(
    config: &Config,
    executor: ProbeExecutor,
    store: Arc<LibsqlSampleStore>,
) -> Result<()> {
    let clock = IntervalClock::new(Duration::from_secs(config.sampling.interval_seconds));
    let mut sampling = SamplingLoop::new(
        config.targets.clone(),
        executor,
        store,
        clock,
        config.sampling.echo_count,
    )?
    .on_store_error(config.sampling.on_store_error);

    tokio::select! {
        result = sampling.run() => result,
        _ = shutdown_signal() => {
            tracing::info!("Sampling stopped");
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use tokio::sync::{mpsc, watch};
use tracing::info;

use forge_mirror::config::Config;
use forge_mirror::source::HttpSourceClient;
use forge_mirror::store::SqliteStore;
use forge_mirror::sync::{Reconciler, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "forge-mirror")]
#[command(about = "Mirrors a source-control management API into a local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/forge-mirror/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Seconds between reconciliation cycles (overrides the config file)
  #[arg(short, long)]
  interval: Option<u64>,

  /// Run a single reconciliation cycle and exit
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let interval_secs = args.interval.unwrap_or(config.sync.interval_secs);

  let source = Arc::new(HttpSourceClient::new(
    &config.source,
    Config::get_api_token(),
  )?);

  let store = Arc::new(match config.cache.path.as_deref() {
    Some(":memory:") => SqliteStore::open_in_memory()?,
    Some(path) => SqliteStore::open_at(std::path::Path::new(path))?,
    None => SqliteStore::open()?,
  });

  let reconciler = Arc::new(Reconciler::new(store, source));

  if args.once {
    let report = reconciler.run_cycle().await;
    for (kind, outcome) in &report.outcomes {
      match outcome {
        Ok(stats) => info!(
          kind = kind.as_str(),
          upserted = stats.upserted,
          deleted = stats.deleted,
          "done"
        ),
        Err(e) => tracing::error!(kind = kind.as_str(), error = %e, "failed"),
      }
    }
    return Ok(());
  }

  let scheduler = Arc::new(Scheduler::new(
    reconciler,
    Duration::from_secs(interval_secs),
  ));

  // The refresh sender belongs to the route layer, which forwards system
  // webhook events into early partial cycles.
  let (_refresh_tx, refresh_rx) = mpsc::channel(16);
  let (shutdown_tx, shutdown_rx) = watch::channel(false);

  let runner = scheduler.clone();
  let handle = tokio::spawn(async move { runner.run(refresh_rx, shutdown_rx).await });

  info!(interval_secs, "mirror running");
  tokio::signal::ctrl_c().await?;
  info!("shutdown requested");
  let _ = shutdown_tx.send(true);
  handle.await?;

  Ok(())
}

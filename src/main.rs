use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pattern_workload::config::WorkloadConfig;
use pattern_workload::engine::PatternEngine;
use pattern_workload::metrics;
use pattern_workload::store::EtcdConnector;
use pattern_workload::store::MemConnector;
use pattern_workload::store::StoreConnector;
use pattern_workload::Error;
use pattern_workload::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pattern driven etcd workload generator
#[derive(Parser, Debug)]
#[command(name = "pattern-workload", version, about)]
struct Args {
    /// Configuration file merged over the defaults and `CONFIG_PATH`
    #[arg(short, long)]
    config: Option<String>,

    /// Run against an in-process store instead of etcd
    #[arg(long)]
    dry_run: bool,

    /// Print every key or prefix of this level and exit
    #[arg(long)]
    key_list: Option<usize>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_observability();

    let mut config = WorkloadConfig::new()?;
    if let Some(path) = &args.config {
        config = config.with_override_config(path)?;
    }
    let config = config.validate()?;
    info!(?config, "Configuration loaded");

    let engine = Arc::new(PatternEngine::new(config)?);
    if let Some(level) = args.key_list {
        print!("{}", engine.key_list(level));
        return Ok(());
    }

    let (graceful_tx, graceful_rx) = watch::channel(());
    let monitoring = &engine.config().monitoring;
    if monitoring.prometheus_enabled {
        tokio::spawn(metrics::start_server(monitoring.prometheus_port, graceful_rx));
    }

    let connector: Arc<dyn StoreConnector> = if args.dry_run {
        info!("Dry run against an in-process store");
        Arc::new(MemConnector::default())
    } else {
        let client = &engine.config().client;
        Arc::new(EtcdConnector::new(
            client.endpoints.clone(),
            Duration::from_millis(client.connect_timeout_ms),
        ))
    };
    let pool = engine.connect(connector).await?;

    {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = graceful_shutdown().await {
                error!("Failed to listen for shutdown signals: {:?}", e);
            }
            engine.shutdown();
        });
    }

    let outcome = engine.run(&pool).await;
    pool.close().await;
    let _ = graceful_tx.send(());

    match outcome {
        Ok(summary) => {
            info!(test_end_seen = summary.test_end_seen, "Workload finished");
            Ok(())
        }
        Err(e) => {
            error!("Workload stopped: {}", e);
            Err(e)
        }
    }
}

async fn graceful_shutdown() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use defi_flow::cli::{Cli, Command, RunArgs};
use defi_flow::config::RuntimeConfig;
use defi_flow::oracle::http::HttpPriceOracle;
use defi_flow::oracle::PriceOracle;
use defi_flow::scheduler::{claim, flywheel, reactive, Collaborators};
use defi_flow::signer::http::HttpSigner;
use defi_flow::signer::Signer;
use defi_flow::store::sqlite::SqliteStore;
use defi_flow::store::{Store, StoreError};
use defi_flow::venue::http::HttpVenueClient;
use defi_flow::venue::VenueClient;

/// How long the process waits, after a shutdown signal, for in-flight leases
/// to drain before exiting unconditionally. Spec section 5: "waits up to a
/// grace window for cooperative termination, then exits."
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);
const LEASE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let runtime =
                tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            match runtime.block_on(run(args)) {
                Ok(()) => Ok(()),
                Err(err) => {
                    tracing::error!(error = %err, "fatal startup or store error");
                    std::process::exit(1);
                }
            }
        }
        Command::Migrate(args) => migrate(&args),
    }
}

fn migrate(args: &RunArgs) -> anyhow::Result<()> {
    let config = RuntimeConfig::from_cli(args)?;
    let path = config
        .sqlite_path()
        .context("migrate requires a sqlite STORE_URL (sqlite://path or a bare file path)")?;
    SqliteStore::migrate_only(&path)?;
    tracing::info!(path = %path.display(), "store schema migrated");
    Ok(())
}

/// Wires Store, Signer, Venue client, Price oracle, reactive subscriber,
/// flywheel scheduler, and claim scheduler, in the declared init order (store
/// -> signer -> venue -> oracle -> subscriber -> schedulers), then blocks
/// until a shutdown signal or a fatal `STORE_FATAL` error. Collaborators are
/// torn down in reverse simply by falling out of scope in reverse drop order.
async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = RuntimeConfig::from_cli(&args)?;

    let sqlite_path = config
        .sqlite_path()
        .context("STORE_URL must name a sqlite database for this deployment")?;
    let sqlite_store =
        Arc::new(SqliteStore::open(&sqlite_path).context("failed to open sqlite store at boot")?);
    let store: Arc<dyn Store> = sqlite_store.clone();

    // The spec's recognized env vars (section 6) name no dedicated signer or
    // venue base URL, so both collaborators share `CHAIN_RPC_URL` as their
    // HTTP base, distinguished only by path and auth key. See DESIGN.md.
    let signer: Arc<dyn Signer> = Arc::new(HttpSigner::new(
        config.chain_rpc_url.clone(),
        config.signer_auth_key.clone(),
    ));
    let venue: Arc<dyn VenueClient> = Arc::new(HttpVenueClient::new(
        config.chain_rpc_url.clone(),
        config.venue_api_key.clone(),
    ));
    let oracle: Arc<dyn PriceOracle> =
        Arc::new(HttpPriceOracle::new(config.chain_rpc_url.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweep_task = {
        let sqlite_store = Arc::clone(&sqlite_store);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LEASE_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => sqlite_store.sweep_stale_leases(),
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    };

    let reactive_task = {
        let store = Arc::clone(&store);
        let venue = Arc::clone(&venue);
        let signer = Arc::clone(&signer);
        let oracle = Arc::clone(&oracle);
        let ws_url = config
            .chain_ws_url
            .clone()
            .unwrap_or_else(|| config.chain_rpc_url.replacen("http", "ws", 1));
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let collaborators = Collaborators {
                store: store.as_ref(),
                venue: venue.as_ref(),
                signer: signer.as_ref(),
                oracle: oracle.as_ref(),
            };
            if let Err(err) = reactive::run(&collaborators, &ws_url, shutdown_rx).await {
                tracing::warn!(error = %err, "reactive subscriber exited");
            }
        })
    };

    let flywheel_task = {
        let store = Arc::clone(&store);
        let venue = Arc::clone(&venue);
        let signer = Arc::clone(&signer);
        let oracle = Arc::clone(&oracle);
        let interval_seconds = config.flywheel_interval_seconds.max(1);
        let max_trades_per_minute = config.max_trades_per_minute;
        let max_concurrent_tokens = config.max_concurrent_tokens;
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let collaborators = Collaborators {
                            store: store.as_ref(),
                            venue: venue.as_ref(),
                            signer: signer.as_ref(),
                            oracle: oracle.as_ref(),
                        };
                        match flywheel::tick(&collaborators, max_trades_per_minute, max_concurrent_tokens).await {
                            Ok(()) => {}
                            Err(StoreError::Fatal(reason)) => {
                                tracing::error!(reason, "store fatal error, flywheel scheduler exiting");
                                std::process::exit(1);
                            }
                            Err(err) => tracing::warn!(error = %err, "flywheel tick failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    };

    let claim_task = {
        let store = Arc::clone(&store);
        let venue = Arc::clone(&venue);
        let signer = Arc::clone(&signer);
        let oracle = Arc::clone(&oracle);
        let interval_seconds = config.claim_interval_seconds.max(1);
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let collaborators = Collaborators {
                            store: store.as_ref(),
                            venue: venue.as_ref(),
                            signer: signer.as_ref(),
                            oracle: oracle.as_ref(),
                        };
                        match claim::tick(&collaborators).await {
                            Ok(()) => {}
                            Err(StoreError::Fatal(reason)) => {
                                tracing::error!(reason, "store fatal error, claim scheduler exiting");
                                std::process::exit(1);
                            }
                            Err(err) => tracing::warn!(error = %err, "claim tick failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    };

    tracing::info!(
        flywheel_interval_seconds = config.flywheel_interval_seconds,
        claim_interval_seconds = config.claim_interval_seconds,
        max_trades_per_minute = config.max_trades_per_minute,
        max_concurrent_tokens = config.max_concurrent_tokens,
        "engine started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(
        SHUTDOWN_GRACE,
        futures::future::join4(flywheel_task, claim_task, reactive_task, sweep_task),
    )
    .await;
    if drained.is_err() {
        tracing::warn!("shutdown grace window elapsed before all tasks drained");
    }

    tracing::info!("engine stopped cleanly");
    Ok(())
}

use clap::{Parser, Subcommand};

/// Autonomous multi-tenant market-making engine for bonding-curve-launched
/// tokens: flywheel scheduler, fast-claim scheduler, trade-execution
/// pipeline, and the algorithm-mode decision layer.
#[derive(Parser)]
#[command(name = "defi-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the engine daemon: wires Store, Signer, Venue client, Price
    /// oracle, reactive subscriber, flywheel scheduler, and claim scheduler,
    /// then blocks until a shutdown signal or a fatal store error.
    Run(RunArgs),

    /// Apply the Store's schema migrations and exit. Meaningful only
    /// against the sqlite-backed Store adapter.
    Migrate(RunArgs),
}

/// Flags mirror the environment variables of spec section 6 1:1; a flag
/// wins over its env var, which wins over the built-in default.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    #[arg(long)]
    pub store_url: Option<String>,

    #[arg(long)]
    pub chain_rpc_url: Option<String>,

    #[arg(long)]
    pub chain_ws_url: Option<String>,

    #[arg(long)]
    pub signer_auth_key: Option<String>,

    #[arg(long)]
    pub venue_api_key: Option<String>,

    #[arg(long)]
    pub flywheel_interval_seconds: Option<u64>,

    #[arg(long)]
    pub claim_interval_seconds: Option<u64>,

    #[arg(long)]
    pub max_trades_per_minute: Option<u32>,

    #[arg(long)]
    pub max_concurrent_tokens: Option<usize>,

    #[arg(long)]
    pub platform_fee_percent: Option<f64>,

    #[arg(long)]
    pub initial_admin_id: Option<String>,
}

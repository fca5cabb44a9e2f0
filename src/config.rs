//! Runtime configuration: resolves the environment variables of spec section
//! 6, CLI flag > env var > built-in default, mirroring the teacher's
//! `RuntimeConfig::from_cli`/`build` split.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::cli::RunArgs;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub flywheel_interval_seconds: u64,
    pub claim_interval_seconds: u64,
    pub max_trades_per_minute: u32,
    pub max_concurrent_tokens: usize,
    pub platform_fee_percent: f64,
    pub signer_auth_key: Option<String>,
    pub venue_api_key: Option<String>,
    pub chain_rpc_url: String,
    pub chain_ws_url: Option<String>,
    pub store_url: String,
    pub initial_admin_id: Option<String>,
}

impl RuntimeConfig {
    /// CLI args are resolved first, missing values fall back to env vars,
    /// then to documented defaults. `STORE_URL` absence is fatal at boot;
    /// `SIGNER_AUTH_KEY`/`VENUE_API_KEY` absence degrades those collaborators
    /// to "unconfigured" rather than failing the process.
    pub fn from_cli(args: &RunArgs) -> Result<Self> {
        let store_url = args
            .store_url
            .clone()
            .or_else(|| std::env::var("STORE_URL").ok())
            .context("STORE_URL is required (set --store-url or the STORE_URL env var)")?;

        let chain_rpc_url = args
            .chain_rpc_url
            .clone()
            .or_else(|| std::env::var("CHAIN_RPC_URL").ok())
            .context("CHAIN_RPC_URL is required (set --chain-rpc-url or the CHAIN_RPC_URL env var)")?;

        let flywheel_interval_seconds = resolve_u64(
            args.flywheel_interval_seconds,
            "FLYWHEEL_INTERVAL_SECONDS",
            60,
        )?;
        let claim_interval_seconds =
            resolve_u64(args.claim_interval_seconds, "CLAIM_INTERVAL_SECONDS", 60)?;
        let max_trades_per_minute =
            resolve_u32(args.max_trades_per_minute, "MAX_TRADES_PER_MINUTE", 30)?;
        let max_concurrent_tokens =
            resolve_usize(args.max_concurrent_tokens, "MAX_CONCURRENT_TOKENS", 8)?;
        let platform_fee_percent =
            resolve_f64(args.platform_fee_percent, "PLATFORM_FEE_PERCENT", 10.0)?;

        if max_trades_per_minute == 0 {
            bail!("MAX_TRADES_PER_MINUTE must be greater than zero");
        }
        if max_concurrent_tokens == 0 {
            bail!("MAX_CONCURRENT_TOKENS must be greater than zero");
        }

        Ok(RuntimeConfig {
            flywheel_interval_seconds,
            claim_interval_seconds,
            max_trades_per_minute,
            max_concurrent_tokens,
            platform_fee_percent,
            signer_auth_key: args
                .signer_auth_key
                .clone()
                .or_else(|| std::env::var("SIGNER_AUTH_KEY").ok()),
            venue_api_key: args
                .venue_api_key
                .clone()
                .or_else(|| std::env::var("VENUE_API_KEY").ok()),
            chain_rpc_url,
            chain_ws_url: args
                .chain_ws_url
                .clone()
                .or_else(|| std::env::var("CHAIN_WS_URL").ok()),
            store_url,
            initial_admin_id: args
                .initial_admin_id
                .clone()
                .or_else(|| std::env::var("INITIAL_ADMIN_ID").ok()),
        })
    }

    /// The sqlite file path, when `store_url` names one (`sqlite://path` or a
    /// bare filesystem path). Used by the `migrate` subcommand.
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        self.store_url
            .strip_prefix("sqlite://")
            .map(PathBuf::from)
            .or_else(|| {
                (!self.store_url.contains("://")).then(|| PathBuf::from(&self.store_url))
            })
    }
}

fn resolve_u64(cli: Option<u64>, env_var: &str, default: u64) -> Result<u64> {
    if let Some(v) = cli {
        return Ok(v);
    }
    match std::env::var(env_var) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{env_var} is not a valid integer: {v}")),
        Err(_) => Ok(default),
    }
}

fn resolve_u32(cli: Option<u32>, env_var: &str, default: u32) -> Result<u32> {
    if let Some(v) = cli {
        return Ok(v);
    }
    match std::env::var(env_var) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{env_var} is not a valid integer: {v}")),
        Err(_) => Ok(default),
    }
}

fn resolve_usize(cli: Option<usize>, env_var: &str, default: usize) -> Result<usize> {
    if let Some(v) = cli {
        return Ok(v);
    }
    match std::env::var(env_var) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{env_var} is not a valid integer: {v}")),
        Err(_) => Ok(default),
    }
}

fn resolve_f64(cli: Option<f64>, env_var: &str, default: f64) -> Result<f64> {
    if let Some(v) = cli {
        return Ok(v);
    }
    match std::env::var(env_var) {
        Ok(v) => v
            .parse()
            .with_context(|| format!("{env_var} is not a valid number: {v}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_path_strips_scheme() {
        let mut config = base();
        config.store_url = "sqlite://./data/flywheel.db".to_string();
        assert_eq!(config.sqlite_path(), Some(PathBuf::from("./data/flywheel.db")));
    }

    #[test]
    fn sqlite_path_accepts_bare_path() {
        let mut config = base();
        config.store_url = "./data/flywheel.db".to_string();
        assert_eq!(config.sqlite_path(), Some(PathBuf::from("./data/flywheel.db")));
    }

    #[test]
    fn sqlite_path_none_for_other_schemes() {
        let mut config = base();
        config.store_url = "postgres://localhost/flywheel".to_string();
        assert_eq!(config.sqlite_path(), None);
    }

    fn base() -> RuntimeConfig {
        RuntimeConfig {
            flywheel_interval_seconds: 60,
            claim_interval_seconds: 60,
            max_trades_per_minute: 30,
            max_concurrent_tokens: 8,
            platform_fee_percent: 10.0,
            signer_auth_key: None,
            venue_api_key: None,
            chain_rpc_url: "http://localhost".to_string(),
            chain_ws_url: None,
            store_url: String::new(),
            initial_admin_id: None,
        }
    }
}

//! The Venue client: quote, swap-tx assembly, claimable-position query, claim-tx
//! assembly, and token graduation info, against whichever venue a token's
//! `tradingRoute` selects. `Quote.opaque` is an implementation-defined handle
//! that callers pass back to [`VenueClient::build_swap_tx`] without interpreting.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::state::TradeSide;

/// A serialized, unsigned transaction as returned by the venue. Passed to the
/// Signer unmodified.
#[derive(Debug, Clone)]
pub struct Tx(pub Vec<u8>);

/// An opaque quote handle. `opaque` must round-trip through
/// [`VenueClient::build_swap_tx`] without interpretation by the caller.
#[derive(Debug, Clone)]
pub struct Quote {
    pub opaque: serde_json::Value,
    /// Estimated output amount in the output mint's minor units, for logging only.
    pub estimated_out: u64,
}

/// A claimable creator-fee position at the venue, matched by mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub mint_address: String,
    pub claimable: crate::money::Lamports,
}

/// Venue-side token metadata, notably the bonding-curve graduation flag used
/// by `tradingRoute = auto`.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub mint: String,
    pub graduated: bool,
}

/// On-chain balances of a wallet, read fresh before each decision so the
/// algorithm modes always size against current holdings rather than a stale
/// snapshot. Not named as a distinct collaborator in the component table
/// since it rides on the same address-keyed RPC surface as the rest of the
/// venue client.
#[derive(Debug, Clone, Copy)]
pub struct WalletBalances {
    pub sol: crate::money::Lamports,
    pub token: crate::money::TokenUnits,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VenueError {
    /// An empty or invalid quote. Maps to spec `QUOTE_UNAVAILABLE`.
    #[error("quote unavailable")]
    QuoteUnavailable,
    #[error("failed to build transaction: {0}")]
    BuildFailed(String),
    #[error("venue network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_units: u64,
        side: TradeSide,
        slippage_bps: u16,
    ) -> Result<Quote, VenueError>;

    async fn build_swap_tx(&self, wallet_address: &str, quote: &Quote) -> Result<Tx, VenueError>;

    async fn build_claim_tx(
        &self,
        dev_wallet_address: &str,
        mint_address: &str,
    ) -> Result<Tx, VenueError>;

    /// Assembles a native-coin transfer moving `amount_lamports` from `from`
    /// to `to`. Used by the claim scheduler to move a claim's fee-net amount
    /// from the dev wallet to the ops wallet (spec section 4.10 step 3) —
    /// distinct from [`VenueClient::build_claim_tx`], which only ever
    /// assembles a claim against a mint's bonding-curve position.
    async fn build_transfer_tx(
        &self,
        from_address: &str,
        to_address: &str,
        amount_lamports: u64,
    ) -> Result<Tx, VenueError>;

    async fn claimable_positions(
        &self,
        dev_wallet_address: &str,
    ) -> Result<Vec<Position>, VenueError>;

    async fn token_info(&self, mint: &str) -> Result<TokenInfo, VenueError>;

    /// The native-coin and token balance currently held at `wallet_address`.
    async fn wallet_balances(
        &self,
        wallet_address: &str,
        mint: &str,
    ) -> Result<WalletBalances, VenueError>;
}

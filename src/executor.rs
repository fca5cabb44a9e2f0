//! The trade executor: precondition → quote → build → sign-send → classify →
//! persist, per spec section 4.8. Runs under a held lease; callers (the
//! flywheel scheduler, the reactive subscriber) supply the `TradeIntent` and
//! collaborator handles and get back an [`ExecutionOutcome`] describing what
//! happened so the caller can log and move to the next eligible token.

use chrono::Utc;

use crate::algo::{Decision, PlannedTrade, StatePatch, TradeIntent};
use crate::model::config::{TokenConfig, TradingRoute};
use crate::model::state::{FlywheelState, TradeSide};
use crate::model::token::Token;
use crate::model::transaction::{Transaction, TransactionStatus, TransactionType};
use crate::model::wallet::{ChainType, Wallet};
use crate::money::Lamports;
use crate::signer::{SignError, Signer};
use crate::store::{Store, StoreError};
use crate::venue::{Quote, VenueClient, VenueError};

fn trading_route_label(route: TradingRoute) -> &'static str {
    match route {
        TradingRoute::Bags => "bags",
        TradingRoute::Jupiter => "jupiter",
        TradingRoute::Auto => "auto",
    }
}

/// A conservative estimate of the network fee a single signed transaction
/// consumes, reserved on top of the trade amount when checking precondition
/// balance coverage.
pub const FEE_RESERVE_LAMPORTS: u64 = 5_000;

/// The maximum number of rebuild attempts the executor makes in one tick
/// when the signer reports `BLOCKHASH_EXPIRED`, per spec section 4.8 step 5.
pub const MAX_BLOCKHASH_RETRIES: u32 = 3;

#[derive(Debug)]
pub enum ExecutionOutcome {
    Confirmed { hash: String },
    Skipped(String),
    Failed(String),
}

fn chain_id(chain_type: ChainType) -> &'static str {
    match chain_type {
        ChainType::Solana => "solana",
    }
}

/// Executes a single decision under a held lease. `token`/`config`/`state`
/// describe the token as of lease acquisition; `state` is mutated in place to
/// reflect the outcome, and the caller persists it via `Store::update_state`
/// once this returns. `ops_balances` backs the precondition balance check
/// (spec section 4.8 step 1).
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    store: &dyn Store,
    venue: &dyn VenueClient,
    signer: &dyn Signer,
    token: &Token,
    config: &TokenConfig,
    state: &mut FlywheelState,
    ops_wallet: &Wallet,
    ops_balances: crate::venue::WalletBalances,
    decision: Decision,
) -> Result<ExecutionOutcome, StoreError> {
    decision.immediate.apply(state);
    let on_success = decision.on_success;

    let trade = match decision.intent {
        TradeIntent::Trade(trade) => trade,
        TradeIntent::Skip(reason) => return Ok(ExecutionOutcome::Skipped(reason)),
    };

    if !config.market_making_enabled {
        return Ok(ExecutionOutcome::Skipped(
            "market making disabled".to_string(),
        ));
    }
    let now = Utc::now();
    if state.is_paused(now) {
        return Ok(ExecutionOutcome::Skipped("token is paused".to_string()));
    }
    if !has_sufficient_balance(
        trade.side,
        trade.amount,
        ops_balances.sol,
        ops_balances.token.0,
    ) {
        return Ok(ExecutionOutcome::Skipped(
            "insufficient ops balance for amount plus fee reserve".to_string(),
        ));
    }

    let (input_mint, output_mint) = match trade.side {
        TradeSide::Buy => (wsol_mint(), token.mint_address.as_str()),
        TradeSide::Sell => (token.mint_address.as_str(), wsol_mint()),
    };

    let mut attempt = 0;
    loop {
        let quote = match venue
            .quote(
                input_mint,
                output_mint,
                trade.amount,
                trade.side,
                config.slippage_bps,
            )
            .await
        {
            Ok(quote) => quote,
            Err(VenueError::QuoteUnavailable) => {
                return record_failure(store, token, state, config, "QUOTE_UNAVAILABLE", now)
                    .await;
            }
            Err(err) => {
                return record_failure(store, token, state, config, &err.to_string(), now).await;
            }
        };

        let tx = match venue.build_swap_tx(&ops_wallet.address, &quote).await {
            Ok(tx) => tx,
            Err(err) => {
                return record_failure(store, token, state, config, &err.to_string(), now).await;
            }
        };

        match signer
            .sign_and_send(
                &ops_wallet.wallet_id,
                &tx.0,
                chain_id(ops_wallet.chain_type),
            )
            .await
        {
            Ok(signed) => {
                return confirm(
                    store,
                    token,
                    &trade,
                    &quote,
                    trading_route_label(config.trading_route),
                    state,
                    &on_success,
                    config.n_sell,
                    &signed.hash,
                    now,
                )
                .await;
            }
            Err(SignError::BlockhashExpired) => {
                attempt += 1;
                if attempt >= MAX_BLOCKHASH_RETRIES {
                    return record_failure(
                        store,
                        token,
                        state,
                        config,
                        "BLOCKHASH_EXPIRED (exhausted retries)",
                        now,
                    )
                    .await;
                }
                tracing::warn!(token_id = %token.token_id, attempt, "blockhash expired, rebuilding");
                continue;
            }
            Err(SignError::SignerUnavailable) => {
                tracing::warn!(token_id = %token.token_id, "signer unavailable, no state change");
                return Ok(ExecutionOutcome::Skipped("signer unavailable".to_string()));
            }
            Err(err) => {
                return record_failure(store, token, state, config, &err.to_string(), now).await;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn confirm(
    store: &dyn Store,
    token: &Token,
    trade: &PlannedTrade,
    quote: &Quote,
    trading_route: &str,
    state: &mut FlywheelState,
    on_success: &StatePatch,
    n_sell: u32,
    hash: &str,
    now: chrono::DateTime<Utc>,
) -> Result<ExecutionOutcome, StoreError> {
    let transaction_type = match trade.side {
        TradeSide::Buy => TransactionType::Buy,
        TradeSide::Sell => TransactionType::Sell,
    };
    store
        .append_transaction(Transaction {
            id: uuid::Uuid::new_v4(),
            token_id: token.token_id.to_string(),
            transaction_type,
            amount: trade.amount,
            signature: Some(hash.to_string()),
            status: TransactionStatus::Confirmed,
            message: Some(format!("estimated_out={}", quote.estimated_out)),
            trading_route: Some(trading_route.to_string()),
            created_at: now,
        })
        .await?;

    state.record_success(now);
    // A buy crossing the N_buy boundary snapshots the token balance "after
    // this buy" (spec section 8 scenario S1); at decision time that balance
    // isn't known yet, so the patch only carries a pre-trade placeholder.
    // Now that the trade has confirmed, correct it with the quote's own
    // estimated output (the token units this buy just produced) before
    // applying.
    let mut on_success = on_success.clone();
    if trade.side == TradeSide::Buy {
        on_success.resolve_boundary_snapshot(quote.estimated_out, n_sell);
    }
    on_success.apply(state);
    if let Some(item) = trade.twap_item.clone() {
        state.twap_queue.push(item);
    }
    tracing::info!(token_id = %token.token_id, %hash, "trade confirmed");
    Ok(ExecutionOutcome::Confirmed {
        hash: hash.to_string(),
    })
}

async fn record_failure(
    _store: &dyn Store,
    token: &Token,
    state: &mut FlywheelState,
    config: &TokenConfig,
    reason: &str,
    now: chrono::DateTime<Utc>,
) -> Result<ExecutionOutcome, StoreError> {
    state.record_failure(reason, now, config.base_cooldown_seconds);
    tracing::warn!(token_id = %token.token_id, reason, paused_until = ?state.paused_until, "trade failed");
    Ok(ExecutionOutcome::Failed(reason.to_string()))
}

/// Balance coverage check from spec section 4.8 step 1: ops wallet balance
/// must cover `amount + fee reserve` for a buy (SOL is spent); a sell spends
/// token units and the fee reserve is still SOL-denominated since network
/// fees are always paid in the native coin.
pub fn has_sufficient_balance(
    side: TradeSide,
    amount: u64,
    ops_sol: Lamports,
    ops_token: u64,
) -> bool {
    match side {
        TradeSide::Buy => ops_sol.0 >= amount.saturating_add(FEE_RESERVE_LAMPORTS),
        TradeSide::Sell => ops_token >= amount && ops_sol.0 >= FEE_RESERVE_LAMPORTS,
    }
}

fn wsol_mint() -> &'static str {
    "So11111111111111111111111111111111111111112"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_requires_amount_plus_fee_reserve() {
        assert!(has_sufficient_balance(
            TradeSide::Buy,
            1_000_000,
            Lamports(1_000_000 + FEE_RESERVE_LAMPORTS),
            0
        ));
        assert!(!has_sufficient_balance(
            TradeSide::Buy,
            1_000_000,
            Lamports(1_000_000),
            0
        ));
    }

    #[test]
    fn sell_requires_token_amount_and_fee_reserve_in_sol() {
        assert!(has_sufficient_balance(
            TradeSide::Sell,
            500,
            Lamports(FEE_RESERVE_LAMPORTS),
            500
        ));
        assert!(!has_sufficient_balance(
            TradeSide::Sell,
            500,
            Lamports::ZERO,
            500
        ));
    }
}

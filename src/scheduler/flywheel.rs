//! The flywheel scheduler: periodic selection and dispatch across eligible
//! tokens, per spec section 4.9.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::algo::{self, Balances, ImmediatePatch};
use crate::chooser::{native_amount, ExecutionStyle};
use crate::detector::{self, DetectorThresholds};
use crate::executor::{self, ExecutionOutcome};
use crate::model::state::TwapQueueItem;
use crate::oracle::PriceOracle;
use crate::signer::Signer;
use crate::store::{Store, StoreError, TokenView};
use crate::venue::VenueClient;

use super::{sol_price_usd, RateLimiter};

pub struct Collaborators<'a> {
    pub store: &'a dyn Store,
    pub venue: &'a dyn VenueClient,
    pub signer: &'a dyn Signer,
    pub oracle: &'a dyn PriceOracle,
}

/// Runs one flywheel tick: select eligible tokens, lease each, enforce the
/// global rate cap, and drive pending TWAP slices plus at most one new
/// algorithmic intent per token. Up to `max_concurrent` tokens are processed
/// concurrently; the Store's per-token lease guarantees two ticks are never
/// in flight for the same token.
pub async fn tick(
    collaborators: &Collaborators<'_>,
    max_trades_per_minute: u32,
    max_concurrent: usize,
) -> Result<(), StoreError> {
    let eligible = collaborators.store.select_flywheel_eligible().await?;
    let rate_limiter = Arc::new(RateLimiter::new(max_trades_per_minute));

    let mut pending = FuturesUnordered::new();
    let mut iter = eligible.into_iter();

    for _ in 0..max_concurrent {
        if let Some(view) = iter.next() {
            pending.push(process_token(collaborators, view, Arc::clone(&rate_limiter)));
        }
    }
    while let Some(_result) = pending.next().await {
        if let Some(view) = iter.next() {
            pending.push(process_token(collaborators, view, Arc::clone(&rate_limiter)));
        }
    }

    Ok(())
}

async fn process_token(collaborators: &Collaborators<'_>, view: TokenView, rate_limiter: Arc<RateLimiter>) {
    let token_id = view.token.token_id.clone();
    let lease = match collaborators.store.lease(&token_id).await {
        Ok(lease) => lease,
        Err(StoreError::Busy) => return,
        Err(err) => {
            tracing::warn!(token_id = %token_id, error = %err, "lease acquisition failed");
            return;
        }
    };

    if let Err(err) = run_token(collaborators, view, &rate_limiter).await {
        tracing::warn!(token_id = %token_id, error = %err, "flywheel tick failed for token");
    }
    drop(lease);
}

async fn run_token(
    collaborators: &Collaborators<'_>,
    view: TokenView,
    rate_limiter: &RateLimiter,
) -> Result<(), StoreError> {
    let TokenView {
        token,
        config,
        mut state,
        ops_wallet,
        ..
    } = view;

    let now = Utc::now();
    let snapshot = collaborators
        .oracle
        .snapshot(&token.mint_address)
        .await
        .ok()
        .flatten();
    let sol_price = sol_price_usd(collaborators.oracle).await;

    if let Some(snapshot) = &snapshot {
        let detected = detector::detect(snapshot, &DetectorThresholds::default());
        algo::condition_bookkeeping(&detected, now).apply(&mut state);
    }

    let balances = match collaborators
        .venue
        .wallet_balances(&ops_wallet.address, &token.mint_address)
        .await
    {
        Ok(balances) => balances,
        Err(err) => {
            tracing::warn!(token_id = %token.token_id, error = %err, "balance query failed, skipping tick");
            return Ok(());
        }
    };

    let mut executed_this_tick = false;

    let mut ready: Vec<usize> = state
        .twap_queue
        .iter()
        .enumerate()
        .filter(|(_, item)| item.is_ready(now))
        .map(|(i, _)| i)
        .collect();
    ready.sort_by_key(|&i| (state.twap_queue[i].next_execute_at, state.twap_queue[i].created_at));

    for idx in ready {
        if !rate_limiter.try_acquire() {
            break;
        }
        let item = state.twap_queue[idx].clone();
        execute_twap_slice(collaborators, &token, &config, &mut state, &ops_wallet, balances, &item, snapshot.as_ref(), sol_price).await;
        executed_this_tick = true;
    }
    state.twap_queue.retain(|item| item.slices_remaining > 0);

    if !executed_this_tick && rate_limiter.try_acquire() {
        let condition = state.market_condition.unwrap_or(crate::model::state::MarketCondition::Normal);
        let decision = algo::decide(
            config.algorithm_mode,
            &config,
            &state,
            snapshot.as_ref(),
            sol_price,
            condition,
            Balances {
                ops_sol: balances.sol,
                ops_token: balances.token,
                token_decimals: token.decimals,
            },
            now,
        );
        let outcome = executor::execute(
            collaborators.store,
            collaborators.venue,
            collaborators.signer,
            &token,
            &config,
            &mut state,
            &ops_wallet,
            balances,
            decision,
        )
        .await?;
        log_outcome(&token.token_id.to_string(), &outcome);
    }

    collaborators.store.update_state(&token.token_id, state).await
}

#[allow(clippy::too_many_arguments)]
async fn execute_twap_slice(
    collaborators: &Collaborators<'_>,
    token: &crate::model::token::Token,
    config: &crate::model::config::TokenConfig,
    state: &mut crate::model::state::FlywheelState,
    ops_wallet: &crate::model::wallet::Wallet,
    balances: crate::venue::WalletBalances,
    item: &TwapQueueItem,
    snapshot: Option<&crate::oracle::OracleSnapshot>,
    sol_price: Option<f64>,
) {
    let token_price_usd = snapshot.map(|s| s.price_usd);
    let amount = native_amount(
        item.trade_type,
        item.slice_size,
        token_price_usd,
        sol_price,
        token.decimals,
    );
    let decision = algo::Decision {
        intent: algo::TradeIntent::Trade(algo::PlannedTrade {
            side: item.trade_type,
            amount,
            style: ExecutionStyle::Twap,
            twap_item: None,
        }),
        on_success: Default::default(),
        immediate: ImmediatePatch::default(),
    };
    match executor::execute(
        collaborators.store,
        collaborators.venue,
        collaborators.signer,
        token,
        config,
        state,
        ops_wallet,
        balances,
        decision,
    )
    .await
    {
        Ok(outcome) => log_outcome(&token.token_id.to_string(), &outcome),
        Err(err) => tracing::warn!(token_id = %token.token_id, error = %err, "twap slice execution failed"),
    }
    if let Some(slot) = state.twap_queue.iter_mut().find(|q| q.id == item.id) {
        slot.advance(Utc::now());
    }
}

fn log_outcome(token_id: &str, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Confirmed { hash } => {
            tracing::info!(token_id, %hash, "flywheel trade confirmed")
        }
        ExecutionOutcome::Skipped(reason) => {
            tracing::debug!(token_id, reason, "flywheel trade skipped")
        }
        ExecutionOutcome::Failed(reason) => {
            tracing::warn!(token_id, reason, "flywheel trade failed")
        }
    }
}

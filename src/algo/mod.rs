//! The algorithm-mode decision layer: four pure strategies (plus the
//! separately-triggered reactive mode) that compute the next [`TradeIntent`],
//! per spec section 4.7. Modeled as a closed tagged dispatch rather than open
//! polymorphism, per the design note "Dynamic dispatch over algorithm modes" —
//! adding a mode means adding a variant to [`crate::model::config::AlgorithmMode`]
//! and a match arm in [`decide`], in lockstep.

pub mod dynamic;
pub mod rebalance;
pub mod reactive;
pub mod simple;
pub mod twap_vwap;

use chrono::{DateTime, Utc};

use crate::chooser::ExecutionStyle;
use crate::detector::DetectorResult;
use crate::model::config::{AlgorithmMode, TokenConfig};
use crate::model::state::{CyclePhase, FlywheelState, MarketCondition, TradeSide, TwapQueueItem};
use crate::money::{Lamports, TokenUnits};
use crate::oracle::OracleSnapshot;

/// Balances visible to an algorithm mode at decision time.
#[derive(Debug, Clone, Copy)]
pub struct Balances {
    pub ops_sol: Lamports,
    pub ops_token: TokenUnits,
    pub token_decimals: u8,
}

/// A single planned trade, sized and styled.
#[derive(Debug, Clone)]
pub struct PlannedTrade {
    pub side: TradeSide,
    /// Lamports for a buy, raw token units for a sell — see
    /// [`crate::model::transaction::Transaction::amount`].
    pub amount: u64,
    pub style: ExecutionStyle,
    pub twap_item: Option<TwapQueueItem>,
}

#[derive(Debug, Clone)]
pub enum TradeIntent {
    Trade(PlannedTrade),
    Skip(String),
}

/// A state mutation an algorithm mode wants to apply. `on_success` fields
/// apply only once the planned trade is confirmed by the executor;
/// `immediate` fields (condition bookkeeping, an extreme-volatility pause)
/// apply regardless of whether a trade was even attempted, since they are
/// not contingent on trade execution — spec section 4.8 step 5 ties cycle
/// counters to the success branch, while section 4.7's dynamic-mode pause is
/// part of the SKIP decision itself.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub cycle_phase: Option<CyclePhase>,
    pub buy_count: Option<u32>,
    pub sell_count: Option<u32>,
    pub sell_phase_token_snapshot: Option<TokenUnits>,
    pub sell_amount_per_tx: Option<TokenUnits>,
    pub reserve_balance_sol: Option<Lamports>,
    /// Set only by the buy that crosses the `N_buy` boundary: the ops token
    /// balance as read *before* this buy executes. `sell_phase_token_snapshot`/
    /// `sell_amount_per_tx` above are placeholders computed from that
    /// pre-trade balance; the executor corrects both to include this trade's
    /// own output (spec section 8 scenario S1: "token balance after 5 buys")
    /// before applying the patch, since the decision is made before the
    /// trade that produces the tokens being snapshotted has even executed.
    pub boundary_buy_pre_trade_token: Option<TokenUnits>,
}

#[derive(Debug, Clone, Default)]
pub struct ImmediatePatch {
    pub market_condition: Option<MarketCondition>,
    pub previous_market_condition: Option<MarketCondition>,
    pub last_condition_change_at: Option<DateTime<Utc>>,
    pub paused_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub intent: TradeIntent,
    pub on_success: StatePatch,
    pub immediate: ImmediatePatch,
}

impl StatePatch {
    /// Corrects a boundary buy's placeholder `sell_phase_token_snapshot`/
    /// `sell_amount_per_tx` to include the tokens this trade itself just
    /// produced, once the executor knows the confirmed trade's actual token
    /// output. No-op unless [`Self::boundary_buy_pre_trade_token`] is set.
    pub fn resolve_boundary_snapshot(&mut self, trade_output_token: u64, n_sell: u32) {
        let Some(pre_trade) = self.boundary_buy_pre_trade_token else {
            return;
        };
        let post_trade = TokenUnits(pre_trade.0.saturating_add(trade_output_token));
        self.sell_phase_token_snapshot = Some(post_trade);
        self.sell_amount_per_tx = Some(TokenUnits(post_trade.0 / n_sell.max(1) as u64));
    }

    pub fn apply(&self, state: &mut FlywheelState) {
        if let Some(v) = self.cycle_phase {
            state.cycle_phase = v;
        }
        if let Some(v) = self.buy_count {
            state.buy_count = v;
        }
        if let Some(v) = self.sell_count {
            state.sell_count = v;
        }
        if let Some(v) = self.sell_phase_token_snapshot {
            state.sell_phase_token_snapshot = v;
        }
        if let Some(v) = self.sell_amount_per_tx {
            state.sell_amount_per_tx = v;
        }
        if let Some(v) = self.reserve_balance_sol {
            state.reserve_balance_sol = v;
        }
    }
}

impl ImmediatePatch {
    pub fn apply(&self, state: &mut FlywheelState) {
        if let Some(v) = self.market_condition {
            if state.market_condition != Some(v) {
                state.previous_market_condition = state.market_condition;
                state.last_condition_change_at = self.last_condition_change_at;
            }
            state.market_condition = Some(v);
        }
        if let Some(v) = self.paused_until {
            state.paused_until = Some(v);
        }
    }
}

/// Bookkeeping-only patch recording a freshly detected condition, applied by
/// the scheduler every tick before invoking the algorithm mode (market
/// condition is tracked for all modes, not just Dynamic).
pub fn condition_bookkeeping(detector: &DetectorResult, now: DateTime<Utc>) -> ImmediatePatch {
    ImmediatePatch {
        market_condition: Some(detector.condition),
        previous_market_condition: None,
        last_condition_change_at: Some(now),
        paused_until: None,
    }
}

/// Dispatches to one of the four scheduler-invoked strategies. `turbo_lite`
/// is a lighter-weight variant of Simple that always executes instantly,
/// skipping the execution-style chooser entirely — see `DESIGN.md` for the
/// resolution of this open question (the mode appears in the config domain
/// in spec section 3 but section 4.7 does not describe it).
#[allow(clippy::too_many_arguments)]
pub fn decide(
    mode: AlgorithmMode,
    config: &TokenConfig,
    state: &FlywheelState,
    oracle: Option<&OracleSnapshot>,
    sol_price_usd: Option<f64>,
    condition: MarketCondition,
    balances: Balances,
    now: DateTime<Utc>,
) -> Decision {
    match mode {
        AlgorithmMode::Simple => simple::decide(config, state, balances),
        AlgorithmMode::TurboLite => simple::decide_lite(config, state, balances),
        AlgorithmMode::Rebalance => {
            rebalance::decide(config, state, oracle, sol_price_usd, balances)
        }
        AlgorithmMode::TwapVwap => {
            twap_vwap::decide(config, state, oracle, sol_price_usd, balances, now)
        }
        AlgorithmMode::Dynamic => {
            dynamic::decide(config, state, oracle, sol_price_usd, condition, balances, now)
        }
    }
}

//! TWAP/VWAP mode: sizes the next trade with the same buy/sell cycle
//! mechanics as Simple, then routes it through the execution-style chooser
//! (spec section 4.6) to decide `twap`, `vwap`, or an `instant` fallback —
//! spec section 4.7 "TWAP/VWAP" describes only the chooser hand-off, not an
//! independent sizing rule, so sizing is grounded in the same cycle model
//! the rest of the config (`buyPercent`/`sellPercent`/cycle counters) already
//! implies. The chooser works in SOL-equivalent terms regardless of side
//! (spec section 4.6's `intendedAmountSol`), so a sell's token-denominated
//! size is converted to its SOL value before the chooser runs and converted
//! back afterward.

use chrono::{DateTime, Utc};

use crate::chooser::{choose_execution_style, native_amount, sol_equivalent};
use crate::model::config::TokenConfig;
use crate::model::state::FlywheelState;
use crate::oracle::OracleSnapshot;

use super::{simple, Balances, Decision, PlannedTrade, TradeIntent};

pub fn decide(
    config: &TokenConfig,
    state: &FlywheelState,
    oracle: Option<&OracleSnapshot>,
    sol_price_usd: Option<f64>,
    balances: Balances,
    now: DateTime<Utc>,
) -> Decision {
    let base = simple::decide(config, state, balances);
    let TradeIntent::Trade(base_trade) = base.intent else {
        return base;
    };

    let token_price_usd = oracle.map(|o| o.price_usd);
    let Some(intended) = sol_equivalent(
        base_trade.side,
        base_trade.amount,
        token_price_usd,
        sol_price_usd,
        balances.token_decimals,
    ) else {
        // No price to convert a sell's size into SOL terms; fall back to the
        // unstyled base trade rather than guess at a conversion.
        return base;
    };

    let volume_24h_usd = oracle.map(|o| o.volume_24h_usd).unwrap_or(0.0);
    let chosen = choose_execution_style(
        config,
        intended,
        base_trade.side,
        balances.ops_sol,
        sol_price_usd,
        volume_24h_usd,
        now,
    );

    let amount = native_amount(
        base_trade.side,
        chosen.amount,
        token_price_usd,
        sol_price_usd,
        balances.token_decimals,
    );

    Decision {
        intent: TradeIntent::Trade(PlannedTrade {
            side: base_trade.side,
            amount,
            style: chosen.style,
            twap_item: chosen.enqueue,
        }),
        on_success: base.on_success,
        immediate: base.immediate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chooser::ExecutionStyle;
    use crate::money::{Lamports, TokenUnits};

    #[test]
    fn routes_through_chooser_vwap() {
        let mut config = TokenConfig::default();
        config.vwap_enabled = true;
        config.vwap_min_volume_usd = 0.0;
        config.vwap_participation_rate = 10.0;
        config.min_buy_sol = Lamports::from_sol(0.01);
        config.max_buy_sol = Lamports::from_sol(5.0);

        let state = FlywheelState::default();
        let balances = Balances {
            ops_sol: Lamports::from_sol(10.0),
            ops_token: TokenUnits::ZERO,
            token_decimals: 6,
        };
        let snapshot = OracleSnapshot {
            price_usd: 0.01,
            price_change_24h_percent: 0.0,
            volume_24h_usd: 1_440_000.0,
            liquidity_usd: 0.0,
            short_ema: None,
            long_ema: None,
            rsi14: None,
            volatility: None,
        };
        let decision = decide(
            &config,
            &state,
            Some(&snapshot),
            Some(0.01),
            balances,
            Utc::now(),
        );
        let TradeIntent::Trade(trade) = decision.intent else {
            panic!("expected a trade")
        };
        assert_eq!(trade.style, ExecutionStyle::Vwap);
    }
}

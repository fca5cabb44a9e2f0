//! Simple mode: a deterministic rotating buy/sell cycle, per spec section
//! 4.7 "Simple".

use crate::chooser::ExecutionStyle;
use crate::model::config::TokenConfig;
use crate::model::state::{CyclePhase, FlywheelState, TradeSide};
use crate::money::Lamports;

use super::{Balances, Decision, ImmediatePatch, PlannedTrade, StatePatch, TradeIntent};

pub fn decide(config: &TokenConfig, state: &FlywheelState, balances: Balances) -> Decision {
    build(config, state, balances, true)
}

/// `turbo_lite`: identical cycle mechanics, but always instant — no chooser
/// invocation, no TWAP/VWAP enqueueing. See `DESIGN.md`.
pub fn decide_lite(config: &TokenConfig, state: &FlywheelState, balances: Balances) -> Decision {
    build(config, state, balances, false)
}

fn build(config: &TokenConfig, state: &FlywheelState, balances: Balances, _styled: bool) -> Decision {
    match state.cycle_phase {
        CyclePhase::Buy => {
            let raw = Lamports(
                (balances.ops_sol.0 as u128 * config.buy_percent as u128 / 100) as u64,
            );
            let amount = raw.max(config.min_buy_sol).min(config.max_buy_sol);

            let next_buy_count = state.buy_count + 1;
            let mut patch = StatePatch {
                buy_count: Some(next_buy_count),
                ..Default::default()
            };
            if next_buy_count >= config.n_buy {
                patch.cycle_phase = Some(CyclePhase::Sell);
                // Placeholders from the pre-trade balance; the executor
                // replaces both with post-trade values once this buy's own
                // token output is known (see `resolve_boundary_snapshot`).
                patch.sell_phase_token_snapshot = Some(balances.ops_token);
                let n_sell = config.n_sell.max(1);
                patch.sell_amount_per_tx = Some(crate::money::TokenUnits(
                    balances.ops_token.0 / n_sell as u64,
                ));
                patch.boundary_buy_pre_trade_token = Some(balances.ops_token);
            }

            Decision {
                intent: TradeIntent::Trade(PlannedTrade {
                    side: TradeSide::Buy,
                    amount: amount.0,
                    style: ExecutionStyle::Instant,
                    twap_item: None,
                }),
                on_success: patch,
                immediate: ImmediatePatch::default(),
            }
        }
        CyclePhase::Sell => {
            let amount = state.sell_amount_per_tx;
            let next_sell_count = state.sell_count + 1;

            let patch = if next_sell_count >= config.n_sell {
                StatePatch {
                    cycle_phase: Some(CyclePhase::Buy),
                    buy_count: Some(0),
                    sell_count: Some(0),
                    ..Default::default()
                }
            } else {
                StatePatch {
                    sell_count: Some(next_sell_count),
                    ..Default::default()
                }
            };

            Decision {
                intent: TradeIntent::Trade(PlannedTrade {
                    side: TradeSide::Sell,
                    amount: amount.0,
                    style: ExecutionStyle::Instant,
                    twap_item: None,
                }),
                on_success: patch,
                immediate: ImmediatePatch::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::TokenUnits;

    fn config() -> TokenConfig {
        let mut c = TokenConfig::default();
        c.n_buy = 5;
        c.n_sell = 5;
        c.buy_percent = 20;
        c.min_buy_sol = Lamports::from_sol(0.01);
        c.max_buy_sol = Lamports::from_sol(0.05);
        c
    }

    #[test]
    fn s1_simple_cycle_completes() {
        let config = config();
        let mut state = FlywheelState::default();
        let balances = Balances {
            ops_sol: Lamports::from_sol(1.0),
            ops_token: TokenUnits::ZERO,
            token_decimals: 6,
        };

        for i in 0..5 {
            let decision = decide(&config, &state, balances);
            let TradeIntent::Trade(trade) = decision.intent else {
                panic!("expected a trade")
            };
            assert_eq!(trade.side, TradeSide::Buy);
            assert!(trade.amount >= config.min_buy_sol.0 && trade.amount <= config.max_buy_sol.0);
            decision.on_success.apply(&mut state);
            assert_eq!(state.buy_count, i + 1);
        }
        assert_eq!(state.cycle_phase, CyclePhase::Sell);
        assert_eq!(state.buy_count, 5);

        let balances_after_buys = Balances {
            ops_sol: balances.ops_sol,
            ops_token: TokenUnits::from_decimal(500.0, 6),
            token_decimals: 6,
        };
        state.sell_phase_token_snapshot = balances_after_buys.ops_token;
        state.sell_amount_per_tx =
            TokenUnits(balances_after_buys.ops_token.0 / config.n_sell as u64);

        for i in 0..5 {
            let decision = decide(&config, &state, balances_after_buys);
            let TradeIntent::Trade(trade) = decision.intent else {
                panic!("expected a trade")
            };
            assert_eq!(trade.side, TradeSide::Sell);
            assert_eq!(trade.amount, state.sell_amount_per_tx.0);
            decision.on_success.apply(&mut state);
            if i < 4 {
                assert_eq!(state.sell_count, i + 1);
            }
        }
        assert_eq!(state.cycle_phase, CyclePhase::Buy);
        assert_eq!(state.buy_count, 0);
        assert_eq!(state.sell_count, 0);
    }
}

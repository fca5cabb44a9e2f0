//! Dynamic mode: condition-adaptive sizing, per spec section 4.7 "Dynamic".

use chrono::{DateTime, Utc};

use crate::chooser::{choose_execution_style, native_amount, sol_equivalent};
use crate::model::config::TokenConfig;
use crate::model::state::{CyclePhase, FlywheelState, MarketCondition, TradeSide};
use crate::money::Lamports;
use crate::oracle::OracleSnapshot;

use super::{Balances, Decision, ImmediatePatch, PlannedTrade, StatePatch, TradeIntent};

#[allow(clippy::too_many_arguments)]
pub fn decide(
    config: &TokenConfig,
    state: &FlywheelState,
    oracle: Option<&OracleSnapshot>,
    sol_price_usd: Option<f64>,
    condition: MarketCondition,
    balances: Balances,
    now: DateTime<Utc>,
) -> Decision {
    if condition == MarketCondition::ExtremeVolatility && config.pause_on_extreme_volatility {
        return Decision {
            intent: TradeIntent::Skip("dynamic: extreme volatility pause".to_string()),
            on_success: StatePatch::default(),
            immediate: ImmediatePatch {
                paused_until: Some(
                    now + chrono::Duration::seconds(config.volatility_pause_seconds),
                ),
                ..Default::default()
            },
        };
    }

    let no_trade = |reason: &str| Decision {
        intent: TradeIntent::Skip(reason.to_string()),
        on_success: StatePatch::default(),
        immediate: ImmediatePatch::default(),
    };

    let token_price_usd = oracle.map(|o| o.price_usd);

    match condition {
        MarketCondition::Pump => {
            // Spec section 4.7 only pins the reserve cut down for the
            // `buybackBoostOnDump`-disabled case; pump reserves always use
            // `reservePercentNormal` since the boost flag's documented effect
            // is specific to the dump branch. See DESIGN.md.
            let sellable_token = scale_token(balances.ops_token.0, config.max_sell_percent);
            let reserve_cut = scale_token(sellable_token, config.reserve_percent_normal);
            let amount = sellable_token.saturating_sub(reserve_cut);
            if amount == 0 {
                return no_trade("dynamic: pump, nothing sellable after reserve cut");
            }
            styled_trade(
                config,
                TradeSide::Sell,
                amount,
                token_price_usd,
                sol_price_usd,
                balances,
                now,
            )
        }
        MarketCondition::Dump => {
            let base_amount = scale_lamports(balances.ops_sol, config.buy_percent);
            let boosted = if config.buyback_boost_on_dump {
                base_amount + state.reserve_balance_sol
            } else {
                base_amount
            };
            let amount = boosted.min(balances.ops_sol);
            if amount.0 == 0 {
                return no_trade("dynamic: dump, no ops sol available to buy");
            }
            let mut decision = styled_trade(
                config,
                TradeSide::Buy,
                amount.0,
                token_price_usd,
                sol_price_usd,
                balances,
                now,
            );
            if config.buyback_boost_on_dump {
                decision.on_success.reserve_balance_sol = Some(Lamports::ZERO);
            }
            decision
        }
        MarketCondition::Ranging => {
            let side = match state.cycle_phase {
                CyclePhase::Buy => TradeSide::Buy,
                CyclePhase::Sell => TradeSide::Sell,
            };
            let small_percent = config.min_sell_percent.max(1);
            let amount = match side {
                TradeSide::Buy => scale_lamports(balances.ops_sol, small_percent).0,
                TradeSide::Sell => scale_token(balances.ops_token.0, small_percent),
            };
            if amount == 0 {
                return no_trade("dynamic: ranging, nothing to trade at small size");
            }
            let mut decision = styled_trade(
                config,
                side,
                amount,
                token_price_usd,
                sol_price_usd,
                balances,
                now,
            );
            decision.on_success.cycle_phase = Some(match side {
                TradeSide::Buy => CyclePhase::Sell,
                TradeSide::Sell => CyclePhase::Buy,
            });
            decision
        }
        MarketCondition::Normal => super::simple::decide(config, state, balances),
        MarketCondition::ExtremeVolatility => {
            // pauseOnExtremeVolatility disabled: fall through to normal sizing.
            super::simple::decide(config, state, balances)
        }
    }
}

fn scale_token(amount: u64, percent: u8) -> u64 {
    (amount as u128 * percent as u128 / 100) as u64
}

fn scale_lamports(amount: Lamports, percent: u8) -> Lamports {
    Lamports((amount.0 as u128 * percent as u128 / 100) as u64)
}

#[allow(clippy::too_many_arguments)]
fn styled_trade(
    config: &TokenConfig,
    side: TradeSide,
    native: u64,
    token_price_usd: Option<f64>,
    sol_price_usd: Option<f64>,
    balances: Balances,
    now: DateTime<Utc>,
) -> Decision {
    let intended = sol_equivalent(
        side,
        native,
        token_price_usd,
        sol_price_usd,
        balances.token_decimals,
    )
    .unwrap_or(Lamports(native));

    let chosen = choose_execution_style(
        config,
        intended,
        side,
        balances.ops_sol,
        sol_price_usd,
        0.0,
        now,
    );
    let amount = native_amount(
        side,
        chosen.amount,
        token_price_usd,
        sol_price_usd,
        balances.token_decimals,
    );

    Decision {
        intent: TradeIntent::Trade(PlannedTrade {
            side,
            amount,
            style: chosen.style,
            twap_item: chosen.enqueue,
        }),
        on_success: StatePatch::default(),
        immediate: ImmediatePatch::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::TokenUnits;

    fn snapshot(change: f64, volatility: f64) -> OracleSnapshot {
        OracleSnapshot {
            price_usd: 0.001,
            price_change_24h_percent: change,
            volume_24h_usd: 0.0,
            liquidity_usd: 0.0,
            short_ema: None,
            long_ema: None,
            rsi14: Some(50.0),
            volatility: Some(volatility),
        }
    }

    fn balances() -> Balances {
        Balances {
            ops_sol: Lamports::from_sol(10.0),
            ops_token: TokenUnits::from_decimal(100_000.0, 6),
            token_decimals: 6,
        }
    }

    #[test]
    fn extreme_volatility_pauses() {
        let config = TokenConfig::default();
        let state = FlywheelState::default();
        let snap = snapshot(0.0, 20.0);
        let now = Utc::now();
        let decision = decide(
            &config,
            &state,
            Some(&snap),
            Some(1.0),
            MarketCondition::ExtremeVolatility,
            balances(),
            now,
        );
        assert!(matches!(decision.intent, TradeIntent::Skip(_)));
        assert!(decision.immediate.paused_until.unwrap() > now);
    }

    #[test]
    fn pump_triggers_sell() {
        let config = TokenConfig::default();
        let state = FlywheelState::default();
        let snap = snapshot(12.0, 5.0);
        let decision = decide(
            &config,
            &state,
            Some(&snap),
            Some(1.0),
            MarketCondition::Pump,
            balances(),
            Utc::now(),
        );
        let TradeIntent::Trade(trade) = decision.intent else {
            panic!("expected a trade")
        };
        assert_eq!(trade.side, TradeSide::Sell);
    }

    #[test]
    fn dump_boosts_buy_with_reserve() {
        let mut config = TokenConfig::default();
        config.buyback_boost_on_dump = true;
        let mut state = FlywheelState::default();
        state.reserve_balance_sol = Lamports::from_sol(1.0);
        let snap = snapshot(-12.0, 5.0);
        let decision = decide(
            &config,
            &state,
            Some(&snap),
            Some(1.0),
            MarketCondition::Dump,
            balances(),
            Utc::now(),
        );
        let TradeIntent::Trade(trade) = decision.intent else {
            panic!("expected a trade")
        };
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(decision.on_success.reserve_balance_sol, Some(Lamports::ZERO));
    }
}

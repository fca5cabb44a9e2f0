//! Rebalance mode: maintains a target SOL:token portfolio ratio, per spec
//! section 4.7 "Rebalance".

use crate::chooser::ExecutionStyle;
use crate::model::config::TokenConfig;
use crate::model::state::{FlywheelState, TradeSide};
use crate::money::Lamports;
use crate::oracle::OracleSnapshot;

use super::{Balances, Decision, ImmediatePatch, PlannedTrade, StatePatch, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Urgency {
    Low,
    Medium,
    High,
}

fn urgency_for(abs_deviation: f64) -> Urgency {
    if abs_deviation >= 30.0 {
        Urgency::High
    } else if abs_deviation >= 15.0 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

pub fn decide(
    config: &TokenConfig,
    _state: &FlywheelState,
    oracle: Option<&OracleSnapshot>,
    sol_price_usd: Option<f64>,
    balances: Balances,
) -> Decision {
    let no_trade = |reason: &str| Decision {
        intent: TradeIntent::Skip(reason.to_string()),
        on_success: StatePatch::default(),
        immediate: ImmediatePatch::default(),
    };

    let (Some(oracle), Some(sol_price_usd)) = (oracle, sol_price_usd) else {
        return no_trade("rebalance: no price data available");
    };

    let sol_value_usd = balances.ops_sol.to_sol() * sol_price_usd;
    let token_value_usd =
        balances.ops_token.to_decimal(balances.token_decimals) * oracle.price_usd;
    let total_usd = sol_value_usd + token_value_usd;
    if total_usd <= 0.0 {
        return no_trade("rebalance: zero portfolio value");
    }

    let current_sol_pct = sol_value_usd / total_usd * 100.0;
    let target_sol_pct = config.target_sol_allocation as f64;
    let deviation = current_sol_pct - target_sol_pct;

    if deviation.abs() < config.rebalance_threshold as f64 {
        return no_trade("rebalance: deviation within threshold (in-band)");
    }

    let urgency = urgency_for(deviation.abs());
    let rsi = oracle.rsi14.unwrap_or(50.0);
    if urgency != Urgency::High {
        if deviation > 0.0 && rsi > 75.0 {
            return no_trade("rebalance: suppressing buy, RSI overbought in non-high urgency");
        }
        if deviation < 0.0 && rsi < 25.0 {
            return no_trade("rebalance: suppressing sell, RSI oversold in non-high urgency");
        }
    }

    let gap_usd = (deviation.abs() / 100.0) * total_usd;
    let cap_usd = total_usd * (config.max_rebalance_pct as f64 / 100.0);
    let size_usd = gap_usd.min(cap_usd);
    let size_sol = Lamports::from_sol(size_usd / sol_price_usd);

    let side = if deviation > 0.0 {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };
    let amount = match side {
        TradeSide::Buy => size_sol.min(balances.ops_sol).0,
        TradeSide::Sell => {
            let token_amount_decimal = size_usd / oracle.price_usd.max(f64::EPSILON);
            crate::money::TokenUnits::from_decimal(token_amount_decimal, balances.token_decimals)
                .0
                .min(balances.ops_token.0)
        }
    };

    Decision {
        intent: TradeIntent::Trade(PlannedTrade {
            side,
            amount,
            style: ExecutionStyle::Instant,
            twap_item: None,
        }),
        on_success: StatePatch::default(),
        immediate: ImmediatePatch::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::TokenUnits;

    fn snapshot(price_usd: f64, rsi: f64) -> OracleSnapshot {
        OracleSnapshot {
            price_usd,
            price_change_24h_percent: 0.0,
            volume_24h_usd: 0.0,
            liquidity_usd: 0.0,
            short_ema: None,
            long_ema: None,
            rsi14: Some(rsi),
            volatility: Some(1.0),
        }
    }

    #[test]
    fn in_band_deviation_skips() {
        let mut config = TokenConfig::default();
        config.target_sol_allocation = 50;
        config.target_token_allocation = 50;
        config.rebalance_threshold = 10;
        let state = FlywheelState::default();
        let balances = Balances {
            ops_sol: Lamports::from_sol(5.0),
            ops_token: TokenUnits::from_decimal(5000.0, 6),
            token_decimals: 6,
        };
        let snap = snapshot(0.001, 50.0);
        let decision = decide(&config, &state, Some(&snap), Some(1.0), balances);
        assert!(matches!(decision.intent, TradeIntent::Skip(_)));
    }

    #[test]
    fn excess_sol_triggers_buy() {
        let mut config = TokenConfig::default();
        config.target_sol_allocation = 50;
        config.target_token_allocation = 50;
        config.rebalance_threshold = 5;
        config.max_rebalance_pct = 20;
        let state = FlywheelState::default();
        let balances = Balances {
            ops_sol: Lamports::from_sol(9.0),
            ops_token: TokenUnits::from_decimal(1000.0, 6),
            token_decimals: 6,
        };
        let snap = snapshot(0.001, 50.0);
        let decision = decide(&config, &state, Some(&snap), Some(1.0), balances);
        let TradeIntent::Trade(trade) = decision.intent else {
            panic!("expected a trade")
        };
        assert_eq!(trade.side, TradeSide::Buy);
        assert!(trade.amount > 0);
    }
}

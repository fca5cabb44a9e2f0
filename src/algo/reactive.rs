//! Reactive mode: not scheduler-invoked. Triggered by the subscriber (C11) on
//! an observed external swap against a monitored token, per spec section 4.7
//! "Reactive". Produces a trade intent mirroring the observed side; cooldown
//! enforcement lives in the subscriber since it is per-token wall-clock state
//! independent of any single decision.

use crate::chooser::ExecutionStyle;
use crate::model::config::TokenConfig;
use crate::model::state::TradeSide;
use crate::money::Lamports;

use super::{Balances, Decision, ImmediatePatch, PlannedTrade, StatePatch, TradeIntent};

/// `observed_sol`: the size, in SOL, of the external swap that triggered this
/// decision. `observed_side`: the side of that external swap; the response
/// mirrors it (a buy-response to an external buy).
pub fn decide(
    config: &TokenConfig,
    observed_sol: Lamports,
    observed_side: TradeSide,
    balances: Balances,
) -> Decision {
    let no_trade = |reason: &str| Decision {
        intent: TradeIntent::Skip(reason.to_string()),
        on_success: StatePatch::default(),
        immediate: ImmediatePatch::default(),
    };

    if observed_sol < config.reactive_min_trigger_sol {
        return no_trade("reactive: observed swap below minimum trigger");
    }

    let scaled = Lamports(
        (observed_sol.0 as u128 * config.reactive_scale_percent as u128 / 100) as u64,
    );
    let ops_cap = Lamports(
        (balances.ops_sol.0 as u128 * config.reactive_max_response_percent as u128 / 100) as u64,
    );
    let response_sol = scaled.min(ops_cap);
    if response_sol.0 == 0 {
        return no_trade("reactive: response amount rounds to zero");
    }

    let amount = match observed_side {
        TradeSide::Buy => response_sol.min(balances.ops_sol).0,
        TradeSide::Sell => {
            let decimal =
                response_sol.to_sol() / balances.ops_sol.to_sol().max(f64::EPSILON)
                    * balances.ops_token.to_decimal(balances.token_decimals);
            crate::money::TokenUnits::from_decimal(decimal, balances.token_decimals)
                .0
                .min(balances.ops_token.0)
        }
    };
    if amount == 0 {
        return no_trade("reactive: sized trade rounds to zero");
    }

    Decision {
        intent: TradeIntent::Trade(PlannedTrade {
            side: observed_side,
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

    fn balances() -> Balances {
        Balances {
            ops_sol: Lamports::from_sol(10.0),
            ops_token: TokenUnits::from_decimal(50_000.0, 6),
            token_decimals: 6,
        }
    }

    #[test]
    fn below_trigger_is_ignored() {
        let mut config = TokenConfig::default();
        config.reactive_min_trigger_sol = Lamports::from_sol(0.5);
        let decision = decide(
            &config,
            Lamports::from_sol(0.1),
            TradeSide::Buy,
            balances(),
        );
        assert!(matches!(decision.intent, TradeIntent::Skip(_)));
    }

    #[test]
    fn mirrors_observed_buy_capped_by_ops_percent() {
        let mut config = TokenConfig::default();
        config.reactive_min_trigger_sol = Lamports::from_sol(0.1);
        config.reactive_scale_percent = 50;
        config.reactive_max_response_percent = 5;
        let decision = decide(
            &config,
            Lamports::from_sol(10.0),
            TradeSide::Buy,
            balances(),
        );
        let TradeIntent::Trade(trade) = decision.intent else {
            panic!("expected a trade")
        };
        assert_eq!(trade.side, TradeSide::Buy);
        // 50% of 10 SOL = 5 SOL scaled, capped by 5% of 10 SOL ops = 0.5 SOL.
        assert_eq!(trade.amount, Lamports::from_sol(0.5).0);
    }
}

//! The execution-style chooser: decides instant / time-sliced / volume-weighted
//! for a given intended trade, per spec section 4.6.
//!
//! `sol_price_usd` is the native coin's own USD price (looked up by the
//! caller against the wrapped-SOL mint through the same [`crate::oracle::PriceOracle`]
//! used for the traded token, since the oracle contract is keyed by mint and
//! not special-cased for the native asset).

use chrono::{DateTime, Utc};

use crate::model::config::TokenConfig;
use crate::model::state::{TradeSide, TwapQueueItem};
use crate::money::{Lamports, TokenUnits};

/// Converts a side-native trade amount (lamports for a buy, raw token units
/// for a sell) into its SOL-equivalent size, since the chooser's
/// `intendedAmountSol` parameter (spec section 4.6) is always SOL-denominated
/// regardless of side. Returns `None` when the conversion needs a price that
/// isn't available.
pub fn sol_equivalent(
    side: TradeSide,
    native_amount: u64,
    token_price_usd: Option<f64>,
    sol_price_usd: Option<f64>,
    token_decimals: u8,
) -> Option<Lamports> {
    match side {
        TradeSide::Buy => Some(Lamports(native_amount)),
        TradeSide::Sell => {
            let token_price_usd = token_price_usd?;
            let sol_price_usd = sol_price_usd.filter(|p| *p > 0.0)?;
            let token_value_usd = TokenUnits(native_amount).to_decimal(token_decimals) * token_price_usd;
            Some(Lamports::from_sol(token_value_usd / sol_price_usd))
        }
    }
}

/// Inverse of [`sol_equivalent`]: converts a chooser-sized SOL amount back
/// into the side-native unit for the final [`crate::algo::PlannedTrade::amount`].
pub fn native_amount(
    side: TradeSide,
    sol_amount: Lamports,
    token_price_usd: Option<f64>,
    sol_price_usd: Option<f64>,
    token_decimals: u8,
) -> u64 {
    match side {
        TradeSide::Buy => sol_amount.0,
        TradeSide::Sell => {
            let (Some(token_price_usd), Some(sol_price_usd)) = (
                token_price_usd,
                sol_price_usd.filter(|p| *p > 0.0),
            ) else {
                return sol_amount.0;
            };
            let sol_value_usd = sol_amount.to_sol() * sol_price_usd;
            TokenUnits::from_decimal(sol_value_usd / token_price_usd.max(f64::EPSILON), token_decimals).0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStyle {
    Instant,
    Twap,
    Vwap,
}

#[derive(Debug, Clone)]
pub struct ChosenExecution {
    pub style: ExecutionStyle,
    pub amount: Lamports,
    pub reason: String,
    /// Present only when `style == Twap` and more than one slice remains
    /// after the immediate one: the queue item tracking the remaining
    /// `twap_slices - 1` slices, driven by the queue on later ticks. The
    /// first slice (`amount`) has already executed immediately and must not
    /// be double-counted in this item's `slices_remaining`.
    pub enqueue: Option<TwapQueueItem>,
}

#[allow(clippy::too_many_arguments)]
pub fn choose_execution_style(
    config: &TokenConfig,
    intended: Lamports,
    side: TradeSide,
    available: Lamports,
    sol_price_usd: Option<f64>,
    volume_24h_usd: f64,
    now: DateTime<Utc>,
) -> ChosenExecution {
    let Some(sol_price_usd) = sol_price_usd.filter(|p| *p > 0.0) else {
        let capped = Lamports(intended.0 / 10).min(available);
        return ChosenExecution {
            style: ExecutionStyle::Instant,
            amount: capped,
            reason: "no oracle price data; capped fallback".to_string(),
            enqueue: None,
        };
    };

    let trade_value_usd = intended.to_sol() * sol_price_usd;

    if config.vwap_enabled && volume_24h_usd >= config.vwap_min_volume_usd {
        let per_minute_volume = volume_24h_usd / 1440.0;
        let target_usd = per_minute_volume * (config.vwap_participation_rate / 100.0);
        let target_sol = target_usd / sol_price_usd;
        let amount = Lamports::from_sol(target_sol).min(available).min(intended);
        return ChosenExecution {
            style: ExecutionStyle::Vwap,
            amount,
            reason: format!(
                "vwap: target {target_usd:.2} usd at {:.2} usd/min volume",
                per_minute_volume
            ),
            enqueue: None,
        };
    }

    if config.twap_enabled && trade_value_usd > config.twap_threshold_usd {
        let slices = config.twap_slices.max(1);
        let slice_size = Lamports(intended.0 / slices as u64);
        let interval_minutes = (config.twap_window_minutes / slices).max(1);
        // The first slice (`slice_size`) executes immediately as the return
        // value below; only the remaining `slices - 1` are queued, so the
        // queue item's `slices_remaining` must not count that first slice
        // again (spec section 8 property 6, TWAP conservation).
        let remaining = slices - 1;
        let enqueue = if remaining > 0 {
            Some(TwapQueueItem {
                id: uuid::Uuid::new_v4(),
                trade_type: side,
                total_amount: intended,
                slice_size,
                slices_remaining: remaining,
                slices_total: slices,
                next_execute_at: now + chrono::Duration::minutes(interval_minutes as i64),
                interval_minutes,
                created_at: now,
            })
        } else {
            None
        };
        return ChosenExecution {
            style: ExecutionStyle::Twap,
            amount: slice_size,
            reason: format!(
                "twap: trade value {trade_value_usd:.2} usd exceeds threshold {:.2} usd",
                config.twap_threshold_usd
            ),
            enqueue,
        };
    }

    ChosenExecution {
        style: ExecutionStyle::Instant,
        amount: intended.min(available),
        reason: "instant: no twap/vwap condition matched".to_string(),
        enqueue: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::TokenConfig;

    #[test]
    fn s5_vwap_cap_enforcement() {
        let mut config = TokenConfig::default();
        config.vwap_enabled = true;
        config.vwap_participation_rate = 10.0;
        config.vwap_min_volume_usd = 0.0;

        let intended = Lamports::from_sol(0.5);
        let available = Lamports::from_sol(1.0);
        let result = choose_execution_style(
            &config,
            intended,
            TradeSide::Buy,
            available,
            Some(0.01),
            1_440_000.0,
            Utc::now(),
        );

        assert_eq!(result.style, ExecutionStyle::Vwap);
        assert_eq!(result.amount, intended);
        assert!(result.amount <= intended);
        assert!(result.amount <= available);
    }

    #[test]
    fn no_price_data_caps_to_one_tenth() {
        let config = TokenConfig::default();
        let intended = Lamports::from_sol(1.0);
        let available = Lamports::from_sol(10.0);
        let result = choose_execution_style(
            &config,
            intended,
            TradeSide::Buy,
            available,
            None,
            0.0,
            Utc::now(),
        );
        assert_eq!(result.style, ExecutionStyle::Instant);
        assert_eq!(result.amount, Lamports::from_sol(0.1));
    }

    #[test]
    fn twap_enqueues_with_immediate_first_slice() {
        let mut config = TokenConfig::default();
        config.twap_enabled = true;
        config.twap_threshold_usd = 1.0;
        config.twap_slices = 4;
        config.twap_window_minutes = 60;

        let intended = Lamports::from_sol(1.0);
        let available = Lamports::from_sol(10.0);
        let now = Utc::now();
        let result = choose_execution_style(
            &config,
            intended,
            TradeSide::Sell,
            available,
            Some(100.0),
            0.0,
            now,
        );
        assert_eq!(result.style, ExecutionStyle::Twap);
        let item = result.enqueue.expect("twap enqueues a queue item");
        // Slice 0 already executed as the immediate `result.amount`; the
        // queue item must only track the remaining 3 slices, never 4 — else
        // the queue conservation invariant (spec section 8 property 6) is
        // violated by over-trading one slice's worth of volume.
        assert_eq!(item.slices_remaining, 3);
        assert_eq!(item.interval_minutes, 15);
        assert!(!item.is_ready(now));
        assert_eq!(result.amount.0 * 4, intended.0);
    }

    #[test]
    fn twap_conservation_total_equals_intended() {
        let mut config = TokenConfig::default();
        config.twap_enabled = true;
        config.twap_threshold_usd = 1.0;
        config.twap_slices = 4;
        config.twap_window_minutes = 60;

        let intended = Lamports::from_sol(1.0);
        let available = Lamports::from_sol(10.0);
        let now = Utc::now();
        let result = choose_execution_style(
            &config,
            intended,
            TradeSide::Sell,
            available,
            Some(100.0),
            0.0,
            now,
        );
        let mut total = result.amount.0;
        let mut item = result.enqueue.expect("twap enqueues a queue item");
        while item.slices_remaining > 0 {
            total += item.slice_size.0;
            item.advance(item.next_execute_at);
        }
        assert_eq!(total, intended.0);
    }

    #[test]
    fn twap_single_slice_does_not_enqueue() {
        let mut config = TokenConfig::default();
        config.twap_enabled = true;
        config.twap_threshold_usd = 1.0;
        config.twap_slices = 1;
        config.twap_window_minutes = 60;

        let intended = Lamports::from_sol(1.0);
        let available = Lamports::from_sol(10.0);
        let result = choose_execution_style(
            &config,
            intended,
            TradeSide::Sell,
            available,
            Some(100.0),
            0.0,
            Utc::now(),
        );
        assert_eq!(result.style, ExecutionStyle::Twap);
        assert!(result.enqueue.is_none());
        assert_eq!(result.amount, intended);
    }
}

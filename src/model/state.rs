use serde::{Deserialize, Serialize};

use crate::money::{Lamports, TokenUnits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCondition {
    Pump,
    Dump,
    Ranging,
    Normal,
    ExtremeVolatility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A scheduled partition of a logical trade into equal time-spaced slices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwapQueueItem {
    pub id: uuid::Uuid,
    pub trade_type: TradeSide,
    pub total_amount: Lamports,
    pub slice_size: Lamports,
    pub slices_remaining: u32,
    pub slices_total: u32,
    pub next_execute_at: chrono::DateTime<chrono::Utc>,
    pub interval_minutes: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TwapQueueItem {
    pub fn is_ready(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.slices_remaining > 0 && self.next_execute_at <= now
    }

    /// Applies the effect of having just executed one slice: decrements the
    /// remaining count and advances the next execution time. Returns true if
    /// the item is now exhausted and should be removed from the queue.
    pub fn advance(&mut self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.slices_remaining = self.slices_remaining.saturating_sub(1);
        self.next_execute_at = now + chrono::Duration::minutes(self.interval_minutes as i64);
        self.slices_remaining == 0
    }
}

/// One row per [`super::token::Token`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlywheelState {
    pub cycle_phase: CyclePhase,
    pub buy_count: u32,
    pub sell_count: u32,
    pub sell_phase_token_snapshot: TokenUnits,
    pub sell_amount_per_tx: TokenUnits,
    pub last_trade_at: Option<chrono::DateTime<chrono::Utc>>,
    pub consecutive_failures: u32,
    pub last_failure_reason: Option<String>,
    pub last_failure_at: Option<chrono::DateTime<chrono::Utc>>,
    pub paused_until: Option<chrono::DateTime<chrono::Utc>>,
    pub total_failures: u64,
    pub last_checked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_check_result: Option<String>,
    pub market_condition: Option<MarketCondition>,
    pub previous_market_condition: Option<MarketCondition>,
    pub last_condition_change_at: Option<chrono::DateTime<chrono::Utc>>,
    pub reserve_balance_sol: Lamports,
    pub twap_queue: Vec<TwapQueueItem>,
}

impl Default for FlywheelState {
    fn default() -> Self {
        FlywheelState {
            cycle_phase: CyclePhase::Buy,
            buy_count: 0,
            sell_count: 0,
            sell_phase_token_snapshot: TokenUnits::ZERO,
            sell_amount_per_tx: TokenUnits::ZERO,
            last_trade_at: None,
            consecutive_failures: 0,
            last_failure_reason: None,
            last_failure_at: None,
            paused_until: None,
            total_failures: 0,
            last_checked_at: None,
            last_check_result: None,
            market_condition: None,
            previous_market_condition: None,
            last_condition_change_at: None,
            reserve_balance_sol: Lamports::ZERO,
            twap_queue: Vec::new(),
        }
    }
}

impl FlywheelState {
    pub fn is_paused(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.paused_until.is_some_and(|until| until > now)
    }

    /// Records a successful trade: resets the failure streak and clears any pause.
    pub fn record_success(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.consecutive_failures = 0;
        self.paused_until = None;
        self.last_trade_at = Some(now);
    }

    /// Records a failure and sets the exponential pause per the executor's
    /// failure-accounting rule: `pausedUntil = now + 2^min(consecutiveFailures, 6) * baseCooldown`.
    pub fn record_failure(
        &mut self,
        reason: impl Into<String>,
        now: chrono::DateTime<chrono::Utc>,
        base_cooldown_seconds: i64,
    ) {
        self.consecutive_failures += 1;
        self.total_failures += 1;
        self.last_failure_reason = Some(reason.into());
        self.last_failure_at = Some(now);

        let exponent = self.consecutive_failures.min(6);
        let cooldown_seconds = (1i64 << exponent) * base_cooldown_seconds;
        self.paused_until = Some(now + chrono::Duration::seconds(cooldown_seconds));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twap_item_removed_exactly_when_exhausted() {
        let mut item = TwapQueueItem {
            id: uuid::Uuid::new_v4(),
            trade_type: TradeSide::Buy,
            total_amount: Lamports::from_sol(1.0),
            slice_size: Lamports::from_sol(0.5),
            slices_remaining: 2,
            slices_total: 2,
            next_execute_at: chrono::Utc::now(),
            interval_minutes: 10,
            created_at: chrono::Utc::now(),
        };
        let now = chrono::Utc::now();
        assert!(!item.advance(now));
        assert_eq!(item.slices_remaining, 1);
        assert!(item.advance(now));
        assert_eq!(item.slices_remaining, 0);
    }

    #[test]
    fn exponential_pause_caps_at_exponent_6() {
        let mut state = FlywheelState::default();
        let now = chrono::Utc::now();
        for _ in 0..10 {
            state.record_failure("broadcast_failed", now, 60);
        }
        assert_eq!(state.consecutive_failures, 10);
        let expected = now + chrono::Duration::seconds((1i64 << 6) * 60);
        assert_eq!(state.paused_until, Some(expected));
    }

    #[test]
    fn success_clears_pause_and_resets_streak() {
        let mut state = FlywheelState::default();
        let now = chrono::Utc::now();
        state.record_failure("other", now, 60);
        assert!(state.is_paused(now));
        state.record_success(now);
        assert_eq!(state.consecutive_failures, 0);
        assert!(!state.is_paused(now));
    }
}

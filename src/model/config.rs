use serde::{Deserialize, Serialize};

use crate::money::Lamports;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingRoute {
    Bags,
    Jupiter,
    /// Selects by the token's `graduated` flag.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmMode {
    Simple,
    Rebalance,
    TwapVwap,
    Dynamic,
    TurboLite,
}

/// One row per [`super::token::Token`]. Field groups mirror the option table
/// in the data model: core gates, sizing, rebalance, TWAP/VWAP, dynamic, and
/// reactive parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub flywheel_active: bool,
    pub auto_claim_enabled: bool,
    pub market_making_enabled: bool,
    pub fee_threshold_sol: Lamports,
    pub slippage_bps: u16,
    pub trading_route: TradingRoute,
    pub algorithm_mode: AlgorithmMode,

    // Sizing
    pub buy_percent: u8,
    pub sell_percent: u8,
    pub min_buy_sol: Lamports,
    pub max_buy_sol: Lamports,

    // Cycle shape
    pub n_buy: u32,
    pub n_sell: u32,

    // Rebalance
    pub target_sol_allocation: u8,
    pub target_token_allocation: u8,
    pub rebalance_threshold: u8,
    pub max_rebalance_pct: u8,

    // TWAP
    pub twap_enabled: bool,
    pub twap_slices: u32,
    pub twap_window_minutes: u32,
    pub twap_threshold_usd: f64,

    // VWAP
    pub vwap_enabled: bool,
    pub vwap_participation_rate: f64,
    pub vwap_min_volume_usd: f64,

    // Dynamic
    pub dynamic_fee_enabled: bool,
    pub reserve_percent_normal: u8,
    pub reserve_percent_adverse: u8,
    pub min_sell_percent: u8,
    pub max_sell_percent: u8,
    pub buyback_boost_on_dump: bool,
    pub pause_on_extreme_volatility: bool,
    pub volatility_pause_threshold: f64,
    pub volatility_pause_seconds: i64,

    // Reactive
    pub reactive_enabled: bool,
    pub reactive_min_trigger_sol: Lamports,
    pub reactive_scale_percent: u8,
    pub reactive_max_response_percent: u8,
    pub reactive_cooldown_ms: u64,

    // Failure handling
    pub base_cooldown_seconds: i64,

    // Claim
    pub platform_fee_percent: f64,

    /// Open question in design notes: whether the claim scheduler should
    /// also honor `pausedUntil`. Default false (claims run regardless of
    /// trading pauses), surfaced here as a config flag per design note.
    pub claim_honors_pause: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig {
            flywheel_active: true,
            auto_claim_enabled: true,
            market_making_enabled: true,
            fee_threshold_sol: Lamports::from_sol(0.05),
            slippage_bps: 100,
            trading_route: TradingRoute::Auto,
            algorithm_mode: AlgorithmMode::Simple,

            buy_percent: 20,
            sell_percent: 20,
            min_buy_sol: Lamports::from_sol(0.01),
            max_buy_sol: Lamports::from_sol(0.05),

            n_buy: 5,
            n_sell: 5,

            target_sol_allocation: 50,
            target_token_allocation: 50,
            rebalance_threshold: 10,
            max_rebalance_pct: 20,

            twap_enabled: false,
            twap_slices: 4,
            twap_window_minutes: 60,
            twap_threshold_usd: 500.0,

            vwap_enabled: false,
            vwap_participation_rate: 10.0,
            vwap_min_volume_usd: 10_000.0,

            dynamic_fee_enabled: false,
            reserve_percent_normal: 20,
            reserve_percent_adverse: 10,
            min_sell_percent: 5,
            max_sell_percent: 30,
            buyback_boost_on_dump: true,
            pause_on_extreme_volatility: true,
            volatility_pause_threshold: 15.0,
            volatility_pause_seconds: 900,

            reactive_enabled: false,
            reactive_min_trigger_sol: Lamports::from_sol(0.1),
            reactive_scale_percent: 10,
            reactive_max_response_percent: 5,
            reactive_cooldown_ms: 30_000,

            base_cooldown_seconds: 60,
            platform_fee_percent: 10.0,
            claim_honors_pause: false,
        }
    }
}

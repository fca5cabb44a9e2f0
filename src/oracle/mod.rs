//! The Price oracle: 24h price change, volume, and a rolling-window-derived
//! `shortEma`/`longEma`/`rsi14`/`volatility` per mint, per spec section 4.4.
//!
//! Trend outputs stay `None` until a mint has accumulated at least
//! [`MIN_SAMPLES_FOR_TRENDS`] samples; the backing series is a FIFO ring
//! bounded at [`MAX_SERIES_LEN`] points.

pub mod http;
pub mod mock;

use async_trait::async_trait;

/// Minimum samples before `short_ema`/`long_ema`/`rsi14`/`volatility` are non-null.
pub const MIN_SAMPLES_FOR_TRENDS: usize = 20;
/// Bound on the per-mint rolling price series; oldest points are evicted first.
pub const MAX_SERIES_LEN: usize = 1000;

const SHORT_EMA_PERIOD: usize = 12;
const LONG_EMA_PERIOD: usize = 26;
const RSI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OracleSnapshot {
    pub price_usd: f64,
    pub price_change_24h_percent: f64,
    pub volume_24h_usd: f64,
    pub liquidity_usd: f64,
    pub short_ema: Option<f64>,
    pub long_ema: Option<f64>,
    pub rsi14: Option<f64>,
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("price oracle unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Returns `Ok(None)` when the venue has no price data for this mint yet
    /// (chooser rule 4.6.1: "if oracle returns no price data"), distinct from
    /// a hard failure.
    async fn snapshot(&self, mint: &str) -> Result<Option<OracleSnapshot>, OracleError>;
}

/// Computes EMA over a price series using the standard recursive smoothing
/// factor `alpha = 2 / (period + 1)`, seeded by a simple average of the first
/// `period` points.
pub fn ema(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    let mut value = seed;
    for price in &prices[period..] {
        value = alpha * price + (1.0 - alpha) * value;
    }
    Some(value)
}

/// Wilder's RSI over the trailing `period + 1` prices (needs `period` deltas).
pub fn rsi(prices: &[f64], period: usize) -> Option<f64> {
    if prices.len() < period + 1 {
        return None;
    }
    let window = &prices[prices.len() - (period + 1)..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let delta = pair[1] - pair[0];
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Volatility as the standard deviation of percentage returns over the
/// series, expressed in percentage points (so `15.0` means +-15%).
pub fn volatility(prices: &[f64]) -> Option<f64> {
    if prices.len() < MIN_SAMPLES_FOR_TRENDS {
        return None;
    }
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0] * 100.0)
        .collect();
    if returns.is_empty() {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    Some(variance.sqrt())
}

/// Derives the trend fields (`short_ema`, `long_ema`, `rsi14`, `volatility`)
/// from a price series, applying the minimum-sample gate uniformly.
pub fn trend_outputs(prices: &[f64]) -> (Option<f64>, Option<f64>, Option<f64>, Option<f64>) {
    if prices.len() < MIN_SAMPLES_FOR_TRENDS {
        return (None, None, None, None);
    }
    (
        ema(prices, SHORT_EMA_PERIOD),
        ema(prices, LONG_EMA_PERIOD),
        rsi(prices, RSI_PERIOD),
        volatility(prices),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_minimum_samples_yields_no_trend() {
        let prices: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        let (short, long, rsi14, vol) = trend_outputs(&prices);
        assert!(short.is_none() && long.is_none() && rsi14.is_none() && vol.is_none());
    }

    #[test]
    fn monotonic_rise_gives_rsi_100() {
        let prices: Vec<f64> = (0..30).map(|i| 1.0 + i as f64 * 0.01).collect();
        let r = rsi(&prices, RSI_PERIOD).unwrap();
        assert!((r - 100.0).abs() < 1e-9);
    }

    #[test]
    fn monotonic_fall_gives_rsi_0() {
        let prices: Vec<f64> = (0..30).map(|i| 10.0 - i as f64 * 0.01).collect();
        let r = rsi(&prices, RSI_PERIOD).unwrap();
        assert!(r.abs() < 1e-9);
    }

    #[test]
    fn flat_series_has_zero_volatility() {
        let prices = vec![1.0; MIN_SAMPLES_FOR_TRENDS];
        assert_eq!(volatility(&prices), Some(0.0));
    }
}

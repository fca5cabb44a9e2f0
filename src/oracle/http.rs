use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use crate::retry::retry;

use super::{trend_outputs, OracleError, OracleSnapshot, PriceOracle, MAX_SERIES_LEN};

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(rename = "priceUsd")]
    price_usd: Option<f64>,
    #[serde(rename = "priceChange24hPercent")]
    price_change_24h_percent: Option<f64>,
    #[serde(rename = "volume24hUsd")]
    volume_24h_usd: Option<f64>,
    #[serde(rename = "liquidityUsd")]
    liquidity_usd: Option<f64>,
}

/// Price oracle reached over HTTPS, maintaining a per-mint rolling price
/// series in-process to derive `short_ema`/`long_ema`/`rsi14`/`volatility`,
/// since the remote feed itself is read-side-only (spec section 4.4).
pub struct HttpPriceOracle {
    client: reqwest::Client,
    base_url: String,
    series: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl HttpPriceOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpPriceOracle {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            series: Mutex::new(HashMap::new()),
        }
    }

    fn record_and_snapshot(&self, mint: &str, price: f64) -> Vec<f64> {
        let mut series = self.series.lock().unwrap();
        let entry = series.entry(mint.to_string()).or_default();
        entry.push_back(price);
        while entry.len() > MAX_SERIES_LEN {
            entry.pop_front();
        }
        entry.iter().copied().collect()
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn snapshot(&self, mint: &str) -> Result<Option<OracleSnapshot>, OracleError> {
        let url = format!("{}/price/{}", self.base_url, mint);
        let resp: PriceResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            async move {
                client
                    .get(&url)
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| e.to_string())?
                    .json::<PriceResponse>()
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(OracleError::Unavailable)?;

        let Some(price_usd) = resp.price_usd else {
            return Ok(None);
        };

        let prices = self.record_and_snapshot(mint, price_usd);
        let (short_ema, long_ema, rsi14, volatility) = trend_outputs(&prices);

        Ok(Some(OracleSnapshot {
            price_usd,
            price_change_24h_percent: resp.price_change_24h_percent.unwrap_or(0.0),
            volume_24h_usd: resp.volume_24h_usd.unwrap_or(0.0),
            liquidity_usd: resp.liquidity_usd.unwrap_or(0.0),
            short_ema,
            long_ema,
            rsi14,
            volatility,
        }))
    }
}

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::state::TradeSide;
use crate::money::{Lamports, TokenUnits};
use crate::retry::retry;

use super::{Position, Quote, TokenInfo, Tx, VenueClient, VenueError, WalletBalances};

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: Option<u64>,
    #[serde(rename = "routePlan")]
    route_plan: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SwapTxResponse {
    #[serde(rename = "swapTransaction")]
    swap_transaction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimTxResponse {
    transaction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferTxResponse {
    transaction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    positions: Vec<PositionDto>,
}

#[derive(Debug, Deserialize)]
struct PositionDto {
    #[serde(rename = "mintAddress")]
    mint_address: String,
    #[serde(rename = "claimableSol")]
    claimable_sol: f64,
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    mint: String,
    graduated: bool,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(rename = "solLamports")]
    sol_lamports: u64,
    #[serde(rename = "tokenRawUnits")]
    token_raw_units: u64,
}

/// Venue client reached over HTTPS, JSON body, authenticated by an API key
/// (spec section 6's `VENUE_API_KEY`). Both the bonding-curve venue ("Venue
/// B") and the generic AMM aggregator ("Venue J") speak the same shape of
/// quote/build/claim endpoints in this adapter; `tradingRoute` only changes
/// the base path, not the response contract.
pub struct HttpVenueClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVenueClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        HttpVenueClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn require_key(&self) -> Result<&str, VenueError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| VenueError::Network("venue API key not configured".to_string()))
    }
}

#[async_trait]
impl VenueClient for HttpVenueClient {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_units: u64,
        side: TradeSide,
        slippage_bps: u16,
    ) -> Result<Quote, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/quote", self.base_url);

        let resp: QuoteResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .get(&url)
                    .bearer_auth(api_key)
                    .query(&[
                        ("inputMint", input_mint),
                        ("outputMint", output_mint),
                        ("amount", &amount_units.to_string()),
                        ("side", side_str(side)),
                        ("slippageBps", &slippage_bps.to_string()),
                    ])
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<QuoteResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        let out_amount = resp.out_amount.ok_or(VenueError::QuoteUnavailable)?;
        let route_plan = resp.route_plan.ok_or(VenueError::QuoteUnavailable)?;
        Ok(Quote {
            opaque: route_plan,
            estimated_out: out_amount,
        })
    }

    async fn build_swap_tx(&self, wallet_address: &str, quote: &Quote) -> Result<Tx, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/swap", self.base_url);
        let body = serde_json::json!({
            "userPublicKey": wallet_address,
            "quoteResponse": quote.opaque,
        });

        let resp: SwapTxResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .post(&url)
                    .bearer_auth(api_key)
                    .timeout(std::time::Duration::from_secs(5))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<SwapTxResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        let encoded = resp
            .swap_transaction
            .ok_or_else(|| VenueError::BuildFailed("missing swapTransaction".to_string()))?;
        Ok(Tx(base58_decode(&encoded)
            .map_err(VenueError::BuildFailed)?))
    }

    async fn build_claim_tx(
        &self,
        dev_wallet_address: &str,
        mint_address: &str,
    ) -> Result<Tx, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/claim", self.base_url);
        let body = serde_json::json!({
            "devWalletAddress": dev_wallet_address,
            "mintAddress": mint_address,
        });

        let resp: ClaimTxResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .post(&url)
                    .bearer_auth(api_key)
                    .timeout(std::time::Duration::from_secs(5))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<ClaimTxResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        let encoded = resp
            .transaction
            .ok_or_else(|| VenueError::BuildFailed("missing claim transaction".to_string()))?;
        Ok(Tx(base58_decode(&encoded)
            .map_err(VenueError::BuildFailed)?))
    }

    async fn build_transfer_tx(
        &self,
        from_address: &str,
        to_address: &str,
        amount_lamports: u64,
    ) -> Result<Tx, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/transfer", self.base_url);
        let body = serde_json::json!({
            "fromAddress": from_address,
            "toAddress": to_address,
            "amountLamports": amount_lamports,
        });

        let resp: TransferTxResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .post(&url)
                    .bearer_auth(api_key)
                    .timeout(std::time::Duration::from_secs(5))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<TransferTxResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        let encoded = resp
            .transaction
            .ok_or_else(|| VenueError::BuildFailed("missing transfer transaction".to_string()))?;
        Ok(Tx(base58_decode(&encoded)
            .map_err(VenueError::BuildFailed)?))
    }

    async fn claimable_positions(
        &self,
        dev_wallet_address: &str,
    ) -> Result<Vec<Position>, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/positions/{}", self.base_url, dev_wallet_address);

        let resp: PositionsResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .get(&url)
                    .bearer_auth(api_key)
                    .timeout(std::time::Duration::from_secs(10))
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<PositionsResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        Ok(resp
            .positions
            .into_iter()
            .map(|p| Position {
                mint_address: p.mint_address,
                claimable: Lamports::from_sol(p.claimable_sol),
            })
            .collect())
    }

    async fn token_info(&self, mint: &str) -> Result<TokenInfo, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/token/{}", self.base_url, mint);

        let resp: TokenInfoResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let api_key = api_key.to_string();
            async move {
                client
                    .get(&url)
                    .bearer_auth(api_key)
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<TokenInfoResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        Ok(TokenInfo {
            mint: resp.mint,
            graduated: resp.graduated,
        })
    }

    async fn wallet_balances(
        &self,
        wallet_address: &str,
        mint: &str,
    ) -> Result<WalletBalances, VenueError> {
        let api_key = self.require_key()?;
        let url = format!("{}/balances/{}", self.base_url, wallet_address);

        let resp: BalancesResponse = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let api_key = api_key.to_string();
            let mint = mint.to_string();
            async move {
                client
                    .get(&url)
                    .bearer_auth(api_key)
                    .query(&[("mint", mint)])
                    .timeout(std::time::Duration::from_secs(5))
                    .send()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))?
                    .json::<BalancesResponse>()
                    .await
                    .map_err(|e| VenueError::Network(e.to_string()))
            }
        })
        .await?;

        Ok(WalletBalances {
            sol: Lamports(resp.sol_lamports),
            token: TokenUnits(resp.token_raw_units),
        })
    }
}

fn side_str(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "buy",
        TradeSide::Sell => "sell",
    }
}

fn base58_decode(s: &str) -> Result<Vec<u8>, String> {
    const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    let mut digits: Vec<u8> = vec![0];
    for c in s.chars() {
        let value = ALPHABET
            .iter()
            .position(|&b| b as char == c)
            .ok_or_else(|| format!("invalid base58 character '{c}'"))? as u32;
        let mut carry = value;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) * 58;
            *digit = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            digits.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    for c in s.chars() {
        if c == '1' {
            digits.push(0);
        } else {
            break;
        }
    }
    digits.reverse();
    Ok(digits)
}

use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::state::TradeSide;
use crate::money::{Lamports, TokenUnits};

use super::{Position, Quote, TokenInfo, Tx, VenueClient, VenueError, WalletBalances};

/// A scripted venue for tests: returns canned quotes/positions, and can be
/// told to fail the next `N` quote calls with [`VenueError::QuoteUnavailable`].
pub struct MockVenueClient {
    pub graduated: bool,
    pub positions: Mutex<Vec<Position>>,
    pub fail_next_quotes: Mutex<u32>,
    pub balances: Mutex<WalletBalances>,
}

impl Default for MockVenueClient {
    fn default() -> Self {
        MockVenueClient {
            graduated: false,
            positions: Mutex::new(Vec::new()),
            fail_next_quotes: Mutex::new(0),
            balances: Mutex::new(WalletBalances {
                sol: Lamports::ZERO,
                token: TokenUnits::ZERO,
            }),
        }
    }
}

impl MockVenueClient {
    pub fn with_position(self, mint: &str, claimable: Lamports) -> Self {
        self.positions.lock().unwrap().push(Position {
            mint_address: mint.to_string(),
            claimable,
        });
        self
    }

    pub fn with_balances(self, sol: Lamports, token: TokenUnits) -> Self {
        *self.balances.lock().unwrap() = WalletBalances { sol, token };
        self
    }
}

#[async_trait]
impl VenueClient for MockVenueClient {
    async fn quote(
        &self,
        _input_mint: &str,
        _output_mint: &str,
        amount_units: u64,
        _side: TradeSide,
        _slippage_bps: u16,
    ) -> Result<Quote, VenueError> {
        let mut fail = self.fail_next_quotes.lock().unwrap();
        if *fail > 0 {
            *fail -= 1;
            return Err(VenueError::QuoteUnavailable);
        }
        Ok(Quote {
            opaque: serde_json::json!({ "mock": true, "amount": amount_units }),
            estimated_out: amount_units,
        })
    }

    async fn build_swap_tx(&self, _wallet_address: &str, _quote: &Quote) -> Result<Tx, VenueError> {
        Ok(Tx(vec![0xde, 0xad, 0xbe, 0xef]))
    }

    async fn build_claim_tx(
        &self,
        _dev_wallet_address: &str,
        _mint_address: &str,
    ) -> Result<Tx, VenueError> {
        Ok(Tx(vec![0xca, 0xfe]))
    }

    async fn build_transfer_tx(
        &self,
        _from_address: &str,
        _to_address: &str,
        _amount_lamports: u64,
    ) -> Result<Tx, VenueError> {
        Ok(Tx(vec![0xfe, 0xed]))
    }

    async fn claimable_positions(
        &self,
        _dev_wallet_address: &str,
    ) -> Result<Vec<Position>, VenueError> {
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn token_info(&self, mint: &str) -> Result<TokenInfo, VenueError> {
        Ok(TokenInfo {
            mint: mint.to_string(),
            graduated: self.graduated,
        })
    }

    async fn wallet_balances(
        &self,
        _wallet_address: &str,
        _mint: &str,
    ) -> Result<WalletBalances, VenueError> {
        Ok(*self.balances.lock().unwrap())
    }
}

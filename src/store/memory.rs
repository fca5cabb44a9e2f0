use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use crate::model::claim::ClaimHistory;
use crate::model::config::TokenConfig;
use crate::model::state::FlywheelState;
use crate::model::token::{Token, TokenId};
use crate::model::transaction::Transaction;
use crate::model::wallet::Wallet;

use super::{LeaseHandle, Patch, Store, StoreError, TokenView};

struct Row {
    token: Token,
    config: TokenConfig,
    state: FlywheelState,
}

/// An in-process Store used for tests and the mock-collaborator integration
/// suite. Tracks one exclusive lease per token via a held-since timestamp
/// rather than relying purely on mutex-guard lifetime, so a background sweep
/// can forcibly reclaim a lease held past the safety window (default 2
/// minutes) and log it, per the design note on scoped lease semantics.
pub struct InMemoryStore {
    rows: Mutex<HashMap<String, Row>>,
    wallets: Mutex<HashMap<String, Wallet>>,
    transactions: Mutex<Vec<Transaction>>,
    claims: Mutex<Vec<ClaimHistory>>,
    leases: Arc<Mutex<HashMap<String, Instant>>>,
    safety_window: Duration,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            rows: Mutex::new(HashMap::new()),
            wallets: Mutex::new(HashMap::new()),
            transactions: Mutex::new(Vec::new()),
            claims: Mutex::new(Vec::new()),
            leases: Arc::new(Mutex::new(HashMap::new())),
            safety_window: Duration::from_secs(120),
        }
    }

    pub fn with_safety_window(mut self, window: Duration) -> Self {
        self.safety_window = window;
        self
    }

    pub fn insert_token(&self, token: Token, config: TokenConfig, state: FlywheelState) {
        self.rows.lock().unwrap().insert(
            token.token_id.to_string(),
            Row {
                token,
                config,
                state,
            },
        );
    }

    pub fn insert_wallet(&self, wallet: Wallet) {
        self.wallets
            .lock()
            .unwrap()
            .insert(wallet.wallet_id.clone(), wallet);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.transactions.lock().unwrap().clone()
    }

    pub fn claims(&self) -> Vec<ClaimHistory> {
        self.claims.lock().unwrap().clone()
    }

    /// Forcibly releases any lease held longer than the safety window,
    /// logging each reclaim. Intended to run on a periodic background task.
    pub fn sweep_stale_leases(&self) {
        let mut leases = self.leases.lock().unwrap();
        let now = Instant::now();
        leases.retain(|token_id, held_since| {
            let expired = now.duration_since(*held_since) > self.safety_window;
            if expired {
                tracing::warn!(token_id, "forcibly released lease past safety window");
            }
            !expired
        });
    }

    fn view(&self, row: &Row) -> Result<TokenView, StoreError> {
        let wallets = self.wallets.lock().unwrap();
        let dev_wallet = wallets
            .get(&row.token.dev_wallet_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let ops_wallet = wallets
            .get(&row.token.ops_wallet_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        Ok(TokenView {
            token: row.token.clone(),
            config: row.config.clone(),
            state: row.state.clone(),
            dev_wallet,
            ops_wallet,
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn select_flywheel_eligible(&self) -> Result<Vec<TokenView>, StoreError> {
        let now = chrono::Utc::now();
        let rows = self.rows.lock().unwrap();
        rows.values()
            .filter(|r| r.token.active && r.config.flywheel_active && !r.state.is_paused(now))
            .map(|r| self.view(r))
            .collect()
    }

    async fn select_claim_eligible(&self) -> Result<Vec<TokenView>, StoreError> {
        let rows = self.rows.lock().unwrap();
        rows.values()
            .filter(|r| r.token.active && r.config.auto_claim_enabled)
            .map(|r| self.view(r))
            .collect()
    }

    async fn list_reactive_tokens(&self) -> Result<Vec<TokenView>, StoreError> {
        let rows = self.rows.lock().unwrap();
        rows.values()
            .filter(|r| r.token.active && r.config.reactive_enabled)
            .map(|r| self.view(r))
            .collect()
    }

    async fn lease(&self, token_id: &TokenId) -> Result<LeaseHandle, StoreError> {
        let key = token_id.to_string();
        let mut leases = self.leases.lock().unwrap();
        if leases.contains_key(&key) {
            return Err(StoreError::Busy);
        }
        leases.insert(key.clone(), Instant::now());
        drop(leases);

        // The release closure runs on drop, from whatever thread drops the
        // handle (including during unwind), matching the scoped-acquisition
        // contract: the lease is always released on every exit path.
        let registry = Arc::clone(&self.leases);
        Ok(LeaseHandle::new(token_id.clone(), move || {
            registry.lock().unwrap().remove(&key);
        }))
    }

    async fn get_state(&self, token_id: &TokenId) -> Result<FlywheelState, StoreError> {
        let rows = self.rows.lock().unwrap();
        rows.get(&token_id.to_string())
            .map(|r| r.state.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_state(&self, token_id: &TokenId, patch: FlywheelState) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&token_id.to_string()).ok_or(StoreError::NotFound)?;
        row.state = patch;
        Ok(())
    }

    async fn get_config(&self, token_id: &TokenId) -> Result<TokenConfig, StoreError> {
        let rows = self.rows.lock().unwrap();
        rows.get(&token_id.to_string())
            .map(|r| r.config.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_config(&self, token_id: &TokenId, patch: Patch) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&token_id.to_string()).ok_or(StoreError::NotFound)?;
        let mut value = serde_json::to_value(&row.config)
            .map_err(|e| StoreError::Fatal(e.to_string()))?;
        if let Value::Object(ref mut map) = value {
            for (k, v) in patch {
                map.insert(k, v);
            }
        }
        row.config =
            serde_json::from_value(value).map_err(|e| StoreError::Fatal(e.to_string()))?;
        Ok(())
    }

    async fn append_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        self.transactions.lock().unwrap().push(tx);
        Ok(())
    }

    async fn append_claim(&self, claim: ClaimHistory) -> Result<(), StoreError> {
        self.claims.lock().unwrap().push(claim);
        Ok(())
    }
}

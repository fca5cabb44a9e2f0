//! The Store: persistent mapping of tokens, configs, states, claim history,
//! and trade log. The core depends only on the [`Store`] trait; concrete
//! adapters ([`memory::InMemoryStore`], [`sqlite::SqliteStore`]) are provided
//! for testing and for a real standalone deployment respectively.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::claim::ClaimHistory;
use crate::model::config::TokenConfig;
use crate::model::state::FlywheelState;
use crate::model::token::{Token, TokenId};
use crate::model::transaction::Transaction;
use crate::model::wallet::Wallet;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient failure: abort the current tick for this token, next tick retries.
    #[error("store transient error: {0}")]
    Transient(String),
    /// Fatal failure: the process exits non-zero.
    #[error("store fatal error: {0}")]
    Fatal(String),
    /// The token's lease is already held by another task.
    #[error("token lease is busy")]
    Busy,
    #[error("not found")]
    NotFound,
}

/// A token plus the wallet rows a scheduler tick needs, assembled by the
/// Store so callers never join across tables themselves.
#[derive(Debug, Clone)]
pub struct TokenView {
    pub token: Token,
    pub config: TokenConfig,
    pub state: FlywheelState,
    pub dev_wallet: Wallet,
    pub ops_wallet: Wallet,
}

/// A scoped, exclusive right to mutate a single token's state and execute at
/// most one trade for it. Released on drop, on every exit path including
/// panics, per the design note on scoped lease semantics.
pub struct LeaseHandle {
    pub token_id: TokenId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LeaseHandle {
    pub fn new(token_id: TokenId, release: impl FnOnce() + Send + 'static) -> Self {
        LeaseHandle {
            token_id,
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LeaseHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// A shallow-merge patch: only present keys are applied.
pub type Patch = HashMap<String, Value>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn select_flywheel_eligible(&self) -> Result<Vec<TokenView>, StoreError>;
    async fn select_claim_eligible(&self) -> Result<Vec<TokenView>, StoreError>;
    async fn list_reactive_tokens(&self) -> Result<Vec<TokenView>, StoreError>;

    async fn lease(&self, token_id: &TokenId) -> Result<LeaseHandle, StoreError>;

    async fn get_state(&self, token_id: &TokenId) -> Result<FlywheelState, StoreError>;
    async fn update_state(&self, token_id: &TokenId, patch: FlywheelState) -> Result<(), StoreError>;

    async fn get_config(&self, token_id: &TokenId) -> Result<TokenConfig, StoreError>;
    async fn update_config(&self, token_id: &TokenId, patch: Patch) -> Result<(), StoreError>;

    async fn append_transaction(&self, tx: Transaction) -> Result<(), StoreError>;
    async fn append_claim(&self, claim: ClaimHistory) -> Result<(), StoreError>;
}

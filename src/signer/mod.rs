//! The Signer: given a wallet identifier and an assembled transaction, signs
//! and submits it, returning a transaction hash or a typed, closed error.

pub mod http;
pub mod mock;

use async_trait::async_trait;

/// The closed error set from spec section 4.2, verbatim.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignError {
    /// The assembled transaction referenced a blockhash no longer accepted.
    /// Retryable with a freshly built transaction.
    #[error("blockhash expired")]
    BlockhashExpired,
    /// Non-retryable; reported as a token-level failure event.
    #[error("signature verification failed")]
    SignatureVerificationFailed,
    /// Network-level; retryable up to the executor's bounded attempts.
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
    /// The signer service is not reachable or not configured. The operation
    /// is skipped: no state mutation, not counted as a failure.
    #[error("signer unavailable")]
    SignerUnavailable,
    /// Counted as a failure, non-retryable in the current tick.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SignedResult {
    pub hash: String,
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// `signAndSend(walletId, tx, chainId) -> { hash } | ErrorKind`.
    async fn sign_and_send(
        &self,
        wallet_id: &str,
        tx: &[u8],
        chain_id: &str,
    ) -> Result<SignedResult, SignError>;
}

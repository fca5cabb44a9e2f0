use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Sell,
    Transfer,
    Claim,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Confirmed,
    Failed,
    Pending,
}

/// Append-only trade log row.
///
/// `amount` is in minor units of the side's input asset: lamports of SOL for
/// `buy`/`transfer`/`claim`, raw token units for `sell`. The two scales are
/// never compared to each other, only to same-sided config clamps, so a
/// single untyped field avoids a wrapper that would otherwise carry no
/// invariant of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: uuid::Uuid,
    pub token_id: String,
    pub transaction_type: TransactionType,
    pub amount: u64,
    pub signature: Option<String>,
    pub status: TransactionStatus,
    pub message: Option<String>,
    pub trading_route: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

use serde::{Deserialize, Serialize};

use crate::money::Lamports;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Confirmed,
    Failed,
    Pending,
    /// The claim itself succeeded but the subsequent dev→ops transfer failed.
    Partial,
}

/// Append-only claim-history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimHistory {
    pub id: uuid::Uuid,
    pub token_id: String,
    pub amount_sol: Lamports,
    pub platform_fee_sol: Lamports,
    pub user_received_sol: Lamports,
    pub signature: Option<String>,
    pub status: ClaimStatus,
    pub claimed_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Splits a claimed amount per `platformFeePercentage`, per §8 property 8:
/// `platformFeeSol + userReceivedSol = amountSol` and
/// `platformFeeSol = amountSol * platformFeePercentage / 100`.
pub fn split_claim(amount: Lamports, platform_fee_percent: f64) -> (Lamports, Lamports) {
    let platform_fee = Lamports((amount.0 as f64 * platform_fee_percent / 100.0).round() as u64);
    let user_received = amount.saturating_sub(platform_fee);
    (platform_fee, user_received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sums_to_total() {
        let amount = Lamports::from_sol(1.0);
        let (fee, user) = split_claim(amount, 10.0);
        assert_eq!(fee.0 + user.0, amount.0);
        assert_eq!(fee, Lamports::from_sol(0.1));
        assert_eq!(user, Lamports::from_sol(0.9));
    }
}

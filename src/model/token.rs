use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenId(pub uuid::Uuid);

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(tokenId, tenantId, mintAddress, symbol, decimals, devWalletId, opsWalletId,
/// active, graduated, createdAt)`.
///
/// Invariants: `mintAddress` unique per tenant; `devWalletId != opsWalletId`;
/// `decimals` in `[0, 18]`; `active == false` means no scheduler selects this
/// token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: TokenId,
    pub tenant_id: TenantId,
    pub mint_address: String,
    pub symbol: String,
    pub decimals: u8,
    pub dev_wallet_id: String,
    pub ops_wallet_id: String,
    pub active: bool,
    pub graduated: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenInvariantError {
    #[error("decimals {0} out of range [0, 18]")]
    DecimalsOutOfRange(u8),
    #[error("devWalletId and opsWalletId must differ")]
    WalletsNotDistinct,
}

impl Token {
    pub fn check_invariants(&self) -> Result<(), TokenInvariantError> {
        if self.decimals > 18 {
            return Err(TokenInvariantError::DecimalsOutOfRange(self.decimals));
        }
        if self.dev_wallet_id == self.ops_wallet_id {
            return Err(TokenInvariantError::WalletsNotDistinct);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(decimals: u8, dev: &str, ops: &str) -> Token {
        Token {
            token_id: TokenId(uuid::Uuid::new_v4()),
            tenant_id: TenantId(uuid::Uuid::new_v4()),
            mint_address: "mint".into(),
            symbol: "TKN".into(),
            decimals,
            dev_wallet_id: dev.into(),
            ops_wallet_id: ops.into(),
            active: true,
            graduated: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn rejects_decimals_above_18() {
        assert_eq!(
            base(19, "dev", "ops").check_invariants(),
            Err(TokenInvariantError::DecimalsOutOfRange(19))
        );
    }

    #[test]
    fn rejects_identical_wallets() {
        assert_eq!(
            base(6, "w1", "w1").check_invariants(),
            Err(TokenInvariantError::WalletsNotDistinct)
        );
    }

    #[test]
    fn accepts_valid_token() {
        assert!(base(6, "dev", "ops").check_invariants().is_ok());
    }
}

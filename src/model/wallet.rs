use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

/// The chain a wallet's address is valid on. The core is chain-agnostic beyond
/// this tag; venue/signer adapters interpret `address` accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Solana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Dev,
    Ops,
}

/// `(walletId, address, chainType, type)`. Immutable once created; deletion
/// is out of scope for the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: String,
    pub address: String,
    pub tenant_id: TenantId,
    pub chain_type: ChainType,
    pub wallet_type: WalletType,
}

pub mod claim;
pub mod config;
pub mod state;
pub mod tenant;
pub mod token;
pub mod transaction;
pub mod wallet;

pub use claim::ClaimHistory;
pub use config::TokenConfig;
pub use state::FlywheelState;
pub use tenant::TenantId;
pub use token::Token;
pub use transaction::Transaction;
pub use wallet::Wallet;

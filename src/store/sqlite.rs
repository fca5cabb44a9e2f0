use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex as AsyncMutex;

use crate::model::claim::ClaimHistory;
use crate::model::config::TokenConfig;
use crate::model::state::FlywheelState;
use crate::model::token::{Token, TokenId};
use crate::model::transaction::Transaction;
use crate::model::wallet::Wallet;

use super::{LeaseHandle, Patch, Store, StoreError, TokenView};

/// Shared sqlite connection, mirroring the teacher's `Db = Arc<Mutex<Connection>>`
/// handle used across its HTTP API adapter.
type Db = Arc<AsyncMutex<Connection>>;

pub struct SqliteStore {
    db: Db,
    leases: Arc<std::sync::Mutex<HashMap<String, Instant>>>,
    safety_window: Duration,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(SqliteStore {
            db: Arc::new(AsyncMutex::new(conn)),
            leases: Arc::new(std::sync::Mutex::new(HashMap::new())),
            safety_window: Duration::from_secs(120),
        })
    }

    /// Runs migrations only, for the `migrate` CLI subcommand.
    pub fn migrate_only(path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        migrate(&conn)?;
        Ok(())
    }

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

    fn row_to_view(row: &rusqlite::Row) -> rusqlite::Result<TokenView> {
        let token = Token {
            token_id: TokenId(row.get::<_, String>("token_id")?.parse().unwrap_or_else(|_| uuid::Uuid::nil())),
            tenant_id: crate::model::tenant::TenantId(
                row.get::<_, String>("tenant_id")?
                    .parse()
                    .unwrap_or_else(|_| uuid::Uuid::nil()),
            ),
            mint_address: row.get("mint_address")?,
            symbol: row.get("symbol")?,
            decimals: row.get::<_, i64>("decimals")? as u8,
            dev_wallet_id: row.get("dev_wallet_id")?,
            ops_wallet_id: row.get("ops_wallet_id")?,
            active: row.get("active")?,
            graduated: row.get("graduated")?,
            created_at: chrono::DateTime::from_timestamp(row.get("created_at")?, 0)
                .unwrap_or_else(chrono::Utc::now),
        };
        let config: TokenConfig = serde_json::from_str(&row.get::<_, String>("config_json")?)
            .unwrap_or_default();
        let state: FlywheelState = serde_json::from_str(&row.get::<_, String>("state_json")?)
            .unwrap_or_default();
        let dev_wallet: Wallet = serde_json::from_str(&row.get::<_, String>("dev_wallet_json")?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
        let ops_wallet: Wallet = serde_json::from_str(&row.get::<_, String>("ops_wallet_json")?)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
        Ok(TokenView {
            token,
            config,
            state,
            dev_wallet,
            ops_wallet,
        })
    }

    async fn select_where(&self, extra_predicate: &str) -> Result<Vec<TokenView>, StoreError> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT t.token_id, t.tenant_id, t.mint_address, t.symbol, t.decimals,
                    t.dev_wallet_id, t.ops_wallet_id, t.active, t.graduated, t.created_at,
                    tc.config_json, fs.state_json,
                    wd.wallet_json AS dev_wallet_json, wo.wallet_json AS ops_wallet_json
             FROM tokens t
             JOIN token_config tc ON tc.token_id = t.token_id
             JOIN flywheel_state fs ON fs.token_id = t.token_id
             JOIN wallets wd ON wd.wallet_id = t.dev_wallet_id
             JOIN wallets wo ON wo.wallet_id = t.ops_wallet_id
             WHERE t.active = 1 AND {extra_predicate}"
        );
        let mut stmt = db
            .prepare(&sql)
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_view)
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Transient(e.to_string()))
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id   TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS wallets (
            wallet_id   TEXT PRIMARY KEY,
            wallet_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tokens (
            token_id       TEXT PRIMARY KEY,
            tenant_id      TEXT NOT NULL,
            mint_address   TEXT NOT NULL,
            symbol         TEXT NOT NULL,
            decimals       INTEGER NOT NULL,
            dev_wallet_id  TEXT NOT NULL REFERENCES wallets(wallet_id),
            ops_wallet_id  TEXT NOT NULL REFERENCES wallets(wallet_id),
            active         INTEGER NOT NULL DEFAULT 1,
            graduated      INTEGER NOT NULL DEFAULT 0,
            created_at     INTEGER NOT NULL DEFAULT (unixepoch()),
            UNIQUE(tenant_id, mint_address)
        );

        CREATE TABLE IF NOT EXISTS token_config (
            token_id    TEXT PRIMARY KEY REFERENCES tokens(token_id) ON DELETE CASCADE,
            config_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS flywheel_state (
            token_id   TEXT PRIMARY KEY REFERENCES tokens(token_id) ON DELETE CASCADE,
            state_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id             TEXT PRIMARY KEY,
            token_id       TEXT NOT NULL REFERENCES tokens(token_id),
            type           TEXT NOT NULL,
            amount         INTEGER NOT NULL,
            signature      TEXT,
            status         TEXT NOT NULL,
            message        TEXT,
            trading_route  TEXT,
            created_at     INTEGER NOT NULL DEFAULT (unixepoch())
        );

        CREATE TABLE IF NOT EXISTS claim_history (
            id                TEXT PRIMARY KEY,
            token_id          TEXT NOT NULL REFERENCES tokens(token_id),
            amount_sol        INTEGER NOT NULL,
            platform_fee_sol  INTEGER NOT NULL,
            user_received_sol INTEGER NOT NULL,
            signature         TEXT,
            status            TEXT NOT NULL,
            claimed_at        INTEGER NOT NULL,
            completed_at      INTEGER
        );
        ",
    )?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn select_flywheel_eligible(&self) -> Result<Vec<TokenView>, StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.select_where(&format!(
            "t.token_id IN (SELECT token_id FROM token_config WHERE json_extract(config_json, '$.flywheel_active') = 1) \
             AND t.token_id IN (SELECT token_id FROM flywheel_state WHERE \
                 json_extract(state_json, '$.paused_until') IS NULL OR \
                 json_extract(state_json, '$.paused_until') <= {now})"
        ))
        .await
    }

    async fn select_claim_eligible(&self) -> Result<Vec<TokenView>, StoreError> {
        self.select_where(
            "t.token_id IN (SELECT token_id FROM token_config WHERE json_extract(config_json, '$.auto_claim_enabled') = 1)",
        )
        .await
    }

    async fn list_reactive_tokens(&self) -> Result<Vec<TokenView>, StoreError> {
        self.select_where(
            "t.token_id IN (SELECT token_id FROM token_config WHERE json_extract(config_json, '$.reactive_enabled') = 1)",
        )
        .await
    }

    async fn lease(&self, token_id: &TokenId) -> Result<LeaseHandle, StoreError> {
        let key = token_id.to_string();
        let mut leases = self.leases.lock().unwrap();
        if leases.contains_key(&key) {
            return Err(StoreError::Busy);
        }
        leases.insert(key.clone(), Instant::now());
        drop(leases);

        let registry = Arc::clone(&self.leases);
        Ok(LeaseHandle::new(token_id.clone(), move || {
            registry.lock().unwrap().remove(&key);
        }))
    }

    async fn get_state(&self, token_id: &TokenId) -> Result<FlywheelState, StoreError> {
        let db = self.db.lock().await;
        let json: String = db
            .query_row(
                "SELECT state_json FROM flywheel_state WHERE token_id = ?1",
                [token_id.to_string()],
                |r| r.get(0),
            )
            .map_err(|_| StoreError::NotFound)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Fatal(e.to_string()))
    }

    async fn update_state(&self, token_id: &TokenId, patch: FlywheelState) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        let json = serde_json::to_string(&patch).map_err(|e| StoreError::Fatal(e.to_string()))?;
        db.execute(
            "UPDATE flywheel_state SET state_json = ?1 WHERE token_id = ?2",
            rusqlite::params![json, token_id.to_string()],
        )
        .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn get_config(&self, token_id: &TokenId) -> Result<TokenConfig, StoreError> {
        let db = self.db.lock().await;
        let json: String = db
            .query_row(
                "SELECT config_json FROM token_config WHERE token_id = ?1",
                [token_id.to_string()],
                |r| r.get(0),
            )
            .map_err(|_| StoreError::NotFound)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Fatal(e.to_string()))
    }

    async fn update_config(&self, token_id: &TokenId, patch: Patch) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        let existing: String = db
            .query_row(
                "SELECT config_json FROM token_config WHERE token_id = ?1",
                [token_id.to_string()],
                |r| r.get(0),
            )
            .map_err(|_| StoreError::NotFound)?;
        let mut value: serde_json::Value =
            serde_json::from_str(&existing).map_err(|e| StoreError::Fatal(e.to_string()))?;
        if let serde_json::Value::Object(ref mut map) = value {
            for (k, v) in patch {
                map.insert(k, v);
            }
        }
        let updated = serde_json::to_string(&value).map_err(|e| StoreError::Fatal(e.to_string()))?;
        db.execute(
            "UPDATE token_config SET config_json = ?1 WHERE token_id = ?2",
            rusqlite::params![updated, token_id.to_string()],
        )
        .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn append_transaction(&self, tx: Transaction) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO transactions (id, token_id, type, amount, signature, status, message, trading_route, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                tx.id.to_string(),
                tx.token_id,
                serde_json::to_string(&tx.transaction_type).unwrap_or_default(),
                tx.amount,
                tx.signature,
                serde_json::to_string(&tx.status).unwrap_or_default(),
                tx.message,
                tx.trading_route,
                tx.created_at.timestamp(),
            ],
        )
        .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn append_claim(&self, claim: ClaimHistory) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO claim_history (id, token_id, amount_sol, platform_fee_sol, user_received_sol, signature, status, claimed_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                claim.id.to_string(),
                claim.token_id,
                claim.amount_sol.0,
                claim.platform_fee_sol.0,
                claim.user_received_sol.0,
                claim.signature,
                serde_json::to_string(&claim.status).unwrap_or_default(),
                claim.claimed_at.timestamp(),
                claim.completed_at.map(|t| t.timestamp()),
            ],
        )
        .map_err(|e| StoreError::Transient(e.to_string()))?;
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{OracleError, OracleSnapshot, PriceOracle};

/// A canned oracle for tests: returns a fixed snapshot per mint, or `None`
/// ("no price data") for mints with no entry.
#[derive(Default)]
pub struct MockPriceOracle {
    snapshots: Mutex<HashMap<String, OracleSnapshot>>,
}

impl MockPriceOracle {
    pub fn with_snapshot(self, mint: &str, snapshot: OracleSnapshot) -> Self {
        self.snapshots
            .lock()
            .unwrap()
            .insert(mint.to_string(), snapshot);
        self
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn snapshot(&self, mint: &str) -> Result<Option<OracleSnapshot>, OracleError> {
        Ok(self.snapshots.lock().unwrap().get(mint).copied())
    }
}

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SignError, SignedResult, Signer};

/// A scripted signer for tests: pops one queued outcome per call, repeating
/// the last outcome once the queue is drained (so tests don't need to supply
/// an outcome for every call past the one under test).
pub struct MockSigner {
    outcomes: Mutex<VecDeque<Result<SignedResult, SignError>>>,
    fallback: Result<SignedResult, SignError>,
}

impl MockSigner {
    pub fn new(outcomes: Vec<Result<SignedResult, SignError>>) -> Self {
        MockSigner {
            outcomes: Mutex::new(outcomes.into()),
            fallback: Ok(SignedResult {
                hash: "fallback-sig".to_string(),
            }),
        }
    }

    pub fn always_succeeds() -> Self {
        MockSigner::new(vec![])
    }

    pub fn always_fails(err: SignError) -> Self {
        MockSigner {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: Err(err),
        }
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign_and_send(
        &self,
        _wallet_id: &str,
        _tx: &[u8],
        _chain_id: &str,
    ) -> Result<SignedResult, SignError> {
        let mut outcomes = self.outcomes.lock().unwrap();
        outcomes.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

//! Generic exponential-backoff retry helper for HTTP-based collaborator
//! adapters, grounded in the same shape as a DefiLlama provider's retry loop:
//! `delay = 1000ms * 2^attempt`.

use std::future::Future;
use std::time::Duration;

pub async fn retry<T, E, F, Fut>(max_retries: u32, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                let delay = Duration::from_millis(1000 * 2u64.pow(attempt));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

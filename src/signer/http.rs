use async_trait::async_trait;

use crate::retry::retry;

use super::{SignError, SignedResult, Signer};

#[derive(serde::Deserialize)]
struct SignResponse {
    hash: Option<String>,
    error: Option<String>,
}

/// Delegated remote signer reached over HTTPS, authenticated by an API key.
/// If no auth key was configured at boot, every call degrades to
/// `SignerUnavailable` rather than failing startup, per spec section 6.
pub struct HttpSigner {
    client: reqwest::Client,
    base_url: String,
    auth_key: Option<String>,
}

impl HttpSigner {
    pub fn new(base_url: impl Into<String>, auth_key: Option<String>) -> Self {
        HttpSigner {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_key,
        }
    }
}

#[async_trait]
impl Signer for HttpSigner {
    async fn sign_and_send(
        &self,
        wallet_id: &str,
        tx: &[u8],
        chain_id: &str,
    ) -> Result<SignedResult, SignError> {
        let Some(auth_key) = self.auth_key.as_ref() else {
            return Err(SignError::SignerUnavailable);
        };

        let url = format!("{}/sign-and-send", self.base_url);
        let body = serde_json::json!({
            "walletId": wallet_id,
            "tx": base64_encode(tx),
            "chainId": chain_id,
        });

        let resp = retry(2, || {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let auth_key = auth_key.clone();
            async move {
                client
                    .post(&url)
                    .bearer_auth(auth_key)
                    .timeout(std::time::Duration::from_secs(30))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| SignError::BroadcastFailed(e.to_string()))?
                    .json::<SignResponse>()
                    .await
                    .map_err(|e| SignError::BroadcastFailed(e.to_string()))
            }
        })
        .await?;

        if let Some(hash) = resp.hash {
            return Ok(SignedResult { hash });
        }
        match resp.error.as_deref() {
            Some("blockhash_expired") => Err(SignError::BlockhashExpired),
            Some("signature_verification_failed") => Err(SignError::SignatureVerificationFailed),
            Some(other) => Err(SignError::Other(other.to_string())),
            None => Err(SignError::Other("empty signer response".to_string())),
        }
    }
}

fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::new();
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let n = (b0 << 16) | (b1 << 8) | b2;
        out.push(ALPHABET[((n >> 18) & 63) as usize] as char);
        out.push(ALPHABET[((n >> 12) & 63) as usize] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[((n >> 6) & 63) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[(n & 63) as usize] as char
        } else {
            '='
        });
    }
    out
}

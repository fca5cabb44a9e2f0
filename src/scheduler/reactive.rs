//! The reactive subscriber (C11): watches on-chain log events for each
//! reactive-enabled token's mint and dispatches a reactive trade through the
//! same executor path the flywheel scheduler uses, per spec section 4.11.
//!
//! Reconnection follows the teacher's doubling-backoff shape (grounded in
//! `binance_book_ticker.rs`'s `run_loop`: start at a base delay, double on
//! every failed connection, cap the delay) but additionally gives up after
//! [`MAX_RECONNECT_ATTEMPTS`] consecutive failures rather than retrying
//! forever, per spec section 4.11 ("attempts capped, default 10").

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::algo::{self, reactive as reactive_mode, Balances};
use crate::executor::{self, ExecutionOutcome};
use crate::model::state::TradeSide;
use crate::money::Lamports;
use crate::store::TokenView;

use super::Collaborators;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
const BASE_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// An external swap observed in a token's log stream: which side traded, how
/// much native coin moved, and (when recoverable) the authoring signer, used
/// for self-trade suppression.
#[derive(Debug, Clone)]
pub struct ObservedSwap {
    pub side: TradeSide,
    pub amount: Lamports,
    pub signer: Option<String>,
}

/// Parses a log-event's program log lines into an [`ObservedSwap`].
///
/// This is the heuristic the design notes flag as an open question: the
/// source falls back to "any 9-digit number in the log text is a lamports
/// amount," which this carries over verbatim rather than inventing a
/// structured instruction decode this crate has no venue IDL for. Reactive
/// mode stays gated behind `TokenConfig::reactive_enabled` per token until a
/// robust parser replaces this — see `DESIGN.md`.
pub fn parse_log_event(logs: &[String]) -> Option<ObservedSwap> {
    let joined = logs.join(" ");
    let lower = joined.to_ascii_lowercase();
    let side = if lower.contains("buy") {
        TradeSide::Buy
    } else if lower.contains("sell") {
        TradeSide::Sell
    } else {
        return None;
    };
    let amount = extract_nine_digit_lamports(&joined)?;
    if amount == 0 {
        return None;
    }
    Some(ObservedSwap {
        side,
        amount: Lamports(amount),
        signer: extract_signer(&joined),
    })
}

/// Scans for the first run of exactly nine ASCII digits, the source's
/// heuristic for "this number is a lamports amount" (1-9.999... SOL).
fn extract_nine_digit_lamports(text: &str) -> Option<u64> {
    let mut run = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            run.push(ch);
            continue;
        }
        if run.len() == 9 {
            if let Ok(value) = run.parse::<u64>() {
                return Some(value);
            }
        }
        run.clear();
    }
    None
}

/// Scans for a base58-shaped token (32-44 alphanumeric characters) to use as
/// the authoring signer for self-trade suppression. `None` when no such
/// token appears; self-trade suppression is then skipped for that event
/// rather than guessed.
fn extract_signer(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|tok| {
            let len = tok.len();
            (32..=44).contains(&len) && tok.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|s| s.to_string())
}

/// Runs the reactive subscriber until `shutdown` is signaled or the
/// reconnect budget is exhausted. Shutdown is cooperative: the current
/// connection is allowed to finish dispatching any in-flight reactive trade
/// before the subscription is torn down.
pub async fn run(
    collaborators: &Collaborators<'_>,
    ws_url: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let cooldowns: Mutex<HashMap<String, Instant>> = Mutex::new(HashMap::new());
    let mut attempt = 0u32;
    let mut delay = BASE_RECONNECT_DELAY;

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }
        match connect_and_stream(collaborators, ws_url, &cooldowns, &mut shutdown).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                if attempt > MAX_RECONNECT_ATTEMPTS {
                    anyhow::bail!(
                        "reactive subscriber exhausted {MAX_RECONNECT_ATTEMPTS} reconnect attempts: {err}"
                    );
                }
                tracing::warn!(attempt, error = %err, "reactive subscriber disconnected, backing off");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return Ok(());
                        }
                    }
                }
                delay = (delay * 2).min(MAX_RECONNECT_DELAY);
            }
        }
    }
}

/// One connection lifetime: subscribe logs for every reactive-enabled
/// token's mint, dispatch observed swaps, and return when the socket closes
/// or a shutdown is requested. A clean exit on shutdown returns `Ok(())`; any
/// other disconnect is surfaced as an error so `run`'s backoff applies.
async fn connect_and_stream(
    collaborators: &Collaborators<'_>,
    ws_url: &str,
    cooldowns: &Mutex<HashMap<String, Instant>>,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let tokens = collaborators.store.list_reactive_tokens().await?;
    let by_mint: HashMap<String, TokenView> = tokens
        .into_iter()
        .filter(|v| v.config.reactive_enabled)
        .map(|v| (v.token.mint_address.clone(), v))
        .collect();
    if by_mint.is_empty() {
        // Nothing to watch; idle until shutdown rather than busy-reconnecting.
        shutdown.changed().await.ok();
        return Ok(());
    }

    let (ws_stream, _) = connect_async(ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let mut subscription_mint: HashMap<u64, String> = HashMap::new();
    for (request_id, mint) in by_mint.keys().enumerate() {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": "logsSubscribe",
            "params": [{"mentions": [mint]}, {"commitment": "confirmed"}],
        });
        write.send(Message::Text(request.to_string().into())).await?;
        subscription_mint.insert(request_id as u64, mint.clone());
    }

    let mut subscription_id_for_request: HashMap<u64, u64> = HashMap::new();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    for (request_id, _) in &subscription_mint {
                        if let Some(sub_id) = subscription_id_for_request.get(request_id) {
                            let unsub = serde_json::json!({
                                "jsonrpc": "2.0",
                                "id": request_id,
                                "method": "logsUnsubscribe",
                                "params": [sub_id],
                            });
                            let _ = write.send(Message::Text(unsub.to_string().into())).await;
                        }
                    }
                    let _ = write.close().await;
                    return Ok(());
                }
            }
            msg = read.next() => {
                let Some(msg) = msg else {
                    anyhow::bail!("reactive websocket stream ended");
                };
                let msg = msg?;
                match msg {
                    Message::Text(text) => {
                        handle_message(
                            &text,
                            collaborators,
                            &by_mint,
                            &mut subscription_mint,
                            &mut subscription_id_for_request,
                            cooldowns,
                        )
                        .await;
                    }
                    Message::Ping(payload) => {
                        write.send(Message::Pong(payload)).await?;
                    }
                    Message::Close(_) => {
                        anyhow::bail!("reactive websocket closed by peer");
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn handle_message(
    text: &str,
    collaborators: &Collaborators<'_>,
    by_mint: &HashMap<String, TokenView>,
    subscription_mint: &mut HashMap<u64, String>,
    subscription_id_for_request: &mut HashMap<u64, u64>,
    cooldowns: &Mutex<HashMap<String, Instant>>,
) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    // Subscribe confirmation: {"id": <request_id>, "result": <subscription_id>}.
    if let (Some(request_id), Some(subscription_id)) = (
        value.get("id").and_then(|v| v.as_u64()),
        value.get("result").and_then(|v| v.as_u64()),
    ) {
        subscription_id_for_request.insert(request_id, subscription_id);
        return;
    }

    if value.get("method").and_then(|v| v.as_str()) != Some("logsNotification") {
        return;
    }
    let Some(params) = value.get("params") else { return };
    let Some(subscription_id) = params.get("subscription").and_then(|v| v.as_u64()) else {
        return;
    };
    let Some(mint) = subscription_mint
        .iter()
        .find(|(request_id, _)| subscription_id_for_request.get(*request_id) == Some(&subscription_id))
        .map(|(_, mint)| mint.clone())
    else {
        return;
    };
    let Some(view) = by_mint.get(&mint) else { return };

    let Some(logs) = params
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.get("logs"))
        .and_then(|l| l.as_array())
    else {
        return;
    };
    let logs: Vec<String> = logs
        .iter()
        .filter_map(|l| l.as_str().map(str::to_string))
        .collect();

    let Some(observed) = parse_log_event(&logs) else {
        return;
    };
    dispatch_reactive(collaborators, view, observed, cooldowns).await;
}

async fn dispatch_reactive(
    collaborators: &Collaborators<'_>,
    view: &TokenView,
    observed: ObservedSwap,
    cooldowns: &Mutex<HashMap<String, Instant>>,
) {
    // Self-trade suppression: ignore swaps authored by this token's own ops
    // wallet (spec section 4.11 step 2).
    if let Some(signer) = &observed.signer {
        if *signer == view.ops_wallet.address {
            return;
        }
    }

    let key = view.token.token_id.to_string();
    {
        let mut cooldowns = cooldowns.lock().await;
        let now = Instant::now();
        if let Some(last) = cooldowns.get(&key) {
            let cooldown = Duration::from_millis(view.config.reactive_cooldown_ms);
            if now.duration_since(*last) < cooldown {
                return;
            }
        }
        cooldowns.insert(key.clone(), now);
    }

    let lease = match collaborators.store.lease(&view.token.token_id).await {
        Ok(lease) => lease,
        Err(err) => {
            tracing::debug!(token_id = %view.token.token_id, error = %err, "reactive lease unavailable");
            return;
        }
    };

    let outcome = run_reactive_trade(collaborators, view, observed).await;
    drop(lease);

    match outcome {
        Ok(Some(outcome)) => log_outcome(&view.token.token_id.to_string(), &outcome),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(token_id = %view.token.token_id, error = %err, "reactive dispatch failed")
        }
    }
}

async fn run_reactive_trade(
    collaborators: &Collaborators<'_>,
    view: &TokenView,
    observed: ObservedSwap,
) -> anyhow::Result<Option<ExecutionOutcome>> {
    let config = collaborators.store.get_config(&view.token.token_id).await?;
    if !config.reactive_enabled {
        return Ok(None);
    }
    let mut state = collaborators.store.get_state(&view.token.token_id).await?;
    let balances = collaborators
        .venue
        .wallet_balances(&view.ops_wallet.address, &view.token.mint_address)
        .await
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    let decision = reactive_mode::decide(
        &config,
        observed.amount,
        observed.side,
        Balances {
            ops_sol: balances.sol,
            ops_token: balances.token,
            token_decimals: view.token.decimals,
        },
    );
    if matches!(decision.intent, algo::TradeIntent::Skip(_)) {
        return Ok(None);
    }

    let outcome = executor::execute(
        collaborators.store,
        collaborators.venue,
        collaborators.signer,
        &view.token,
        &config,
        &mut state,
        &view.ops_wallet,
        balances,
        decision,
    )
    .await?;
    collaborators
        .store
        .update_state(&view.token.token_id, state)
        .await?;
    Ok(Some(outcome))
}

fn log_outcome(token_id: &str, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Confirmed { hash } => {
            tracing::info!(token_id, %hash, "reactive trade confirmed")
        }
        ExecutionOutcome::Skipped(reason) => {
            tracing::debug!(token_id, reason, "reactive trade skipped")
        }
        ExecutionOutcome::Failed(reason) => {
            tracing::warn!(token_id, reason, "reactive trade failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_buy_with_nine_digit_lamports() {
        let logs = vec![
            "Program log: Instruction: Buy".to_string(),
            "Program log: amount_in: 123456789 lamports".to_string(),
        ];
        let observed = parse_log_event(&logs).expect("should parse");
        assert_eq!(observed.side, TradeSide::Buy);
        assert_eq!(observed.amount, Lamports(123_456_789));
    }

    #[test]
    fn ignores_logs_with_no_side_keyword() {
        let logs = vec!["Program log: Instruction: Claim".to_string()];
        assert!(parse_log_event(&logs).is_none());
    }

    #[test]
    fn ignores_logs_with_no_nine_digit_run() {
        let logs = vec!["Program log: Instruction: Sell amount 500".to_string()];
        assert!(parse_log_event(&logs).is_none());
    }

    #[test]
    fn extracts_base58_shaped_signer() {
        let logs = vec![
            "Program log: Instruction: Sell".to_string(),
            "Signer 9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM moved 500000000".to_string(),
        ];
        let observed = parse_log_event(&logs).expect("should parse");
        assert_eq!(
            observed.signer.as_deref(),
            Some("9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM")
        );
    }
}

//! The claim scheduler: periodic creator-fee harvest, per spec section 4.10.
//! Runs independently of the flywheel's trading cadence and, per
//! `claim_honors_pause`'s default, proceeds even while a token is paused for
//! trading failures — a creator-fee claim is not a trade.

use chrono::Utc;

use crate::model::claim::{split_claim, ClaimHistory, ClaimStatus};
use crate::model::wallet::Wallet;
use crate::money::Lamports;
use crate::signer::{SignError, Signer};
use crate::store::{Store, StoreError, TokenView};
use crate::venue::{VenueClient, VenueError};

use super::Collaborators;

pub async fn tick(collaborators: &Collaborators<'_>) -> Result<(), StoreError> {
    let eligible = collaborators.store.select_claim_eligible().await?;
    for view in eligible {
        let lease = match collaborators.store.lease(&view.token.token_id).await {
            Ok(lease) => lease,
            Err(StoreError::Busy) => continue,
            Err(err) => {
                tracing::warn!(token_id = %view.token.token_id, error = %err, "claim lease acquisition failed");
                continue;
            }
        };
        if let Err(err) = claim_token(collaborators, view).await {
            tracing::warn!(error = %err, "claim tick failed for token");
        }
        drop(lease);
    }
    Ok(())
}

async fn claim_token(collaborators: &Collaborators<'_>, view: TokenView) -> Result<(), StoreError> {
    let TokenView {
        token,
        config,
        state,
        dev_wallet,
        ops_wallet,
    } = view;

    if !config.auto_claim_enabled {
        return Ok(());
    }
    let now = Utc::now();
    if config.claim_honors_pause && state.is_paused(now) {
        return Ok(());
    }

    let positions = collaborators
        .venue
        .claimable_positions(&dev_wallet.address)
        .await
        .map_err(|err| StoreError::Transient(err.to_string()))?;

    let Some(position) = positions
        .into_iter()
        .find(|p| p.mint_address == token.mint_address)
    else {
        return Ok(());
    };

    if position.claimable.0 < config.fee_threshold_sol.0 {
        return Ok(());
    }

    let tx = match collaborators
        .venue
        .build_claim_tx(&dev_wallet.address, &token.mint_address)
        .await
    {
        Ok(tx) => tx,
        Err(VenueError::QuoteUnavailable) => return Ok(()),
        Err(err) => {
            tracing::warn!(token_id = %token.token_id, error = %err, "claim tx build failed");
            return Ok(());
        }
    };

    let chain_id = chain_id(dev_wallet.chain_type);
    let signed = match collaborators
        .signer
        .sign_and_send(&dev_wallet.wallet_id, &tx.0, chain_id)
        .await
    {
        Ok(signed) => signed,
        Err(SignError::SignerUnavailable) => return Ok(()),
        Err(err) => {
            tracing::warn!(token_id = %token.token_id, error = %err, "claim signing failed");
            append_claim(
                collaborators.store,
                &token.token_id.to_string(),
                position.claimable,
                Lamports::ZERO,
                Lamports::ZERO,
                None,
                ClaimStatus::Failed,
                now,
            )
            .await?;
            return Ok(());
        }
    };

    let (platform_fee, user_received) = split_claim(position.claimable, config.platform_fee_percent);

    let transfer_status = transfer_to_ops(
        collaborators,
        &dev_wallet,
        &ops_wallet,
        user_received,
        chain_id,
    )
    .await;

    let status = match transfer_status {
        Ok(()) => ClaimStatus::Confirmed,
        Err(reason) => {
            tracing::warn!(token_id = %token.token_id, reason, "dev-to-ops transfer failed after claim");
            ClaimStatus::Partial
        }
    };

    append_claim(
        collaborators.store,
        &token.token_id.to_string(),
        position.claimable,
        platform_fee,
        user_received,
        Some(signed.hash),
        status,
        now,
    )
    .await
}

/// Moves the claimed, fee-net amount from the dev wallet to the ops wallet so
/// it is available to the flywheel. Modeled as a second signed transaction
/// through the same signer, per spec section 4.10 step 5.
async fn transfer_to_ops(
    collaborators: &Collaborators<'_>,
    dev_wallet: &Wallet,
    ops_wallet: &Wallet,
    amount: Lamports,
    chain_id: &str,
) -> Result<(), String> {
    if amount.0 == 0 {
        return Ok(());
    }
    let tx = collaborators
        .venue
        .build_transfer_tx(&dev_wallet.address, &ops_wallet.address, amount.0)
        .await
        .map_err(|err| err.to_string())?;
    collaborators
        .signer
        .sign_and_send(&dev_wallet.wallet_id, &tx.0, chain_id)
        .await
        .map(|_| ())
        .map_err(|err| err.to_string())
}

#[allow(clippy::too_many_arguments)]
async fn append_claim(
    store: &dyn Store,
    token_id: &str,
    amount_sol: Lamports,
    platform_fee_sol: Lamports,
    user_received_sol: Lamports,
    signature: Option<String>,
    status: ClaimStatus,
    now: chrono::DateTime<Utc>,
) -> Result<(), StoreError> {
    store
        .append_claim(ClaimHistory {
            id: uuid::Uuid::new_v4(),
            token_id: token_id.to_string(),
            amount_sol,
            platform_fee_sol,
            user_received_sol,
            signature,
            status,
            claimed_at: now,
            completed_at: Some(Utc::now()),
        })
        .await
}

fn chain_id(chain_type: crate::model::wallet::ChainType) -> &'static str {
    match chain_type {
        crate::model::wallet::ChainType::Solana => "solana",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_threshold_is_inclusive_check_via_split() {
        let (fee, user) = split_claim(Lamports::from_sol(1.0), 10.0);
        assert_eq!(fee.0 + user.0, Lamports::from_sol(1.0).0);
    }
}

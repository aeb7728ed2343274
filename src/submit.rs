//! Transaction submission pipeline
//!
//! Drives a built instruction through sign, broadcast, and confirm against a
//! venue, recovering duplicate rejections through a signature-status probe and
//! falling back from the rollup to the base chain on a venue fault. The
//! fallback fires at most once and only for transport-level failures seen
//! before the transaction landed; program rejections are final.

use solana_sdk::{instruction::Instruction, signature::Signature, transaction::Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::signer::{self, SignerStack};
use crate::venue::{VenueKind, VenueTransport};

/// Outcome of a confirmed submission
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmissionReceipt {
    pub signature: Signature,
    pub venue: VenueKind,
    /// The broadcast was rejected as a duplicate but an earlier identical
    /// submission was found confirmed
    pub recovered_duplicate: bool,
    pub correlation_id: Uuid,
}

struct PendingSubmission {
    signature: Signature,
    venue: VenueKind,
    recovered_duplicate: bool,
    correlation_id: Uuid,
}

/// Sign and broadcast on a single venue. Does not wait for confirmation.
async fn sign_and_broadcast(
    venue: &dyn VenueTransport,
    signers: &SignerStack,
    instruction: Instruction,
    correlation_id: Uuid,
) -> Result<PendingSubmission> {
    let payer = signers.identity()?;
    let blockhash = venue.latest_blockhash().await?;

    debug!(
        "Building {} for {}: {}",
        correlation_id,
        instruction.program_id,
        hex::encode(&instruction.data)
    );
    let mut transaction = Transaction::new_with_payer(&[instruction], Some(&payer));
    transaction.message.recent_blockhash = blockhash;
    signers.sign_transaction(&mut transaction)?;

    if let Ok(encoded) = signer::serialize_transaction(&transaction) {
        debug!("Signed transaction {}: {}", correlation_id, encoded);
    }

    match venue.broadcast(&transaction).await {
        Ok(signature) => {
            info!(
                "Broadcast {} on {} as {}",
                correlation_id,
                venue.kind(),
                signature
            );
            Ok(PendingSubmission {
                signature,
                venue: venue.kind(),
                recovered_duplicate: false,
                correlation_id,
            })
        }
        Err(EngineError::DuplicateSubmission { venue: label }) => {
            let signature = transaction.signatures[0];
            warn!(
                "{} rejected {} as already processed, probing signature status",
                label, correlation_id
            );
            match venue.signature_confirmed(&signature).await {
                Ok(true) => {
                    info!(
                        "Earlier identical submission {} already landed on {}",
                        signature, label
                    );
                    Ok(PendingSubmission {
                        signature,
                        venue: venue.kind(),
                        recovered_duplicate: true,
                        correlation_id,
                    })
                }
                Ok(false) => Err(EngineError::RetryableAmbiguous { signature }),
                Err(probe_err) => {
                    warn!("Status probe for {} failed: {}", signature, probe_err);
                    Err(EngineError::RetryableAmbiguous { signature })
                }
            }
        }
        Err(other) => Err(other),
    }
}

async fn confirm_pending(
    venue: &dyn VenueTransport,
    pending: PendingSubmission,
) -> Result<SubmissionReceipt> {
    // A recovered duplicate is already visible on the venue
    if !pending.recovered_duplicate {
        venue.confirm(&pending.signature).await?;
    }
    info!(
        "Confirmed {} on {} as {}",
        pending.correlation_id, pending.venue, pending.signature
    );
    Ok(SubmissionReceipt {
        signature: pending.signature,
        venue: pending.venue,
        recovered_duplicate: pending.recovered_duplicate,
        correlation_id: pending.correlation_id,
    })
}

/// Submit one instruction on a single venue
pub async fn submit_instruction(
    venue: &dyn VenueTransport,
    signers: &SignerStack,
    instruction: Instruction,
) -> Result<SubmissionReceipt> {
    let correlation_id = Uuid::new_v4();
    let pending = sign_and_broadcast(venue, signers, instruction, correlation_id).await?;
    confirm_pending(venue, pending).await
}

/// Submit on the primary venue, re-building on the fallback when the primary
/// fails with a venue fault before the transaction landed
pub async fn submit_with_fallback(
    primary: &dyn VenueTransport,
    fallback: &dyn VenueTransport,
    signers: &SignerStack,
    instruction: Instruction,
) -> Result<SubmissionReceipt> {
    let correlation_id = Uuid::new_v4();

    let pending =
        match sign_and_broadcast(primary, signers, instruction.clone(), correlation_id).await {
            Ok(pending) => pending,
            Err(EngineError::VenueUnavailable { venue, reason }) => {
                warn!(
                    "{} unavailable ({}), re-building {} on {}",
                    venue,
                    reason,
                    correlation_id,
                    fallback.kind()
                );
                sign_and_broadcast(fallback, signers, instruction, correlation_id).await?
            }
            Err(other) => return Err(other),
        };

    let landed_on: &dyn VenueTransport = if pending.venue == primary.kind() {
        primary
    } else {
        fallback
    };
    confirm_pending(landed_on, pending).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::MemoryVenue;
    use solana_sdk::instruction::AccountMeta;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;

    fn sample_instruction() -> Instruction {
        Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[1, 2, 3],
            vec![AccountMeta::new(Pubkey::new_unique(), false)],
        )
    }

    fn local_stack() -> SignerStack {
        SignerStack::new().with_local(Keypair::new())
    }

    #[tokio::test]
    async fn test_submit_confirms_on_single_venue() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let signers = local_stack();

        let receipt = submit_instruction(&venue, &signers, sample_instruction())
            .await
            .unwrap();

        assert_eq!(receipt.venue, VenueKind::Rollup);
        assert!(!receipt.recovered_duplicate);
        assert_eq!(venue.broadcast_count(), 1);
        assert_eq!(venue.broadcast_signatures()[0], receipt.signature);
    }

    #[tokio::test]
    async fn test_submit_requires_signer() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let signers = SignerStack::new();

        let err = submit_instruction(&venue, &signers, sample_instruction())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoSigner));
        assert_eq!(venue.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_rejection_recovers_when_landed() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        venue.set_duplicate_mode(true);
        venue.set_probe_override(Some(true));
        let signers = local_stack();

        let receipt = submit_instruction(&venue, &signers, sample_instruction())
            .await
            .unwrap();

        assert!(receipt.recovered_duplicate);
        assert_eq!(venue.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_rejection_without_landing_is_ambiguous() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        venue.set_duplicate_mode(true);
        venue.set_probe_override(Some(false));
        let signers = local_stack();

        let err = submit_instruction(&venue, &signers, sample_instruction())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::RetryableAmbiguous { .. }));
    }

    #[tokio::test]
    async fn test_fallback_fires_on_venue_fault() {
        let primary = MemoryVenue::new(VenueKind::Rollup);
        primary.fail_broadcasts("connection refused");
        let fallback = MemoryVenue::new(VenueKind::Base);
        let signers = local_stack();

        let receipt = submit_with_fallback(&primary, &fallback, &signers, sample_instruction())
            .await
            .unwrap();

        assert_eq!(receipt.venue, VenueKind::Base);
        assert_eq!(primary.broadcast_count(), 0);
        assert_eq!(fallback.broadcast_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_skips_fallback() {
        let primary = MemoryVenue::new(VenueKind::Rollup);
        primary.reject_broadcasts("custom program error: 0x1");
        let fallback = MemoryVenue::new(VenueKind::Base);
        let signers = local_stack();

        let err = submit_with_fallback(&primary, &fallback, &signers, sample_instruction())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Rejected { .. }));
        assert_eq!(fallback.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_fault_does_not_resubmit() {
        let primary = MemoryVenue::new(VenueKind::Rollup);
        primary.set_auto_confirm(false);
        let fallback = MemoryVenue::new(VenueKind::Base);
        let signers = local_stack();

        let err = submit_with_fallback(&primary, &fallback, &signers, sample_instruction())
            .await
            .unwrap_err();

        // Broadcast landed on the primary, so the fault is surfaced instead
        // of risking a double execution on the fallback
        assert!(matches!(err, EngineError::VenueUnavailable { .. }));
        assert_eq!(primary.broadcast_count(), 1);
        assert_eq!(fallback.broadcast_count(), 0);
    }

    #[tokio::test]
    async fn test_both_venues_down_surfaces_fallback_fault() {
        let primary = MemoryVenue::new(VenueKind::Rollup);
        primary.fail_broadcasts("rollup offline");
        let fallback = MemoryVenue::new(VenueKind::Base);
        fallback.fail_broadcasts("base offline");
        let signers = local_stack();

        let err = submit_with_fallback(&primary, &fallback, &signers, sample_instruction())
            .await
            .unwrap_err();

        match err {
            EngineError::VenueUnavailable { venue, .. } => assert_eq!(venue, "base"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

//! Attestation publisher.
//!
//! Drives one commitment and its proof onto the ledger:
//!
//! ```text
//! simulate -> sign -> broadcast -> poll tx_status until terminal or max_wait
//! ```
//!
//! Only transient errors (transport, node unavailable, simulation resource
//! contention) are retried, a bounded number of times with a fixed backoff.
//! Ledger rejections are permanent and surface immediately. Double
//! acceptance is prevented by the ledger's replay record, not here: before
//! re-broadcasting, the publisher only asks the ledger whether the previous
//! transaction already landed. After the first broadcast no local error is
//! terminal on its own: an unreadable status or an unclassified broadcast
//! error falls through to polling that transaction.
//!
//! Every `publish` call ends in exactly one terminal attempt, which is
//! logged once and sent once to every [`AttestationPublisher::subscribe`]
//! receiver.

pub mod attempt;
pub mod signer;

pub use attempt::{AttemptId, AttemptStatus, AttestationAttempt, FailureReason};
pub use signer::{KeySigner, TransactionSigner, SIGNING_KEY_ENV};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, Instant};

use crate::error::{Error, Result};
use crate::ledger::client::LedgerClient;
use crate::ledger::transaction::{AttestationTx, SignedTransaction, TxRef, TxStatus};
use crate::ledger::verifier::AttestationPayload;
use crate::utils::constants::{
    MAX_CONFIRMATION_WAIT_SECS, MAX_SUBMIT_RETRIES, OUTCOME_CHANNEL_CAPACITY, POLL_INTERVAL_MS,
    RETRY_BACKOFF_MS,
};
use crate::zkp::commitment::Commitment;
use crate::zkp::consensus::ConsensusProof;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Submission timing and retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Delay between confirmation polls
    pub poll_interval_ms: u64,
    /// Longest wait for a terminal status after broadcast
    pub max_wait_secs: u64,
    /// Automatic retries after transient failures
    pub max_retries: u32,
    /// Fixed delay before each retry
    pub retry_backoff_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            max_wait_secs: MAX_CONFIRMATION_WAIT_SECS,
            max_retries: MAX_SUBMIT_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

impl PublisherConfig {
    /// Tight timings for a ledger in the same process
    pub fn local() -> Self {
        Self {
            poll_interval_ms: 50,
            max_wait_secs: 5,
            max_retries: 1,
            retry_backoff_ms: 100,
        }
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Confirmation deadline
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Retry backoff
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Terminal result of one `publish` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutcome {
    /// Attempt identifier
    pub attempt_id: AttemptId,
    /// Asset published
    pub asset_id: String,
    /// Terminal status
    pub status: AttemptStatus,
    /// Last broadcast reference
    pub tx_ref: Option<TxRef>,
    /// Retries performed
    pub retry_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLISHER
// ═══════════════════════════════════════════════════════════════════════════════

/// Submits attestations and tracks them to a terminal status
pub struct AttestationPublisher {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn TransactionSigner>,
    config: PublisherConfig,
    outcomes: broadcast::Sender<AttestationOutcome>,
    attempts: AtomicU64,
}

impl AttestationPublisher {
    /// Create a publisher with an owned signing credential
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn TransactionSigner>,
        config: PublisherConfig,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            ledger,
            signer,
            config,
            outcomes,
            attempts: AtomicU64::new(0),
        }
    }

    /// Submission parameters
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Receive every terminal outcome from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AttestationOutcome> {
        self.outcomes.subscribe()
    }

    /// Publish one attestation; always returns a terminal attempt
    pub async fn publish(
        &self,
        asset_id: &str,
        price: u64,
        timestamp: u64,
        commitment: &Commitment,
        proof: &ConsensusProof,
    ) -> AttestationAttempt {
        let counter = self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut attempt =
            AttestationAttempt::new(AttemptId::derive(commitment, counter), commitment.clone(), proof.clone());

        let tx = AttestationTx::new(AttestationPayload {
            asset_id: asset_id.to_string(),
            price,
            timestamp,
            commitment: commitment.to_bytes(),
            proof_bytes: proof.proof_bytes().to_vec(),
            public_inputs: proof.public_inputs().to_vec(),
        });

        tracing::debug!(
            attempt_id = %attempt.attempt_id(),
            asset = asset_id,
            price,
            timestamp,
            "publishing attestation"
        );

        let status = self.submit(&mut attempt, &tx).await;
        attempt.finish(status);
        self.report(asset_id, &attempt);
        attempt
    }

    async fn submit(&self, attempt: &mut AttestationAttempt, tx: &AttestationTx) -> AttemptStatus {
        let mut last_ref: Option<TxRef> = None;

        loop {
            // Once something was broadcast only the ledger can tell whether it landed
            if let Some(tx_ref) = last_ref {
                match self.ledger.tx_status(&tx_ref).await {
                    Ok(TxStatus::NotFound) => {}
                    Ok(TxStatus::Pending) => {
                        attempt.mark_submitted(tx_ref);
                        return self.await_confirmation(attempt, tx_ref).await;
                    }
                    Ok(status) => {
                        attempt.mark_submitted(tx_ref);
                        return settle(status);
                    }
                    Err(e) => {
                        tracing::debug!(attempt_id = %attempt.attempt_id(), error = %e, "status check failed");
                        if self.backoff(attempt, &e).await {
                            continue;
                        }
                        attempt.mark_submitted(tx_ref);
                        return self.await_confirmation(attempt, tx_ref).await;
                    }
                }
            }

            let (signed, tx_ref) = match self.prepare(tx).await {
                Ok(prepared) => prepared,
                Err(e) if e.is_transient() => {
                    if self.backoff(attempt, &e).await {
                        continue;
                    }
                    return AttemptStatus::Failed(FailureReason::SubmissionTimeout);
                }
                Err(Error::Rejected(reason)) => {
                    return AttemptStatus::Failed(FailureReason::Rejected(reason));
                }
                Err(e) => {
                    if e.is_critical() {
                        tracing::error!(
                            attempt_id = %attempt.attempt_id(),
                            code = e.code(),
                            error = %e,
                            "critical error preparing attestation"
                        );
                    }
                    return AttemptStatus::Failed(FailureReason::Internal(e.to_string()));
                }
            };

            last_ref = Some(tx_ref);
            match self.ledger.broadcast(&signed).await {
                Ok(tx_ref) => {
                    attempt.mark_submitted(tx_ref);
                    return self.await_confirmation(attempt, tx_ref).await;
                }
                Err(Error::Rejected(reason)) => {
                    attempt.mark_submitted(tx_ref);
                    return AttemptStatus::Failed(FailureReason::Rejected(reason));
                }
                Err(e) if e.is_transient() => {
                    if self.backoff(attempt, &e).await {
                        continue;
                    }
                    attempt.mark_submitted(tx_ref);
                    return self.await_confirmation(attempt, tx_ref).await;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt_id = %attempt.attempt_id(),
                        tx_ref = %tx_ref.as_hash().short(),
                        error = %e,
                        "broadcast outcome unknown, polling"
                    );
                    attempt.mark_submitted(tx_ref);
                    return self.await_confirmation(attempt, tx_ref).await;
                }
            }
        }
    }

    /// Simulate, then sign; nothing reaches the ledger's state here
    async fn prepare(&self, tx: &AttestationTx) -> Result<(SignedTransaction, TxRef)> {
        self.ledger.simulate(tx, &self.signer.public_key()).await?;
        let signed = self.signer.sign(tx.clone())?;
        let tx_ref = signed.tx_ref()?;
        Ok((signed, tx_ref))
    }

    /// Spend one retry after a transient failure; false once the budget is gone
    async fn backoff(&self, attempt: &mut AttestationAttempt, error: &Error) -> bool {
        if attempt.retry_count() >= self.config.max_retries {
            tracing::warn!(
                attempt_id = %attempt.attempt_id(),
                retry = attempt.retry_count(),
                error = %error,
                "retry budget exhausted"
            );
            return false;
        }
        attempt.record_retry();
        tracing::warn!(
            attempt_id = %attempt.attempt_id(),
            retry = attempt.retry_count(),
            error = %error,
            "transient submission failure, retrying"
        );
        sleep(self.config.retry_backoff()).await;
        true
    }

    async fn await_confirmation(&self, attempt: &AttestationAttempt, tx_ref: TxRef) -> AttemptStatus {
        let deadline = Instant::now() + self.config.max_wait();

        loop {
            match self.ledger.tx_status(&tx_ref).await {
                Ok(status) if status.is_terminal() => return settle(status),
                Ok(status) => {
                    tracing::debug!(attempt_id = %attempt.attempt_id(), ?status, "awaiting confirmation");
                }
                Err(e) => {
                    tracing::debug!(attempt_id = %attempt.attempt_id(), error = %e, "status poll failed");
                }
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    attempt_id = %attempt.attempt_id(),
                    tx_ref = %tx_ref.as_hash().short(),
                    waited_secs = self.config.max_wait_secs,
                    "no terminal status before deadline"
                );
                return AttemptStatus::Failed(FailureReason::SubmissionTimeout);
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    fn report(&self, asset_id: &str, attempt: &AttestationAttempt) {
        let tx_ref = attempt.ledger_tx_ref().map(|r| r.as_hash().short()).unwrap_or_default();
        match attempt.status() {
            AttemptStatus::Confirmed { attestation_id } => tracing::info!(
                attempt_id = %attempt.attempt_id(),
                asset = asset_id,
                tx_ref = %tx_ref,
                attestation_id,
                retry = attempt.retry_count(),
                "attestation confirmed"
            ),
            AttemptStatus::Failed(FailureReason::Rejected(reason)) => tracing::warn!(
                attempt_id = %attempt.attempt_id(),
                asset = asset_id,
                tx_ref = %tx_ref,
                reason = %reason,
                code = reason.code(),
                suspicious = reason.is_suspicious(),
                "attestation rejected"
            ),
            AttemptStatus::Failed(failure) => tracing::warn!(
                attempt_id = %attempt.attempt_id(),
                asset = asset_id,
                tx_ref = %tx_ref,
                retry = attempt.retry_count(),
                reason = %failure,
                "attestation failed"
            ),
            status => tracing::error!(?status, "non-terminal attempt reported"),
        }

        // No subscribers is not an error
        let _ = self.outcomes.send(AttestationOutcome {
            attempt_id: attempt.attempt_id(),
            asset_id: asset_id.to_string(),
            status: attempt.status().clone(),
            tx_ref: attempt.ledger_tx_ref(),
            retry_count: attempt.retry_count(),
        });
    }
}

fn settle(status: TxStatus) -> AttemptStatus {
    match status {
        TxStatus::Success { attestation_id } => AttemptStatus::Confirmed { attestation_id },
        TxStatus::Failed(reason) => AttemptStatus::Failed(FailureReason::Rejected(reason)),
        TxStatus::Pending | TxStatus::NotFound => AttemptStatus::Failed(FailureReason::SubmissionTimeout),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::ledger::local::LocalLedger;
    use crate::ledger::verifier::{AttestationMetadata, PriceRecord, VerifierConfig};
    use crate::oracle::sources::{PriceObservation, SourceId};
    use crate::utils::crypto::PublicKey;
    use crate::utils::math::PriceScale;
    use crate::zkp::commitment::{AssetRegistry, CommitmentBinder};
    use crate::zkp::consensus::{ConsensusProofBuilder, ProofDigest};
    use crate::zkp::prover::NativeProofSystem;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Fault injection around a local ledger
    struct FlakyLedger {
        inner: LocalLedger,
        broadcast_failures: AtomicU32,
        broadcast_error: Error,
        execute_then_fail: bool,
        status_failures: AtomicU32,
        broadcasts: AtomicU32,
    }

    impl FlakyLedger {
        fn new(inner: LocalLedger) -> Self {
            Self {
                inner,
                broadcast_failures: AtomicU32::new(0),
                broadcast_error: Error::Transport("connection reset".into()),
                execute_then_fail: false,
                status_failures: AtomicU32::new(0),
                broadcasts: AtomicU32::new(0),
            }
        }

        fn take(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl LedgerClient for FlakyLedger {
        async fn simulate(&self, tx: &AttestationTx, signer: &PublicKey) -> Result<()> {
            self.inner.simulate(tx, signer).await
        }

        async fn broadcast(&self, tx: &SignedTransaction) -> Result<TxRef> {
            self.broadcasts.fetch_add(1, Ordering::SeqCst);
            if Self::take(&self.broadcast_failures) {
                if self.execute_then_fail {
                    self.inner.broadcast(tx).await?;
                }
                return Err(self.broadcast_error.clone());
            }
            self.inner.broadcast(tx).await
        }

        async fn tx_status(&self, tx_ref: &TxRef) -> Result<TxStatus> {
            if Self::take(&self.status_failures) {
                return Err(Error::NodeUnavailable("503".into()));
            }
            self.inner.tx_status(tx_ref).await
        }

        async fn last_price(&self, asset_id: &str) -> Result<Option<PriceRecord>> {
            self.inner.last_price(asset_id).await
        }

        async fn price_at(&self, asset_id: &str, timestamp: u64) -> Result<Option<PriceRecord>> {
            self.inner.price_at(asset_id, timestamp).await
        }

        async fn attestation_metadata(&self, id: u64) -> Result<Option<AttestationMetadata>> {
            self.inner.attestation_metadata(id).await
        }

        async fn is_attestation_verified(&self, id: u64) -> Result<bool> {
            self.inner.is_attestation_verified(id).await
        }

        async fn attestation_commitment(&self, id: u64) -> Result<Option<Vec<u8>>> {
            self.inner.attestation_commitment(id).await
        }

        async fn is_proof_used(&self, digest: &ProofDigest) -> Result<bool> {
            self.inner.is_proof_used(digest).await
        }

        async fn proof_usage_timestamp(&self, digest: &ProofDigest) -> Result<Option<u64>> {
            self.inner.proof_usage_timestamp(digest).await
        }
    }

    async fn round() -> (Commitment, ConsensusProof) {
        let builder = ConsensusProofBuilder::new(Arc::new(NativeProofSystem::default()));
        let proof = builder
            .build(
                &[
                    PriceObservation::new("NVDA", 3_000_000_000, 100, SourceId::new("a")),
                    PriceObservation::new("NVDA", 3_010_000_000, 101, SourceId::new("b")),
                ],
                700,
            )
            .await
            .unwrap();
        let binder = CommitmentBinder::new(Arc::new(AssetRegistry::new(["NVDA"]).unwrap()));
        let price = proof.claimed_price(&PriceScale::default()).unwrap();
        let commitment = binder
            .bind(price, proof.timestamp(), "NVDA", proof.proof_digest())
            .unwrap();
        (commitment, proof)
    }

    fn setup(configure: impl FnOnce(&mut FlakyLedger)) -> (Arc<FlakyLedger>, AttestationPublisher) {
        let signer = Arc::new(KeySigner::generate());
        let local = LocalLedger::in_memory(signer.public_key(), VerifierConfig::default()).unwrap();
        let mut flaky = FlakyLedger::new(local);
        configure(&mut flaky);
        let ledger = Arc::new(flaky);
        let publisher = AttestationPublisher::new(ledger.clone(), signer, PublisherConfig::default());
        (ledger, publisher)
    }

    async fn publish(publisher: &AttestationPublisher, commitment: &Commitment, proof: &ConsensusProof) -> AttestationAttempt {
        publisher
            .publish("NVDA", commitment.price(), commitment.timestamp(), commitment, proof)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_confirms_and_emits_once() {
        let (_, publisher) = setup(|_| {});
        let mut outcomes = publisher.subscribe();
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Confirmed { attestation_id: 1 });
        assert!(attempt.ledger_tx_ref().is_some());
        assert_eq!(attempt.retry_count(), 0);

        let outcome = outcomes.recv().await.unwrap();
        assert_eq!(outcome.attempt_id, attempt.attempt_id());
        assert_eq!(outcome.status, *attempt.status());
        assert!(outcomes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_rejected_without_broadcast() {
        let (ledger, publisher) = setup(|_| {});
        let (commitment, proof) = round().await;

        assert!(publish(&publisher, &commitment, &proof).await.is_confirmed());
        let second = publish(&publisher, &commitment, &proof).await;

        assert_eq!(
            second.status(),
            &AttemptStatus::Failed(FailureReason::Rejected(RejectReason::ProofAlreadyUsed))
        );
        assert!(second.ledger_tx_ref().is_none());
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 1);
        assert_ne!(second.attempt_id(), AttemptId::derive(&commitment, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_retries() {
        let (ledger, publisher) = setup(|l| l.broadcast_failures = AtomicU32::new(u32::MAX));
        let (commitment, proof) = round().await;
        let started = Instant::now();

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Failed(FailureReason::SubmissionTimeout));
        assert_eq!(attempt.retry_count(), 3);
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 4);
        // The last broadcast is polled to the deadline before giving up
        assert!(attempt.ledger_tx_ref().is_some());
        assert!(
            started.elapsed()
                >= Duration::from_millis(3 * RETRY_BACKOFF_MS) + Duration::from_secs(MAX_CONFIRMATION_WAIT_SECS)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let (ledger, publisher) = setup(|l| l.broadcast_failures = AtomicU32::new(1));
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert!(attempt.is_confirmed());
        assert_eq!(attempt.retry_count(), 1);
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_broadcast_resolved_by_status_check() {
        let (ledger, publisher) = setup(|l| {
            l.broadcast_failures = AtomicU32::new(1);
            l.execute_then_fail = true;
        });
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Confirmed { attestation_id: 1 });
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ambiguous_broadcast_survives_failed_status_check() {
        let (ledger, publisher) = setup(|l| {
            l.broadcast_failures = AtomicU32::new(1);
            l.execute_then_fail = true;
            l.status_failures = AtomicU32::new(1);
        });
        let (commitment, proof) = round().await;

        // Own accepted transaction must not come back as a replay rejection
        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Confirmed { attestation_id: 1 });
        assert_eq!(attempt.retry_count(), 2);
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_broadcast_error_polls_ledger() {
        let (ledger, publisher) = setup(|l| {
            l.broadcast_failures = AtomicU32::new(1);
            l.broadcast_error = Error::Storage("flush failed".into());
            l.execute_then_fail = true;
        });
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Confirmed { attestation_id: 1 });
        assert!(attempt.ledger_tx_ref().is_some());
        assert_eq!(attempt.retry_count(), 0);
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_broadcast_error_without_landing_times_out() {
        let (_, publisher) = setup(|l| {
            l.broadcast_failures = AtomicU32::new(1);
            l.broadcast_error = Error::Storage("disk full".into());
        });
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Failed(FailureReason::SubmissionTimeout));
        assert!(attempt.ledger_tx_ref().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_absorbed() {
        let (_, publisher) = setup(|l| l.status_failures = AtomicU32::new(3));
        let (commitment, proof) = round().await;

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert!(attempt.is_confirmed());
        assert_eq!(attempt.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_deadline() {
        let signer = Arc::new(KeySigner::generate());
        let ledger = LocalLedger::in_memory(signer.public_key(), VerifierConfig::default())
            .unwrap()
            .with_confirmation_delay(u32::MAX);
        let publisher = AttestationPublisher::new(Arc::new(ledger), signer, PublisherConfig::default());
        let (commitment, proof) = round().await;
        let started = Instant::now();

        let attempt = publish(&publisher, &commitment, &proof).await;
        assert_eq!(attempt.status(), &AttemptStatus::Failed(FailureReason::SubmissionTimeout));
        assert!(attempt.ledger_tx_ref().is_some());
        assert!(started.elapsed() >= Duration::from_secs(MAX_CONFIRMATION_WAIT_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_tamper_rejected_in_simulation() {
        let (ledger, publisher) = setup(|_| {});
        let (commitment, proof) = round().await;

        let attempt = publisher
            .publish("NVDA", commitment.price() + 1, commitment.timestamp(), &commitment, &proof)
            .await;
        assert_eq!(
            attempt.status(),
            &AttemptStatus::Failed(FailureReason::Rejected(RejectReason::PriceMismatch))
        );
        assert_eq!(ledger.broadcasts.load(Ordering::SeqCst), 0);
    }
}

//! Index Writer: `appendIndexed(roundId, txn)` (spec §4.4). Coordinates a
//! `TxnDetail` insert and a round-level `TxnRef` append across two
//! documents with no shared transaction manager, detail-first, so the only
//! tolerated failure mode is "detail exists, ref missing" (an orphan
//! detail, benign and sweepable) rather than the forbidden "ref exists,
//! detail missing" (orphan ref, would violate I3).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::kv::{CasVersion, KvError, KvStore};
use crate::model::{IndexedRound, SignedAmount, TxnDetail, TxnRef, TxnStatus};
use crate::retry::{self, RetryPolicy};

use super::{AppendOutcome, AppendRequest, OperationKind, MAX_ROUND_TRANSACTIONS};

pub struct IndexWriter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    /// Retry budget for the round-ref loop (spec §4.2: "max 5 per document
    /// for the index path"). The detail's sequenceNumber/status patch is
    /// folded into the same loop (spec §4.4 step 3: patch the detail
    /// immediately before each round replace), so one budget now covers
    /// both -- there is no separate, decoupled patch retry loop.
    policy: RetryPolicy,
    business_reject_on_negative_balance: bool,
}

struct RoundAppendResult {
    version: CasVersion,
    operation: OperationKind,
    sequence_number: u64,
    status: TxnStatus,
    business_rejected: bool,
}

impl IndexWriter {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        business_reject_on_negative_balance: bool,
    ) -> Self {
        IndexWriter {
            store,
            clock,
            policy,
            business_reject_on_negative_balance,
        }
    }

    pub async fn append(&self, round_id: &str, request: AppendRequest) -> AppendOutcome {
        let overall_start = self.clock.now_instant();

        let txn_id = request
            .txn_id
            .clone()
            .unwrap_or_else(|| crate::id::generate_txn_id(round_id, self.clock.now_ms()));

        // Step 1/2 (spec §4.4): build and insert the detail first, with a
        // provisional sequenceNumber of 0 and a provisional COMPLETED
        // status, both finalized once the round-level loop below knows the
        // true sequence number and has evaluated the business rule against
        // the round's real current balance.
        let now_ms = self.clock.now_ms();
        let detail = TxnDetail {
            txn_id: txn_id.clone(),
            round_id: round_id.to_string(),
            txn_type: request.txn_type,
            amount: request.amount,
            currency: request.currency.clone(),
            create_time_ms: now_ms,
            sequence_number: 0,
            status: TxnStatus::Completed,
            balance_after: None,
            info: request.info.clone(),
        };

        let detail_bytes = match serde_json::to_vec(&detail) {
            Ok(b) => b,
            Err(e) => {
                return self.fail_outcome(txn_id, Error::Fatal(format!("encode detail: {e}")), 0, false)
            }
        };

        match self.store.insert(&txn_id, detail_bytes).await {
            Ok(_) => {}
            Err(KvError::AlreadyExists) => {
                return self.fail_outcome(
                    txn_id,
                    Error::DuplicateTxn("detail exists".to_string()),
                    0,
                    false,
                )
            }
            Err(e) => return self.fail_outcome(txn_id, map_kv_error(e), 0, false),
        }

        // Step 3 (spec §4.4): round-level CAS loop appending the TxnRef.
        // Each iteration patches the detail's sequenceNumber/status *before*
        // attempting the round replace, so a crash can only ever land on
        // "detail patched, ref missing" (the tolerated orphan), never "ref
        // has a real sequenceNumber while the detail is still stale."
        let index_retry_counter = Arc::new(AtomicU32::new(0));
        let round_outcome = retry::attempt(&self.policy, self.clock.clone(), |_retry_index| {
            let round_id = round_id.to_string();
            let txn_id = txn_id.clone();
            let txn_type = request.txn_type;
            let amount = request.amount;
            let index_retry_counter = index_retry_counter.clone();
            async move {
                self.try_append_ref(&round_id, &txn_id, txn_type, amount, &index_retry_counter)
                    .await
            }
        })
        .await;

        let round_retry_count = round_outcome.retries_used;
        let round_conflicts = round_outcome.conflicts_observed;
        let index_retry_count = index_retry_counter.load(Ordering::Relaxed);

        let Some(result) = round_outcome.value else {
            if let Some(Error::BusinessReject(reason)) = &round_outcome.failed {
                // Nothing was written to the round; the detail inserted in
                // step 2 is now an orphan and must be compensated away.
                debug!(
                    "index writer: round {round_id} business-rejected append ({reason}), compensating orphan detail"
                );
                let orphan = match self.store.remove(&txn_id).await {
                    Ok(()) => false,
                    Err(e) => {
                        error!("index writer: compensation remove of {txn_id} failed: {e}");
                        true
                    }
                };
                return self.business_reject_outcome(txn_id, round_retry_count, orphan);
            }

            // The round-level budget or the overall deadline was exhausted.
            // Compensate per spec §4.4 step 4.
            warn!(
                "index writer: round append for {round_id} failed after {round_retry_count} retries, compensating"
            );
            let orphan = match self.store.remove(&txn_id).await {
                Ok(()) => false,
                Err(e) => {
                    error!("index writer: compensation remove of {txn_id} failed: {e}");
                    true
                }
            };
            let failed_err = round_outcome.failed.unwrap_or(Error::Deadline);
            let mut outcome = self.fail_outcome(txn_id, failed_err, round_retry_count, orphan);
            outcome.index_retry_count = index_retry_count;
            outcome.conflict_resolved = round_conflicts > 0;
            outcome.timed_out = round_outcome.timed_out;
            return outcome;
        };

        AppendOutcome {
            success: true,
            txn_id,
            round_version: Some(result.version),
            operation: result.operation,
            conflict_resolved: round_conflicts > 0,
            retry_count: round_retry_count,
            response_time_ms: elapsed_ms(overall_start, self.clock.now_instant()),
            business_rejected: result.business_rejected,
            timed_out: false,
            error: None,
            index_retry_count,
            index_orphan: false,
        }
    }

    async fn try_append_ref(
        &self,
        round_id: &str,
        txn_id: &str,
        txn_type: crate::model::TxnType,
        amount: crate::model::Amount,
        index_retry_counter: &AtomicU32,
    ) -> Result<RoundAppendResult, Error> {
        let existing = self.store.get(round_id).await.map_err(map_kv_error)?;

        let (round, operation) = if existing.exists {
            let value = existing.value.expect("exists implies value present");
            let round: IndexedRound = serde_json::from_slice(&value)
                .map_err(|e| Error::Fatal(format!("corrupt round document: {e}")))?;
            (round, OperationKind::Update)
        } else {
            (
                IndexedRound::new(round_id, self.clock.now_ms()),
                OperationKind::Create,
            )
        };

        if round.contains_txn_id(txn_id) {
            return Err(Error::DuplicateTxn(txn_id.to_string()));
        }
        if round.refs.len() as u64 >= MAX_ROUND_TRANSACTIONS {
            return Err(Error::BusinessReject("round_full".to_string()));
        }

        let sequence_number = round.next_sequence_number();
        let (status, business_rejected) = self.evaluate_business_rule(
            round.header.current_balance,
            txn_type,
            amount,
        );

        // Patch-before-replace: the detail must carry this attempt's real
        // sequenceNumber/status before we try to write the ref that points
        // at it.
        self.patch_detail_inline(txn_id, sequence_number, status, index_retry_counter)
            .await?;

        let now_ms = self.clock.now_ms();
        let txn_ref = TxnRef {
            txn_id: txn_id.to_string(),
            sequence_number,
            txn_type,
            amount,
            create_time_ms: now_ms,
            status,
        };

        let new_round = round.with_appended(txn_ref, now_ms);
        let bytes = serde_json::to_vec(&new_round)
            .map_err(|e| Error::Fatal(format!("failed to encode round: {e}")))?;

        let version = match operation {
            OperationKind::Create => match self.store.insert(round_id, bytes).await {
                Ok(v) => v,
                Err(KvError::AlreadyExists) => {
                    debug!("index writer: insert race on {round_id}, retrying as read");
                    return Err(Error::Conflict("insert raced an existing round".to_string()));
                }
                Err(e) => return Err(map_kv_error(e)),
            },
            OperationKind::Update => {
                let expected = existing
                    .version
                    .expect("update path implies a prior version");
                match self.store.replace(round_id, bytes, expected).await {
                    Ok(v) => v,
                    Err(KvError::CasMismatch) => {
                        return Err(Error::Conflict("cas mismatch on round replace".to_string()))
                    }
                    Err(KvError::NotFound) => {
                        warn!("index writer: round {round_id} vanished mid-update");
                        return Err(Error::Conflict("round missing on replace".to_string()));
                    }
                    Err(e) => return Err(map_kv_error(e)),
                }
            }
        };

        Ok(RoundAppendResult {
            version,
            operation,
            sequence_number,
            status,
            business_rejected,
        })
    }

    /// Patches the detail's sequenceNumber/status for this attempt, a single
    /// get+replace with no retry of its own -- a CAS mismatch here is
    /// reported as a `Conflict`, which sends the *whole* round-ref attempt
    /// (not just this patch) back through `retry::attempt` for a fresh
    /// iteration, per spec §4.4 step 3.
    async fn patch_detail_inline(
        &self,
        txn_id: &str,
        sequence_number: u64,
        status: TxnStatus,
        index_retry_counter: &AtomicU32,
    ) -> Result<(), Error> {
        let current = self.store.get(txn_id).await.map_err(map_kv_error)?;
        if !current.exists {
            return Err(Error::Fatal(format!("detail {txn_id} vanished before patch")));
        }
        let mut detail: TxnDetail = serde_json::from_slice(
            &current.value.expect("exists implies value present"),
        )
        .map_err(|e| Error::Fatal(format!("corrupt detail: {e}")))?;
        detail.sequence_number = sequence_number;
        detail.status = status;
        let bytes = serde_json::to_vec(&detail)
            .map_err(|e| Error::Fatal(format!("encode detail: {e}")))?;
        let expected = current.version.expect("exists implies version present");
        match self.store.replace(txn_id, bytes, expected).await {
            Ok(_) => Ok(()),
            Err(KvError::CasMismatch) => {
                index_retry_counter.fetch_add(1, Ordering::Relaxed);
                debug!("index writer: detail patch for {txn_id} hit a cas mismatch, retrying the attempt");
                Err(Error::Conflict("cas mismatch patching detail".to_string()))
            }
            Err(e) => Err(map_kv_error(e)),
        }
    }

    /// Applies the balance-floor business rule (spec §4.3, extended to the
    /// index variant by analogy per spec §4.4's silence on the point).
    fn evaluate_business_rule(
        &self,
        current_balance: SignedAmount,
        txn_type: crate::model::TxnType,
        amount: crate::model::Amount,
    ) -> (TxnStatus, bool) {
        if !self.business_reject_on_negative_balance {
            return (TxnStatus::Completed, false);
        }
        let projected = txn_type.apply_signed(current_balance, amount);
        if projected.cents() < 0 {
            (TxnStatus::Failed, true)
        } else {
            (TxnStatus::Completed, false)
        }
    }

    fn fail_outcome(
        &self,
        txn_id: String,
        error: Error,
        retry_count: u32,
        index_orphan: bool,
    ) -> AppendOutcome {
        let timed_out = matches!(error, Error::Deadline);
        AppendOutcome {
            success: false,
            txn_id,
            round_version: None,
            operation: OperationKind::Update,
            conflict_resolved: matches!(error, Error::Conflict(_)),
            retry_count,
            response_time_ms: 0,
            business_rejected: false,
            timed_out,
            error: Some(error),
            index_retry_count: 0,
            index_orphan,
        }
    }

    /// Spec.md §4.4's `round_full` cap is a `BusinessReject`, not a failure:
    /// callers see `success = true, businessRejected = true` with no error,
    /// matching `evaluate_business_rule`'s normal-path rejections.
    fn business_reject_outcome(
        &self,
        txn_id: String,
        retry_count: u32,
        index_orphan: bool,
    ) -> AppendOutcome {
        AppendOutcome {
            success: true,
            txn_id,
            round_version: None,
            operation: OperationKind::Update,
            conflict_resolved: false,
            retry_count,
            response_time_ms: 0,
            business_rejected: true,
            timed_out: false,
            error: None,
            index_retry_count: 0,
            index_orphan,
        }
    }
}

fn map_kv_error(err: KvError) -> Error {
    match err {
        KvError::AlreadyExists => Error::Conflict("already exists".to_string()),
        KvError::CasMismatch => Error::Conflict("cas mismatch".to_string()),
        KvError::NotFound => Error::NotFound("document".to_string()),
        KvError::Transient(msg) => Error::Transient(msg),
        KvError::Fatal(msg) => Error::Fatal(msg),
    }
}

fn elapsed_ms(start: std::time::Instant, now: std::time::Instant) -> u64 {
    now.saturating_duration_since(start).as_millis() as u64
}

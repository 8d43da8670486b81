//! Embedded Writer: `appendEmbedded(roundId, txn)` (spec §4.3). Implements
//! the READ / MUTATE / WRITE / DONE / RETRY / FAIL state machine as a loop
//! driven by `crate::retry::attempt`, with each iteration performing a
//! fresh read-modify-write against the single round document.

use std::sync::Arc;

use log::{debug, warn};

use crate::clock::Clock;
use crate::error::Error;
use crate::kv::{CasVersion, KvError, KvStore};
use crate::model::{Amount, EmbeddedRound, EmbeddedTxn, SignedAmount, TxnStatus};
use crate::retry::{self, RetryPolicy};

use super::{AppendOutcome, AppendRequest, OperationKind, MAX_ROUND_TRANSACTIONS};

pub struct EmbeddedWriter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    business_reject_on_negative_balance: bool,
}

struct Attempted {
    version: CasVersion,
    operation: OperationKind,
    business_rejected: bool,
}

impl EmbeddedWriter {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        business_reject_on_negative_balance: bool,
    ) -> Self {
        EmbeddedWriter {
            store,
            clock,
            policy,
            business_reject_on_negative_balance,
        }
    }

    pub async fn append(&self, round_id: &str, request: AppendRequest) -> AppendOutcome {
        let txn_id = request
            .txn_id
            .clone()
            .unwrap_or_else(|| crate::id::generate_txn_id(round_id, self.clock.now_ms()));

        // I2 / DuplicateTxn is checked inside the loop (MUTATE step), since
        // it needs the freshly-read round each retry, but a request carrying
        // an explicit txn_id that collides is non-retryable per spec §4.3:
        // "abort with DuplicateTxn and do NOT retry." We detect that inside
        // the closure and let `retry::attempt` short-circuit on a
        // non-retryable error.
        let round_id_owned = round_id.to_string();
        let request = request.clone_with_txn_id(txn_id.clone());

        let outcome = retry::attempt(&self.policy, self.clock.clone(), |_retry_index| {
            let round_id = round_id_owned.clone();
            let request = request.clone();
            async move { self.try_once(&round_id, &request).await }
        })
        .await;

        match outcome.value {
            Some(attempted) => AppendOutcome {
                success: true,
                txn_id,
                round_version: Some(attempted.version),
                operation: attempted.operation,
                conflict_resolved: outcome.conflicts_observed > 0,
                retry_count: outcome.retries_used,
                response_time_ms: outcome.elapsed_ms,
                business_rejected: attempted.business_rejected,
                timed_out: false,
                error: None,
                index_retry_count: 0,
                index_orphan: false,
            },
            // spec.md's `round_full` cap is a `BusinessReject`, not a
            // failure: nothing was durably written (single-document
            // variant, no detail to compensate), and the caller sees
            // `success = true, businessRejected = true` with no error.
            None if matches!(outcome.failed, Some(Error::BusinessReject(_))) => AppendOutcome {
                success: true,
                txn_id,
                round_version: None,
                operation: OperationKind::Update,
                conflict_resolved: false,
                retry_count: outcome.retries_used,
                response_time_ms: outcome.elapsed_ms,
                business_rejected: true,
                timed_out: false,
                error: None,
                index_retry_count: 0,
                index_orphan: false,
            },
            None => AppendOutcome {
                success: false,
                txn_id,
                round_version: None,
                operation: OperationKind::Update,
                conflict_resolved: outcome.conflicts_observed > 0,
                retry_count: outcome.retries_used,
                response_time_ms: outcome.elapsed_ms,
                business_rejected: false,
                timed_out: outcome.timed_out,
                error: outcome.failed,
                index_retry_count: 0,
                index_orphan: false,
            },
        }
    }

    /// One READ -> MUTATE -> WRITE cycle.
    async fn try_once(&self, round_id: &str, request: &AppendRequest) -> Result<Attempted, Error> {
        // READ
        let existing = self
            .store
            .get(round_id)
            .await
            .map_err(map_kv_error)?;

        let (round, operation): (EmbeddedRound, OperationKind) = if existing.exists {
            let value = existing.value.expect("exists implies value present");
            let round: EmbeddedRound = serde_json::from_slice(&value)
                .map_err(|e| Error::Fatal(format!("corrupt round document: {e}")))?;
            (round, OperationKind::Update)
        } else {
            (
                EmbeddedRound::new(round_id, self.clock.now_ms()),
                OperationKind::Create,
            )
        };

        // I2: reject (non-retryably) if this txn_id is already embedded.
        let txn_id = request.txn_id.clone().expect("txn_id assigned by caller");
        if round.contains_txn_id(&txn_id) {
            return Err(Error::DuplicateTxn(txn_id));
        }

        if round.transactions.len() as u64 >= MAX_ROUND_TRANSACTIONS {
            return Err(Error::BusinessReject("round_full".to_string()));
        }

        // MUTATE
        let now_ms = self.clock.now_ms();
        let (status, business_rejected) =
            self.evaluate_business_rule(round.header.current_balance, request.txn_type, request.amount);

        let new_txn = EmbeddedTxn {
            id: txn_id,
            sequence_number: 0, // finalized by with_appended
            txn_type: request.txn_type,
            amount: request.amount,
            currency: request.currency.clone(),
            create_time_ms: now_ms,
            status,
            balance_after: None,
            info: request.info.clone(),
        };

        let mut new_round = round.with_appended(new_txn, now_ms);
        if let Some(last) = new_round.transactions.last().cloned() {
            if last.status == TxnStatus::Completed {
                let idx = new_round.transactions.len() - 1;
                new_round.transactions[idx].balance_after = Some(new_round.header.current_balance);
            }
        }

        let bytes = serde_json::to_vec(&new_round)
            .map_err(|e| Error::Fatal(format!("failed to encode round: {e}")))?;

        // WRITE
        let version = match operation {
            OperationKind::Create => match self.store.insert(round_id, bytes).await {
                Ok(v) => v,
                Err(KvError::AlreadyExists) => {
                    debug!("embedded writer: insert race on {round_id}, retrying as read");
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
                        warn!("embedded writer: round {round_id} vanished mid-update");
                        return Err(Error::Conflict("round missing on replace".to_string()));
                    }
                    Err(e) => return Err(map_kv_error(e)),
                }
            }
        };

        Ok(Attempted {
            version,
            operation,
            business_rejected,
        })
    }

    /// Applies the balance-floor business rule (spec §4.3). Returns the
    /// transaction's final status and whether it was business-rejected.
    fn evaluate_business_rule(
        &self,
        current_balance: SignedAmount,
        txn_type: crate::model::TxnType,
        amount: Amount,
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
}

fn map_kv_error(err: KvError) -> Error {
    match err {
        KvError::AlreadyExists => Error::Conflict("already exists".to_string()),
        KvError::CasMismatch => Error::Conflict("cas mismatch".to_string()),
        KvError::NotFound => Error::NotFound("round".to_string()),
        KvError::Transient(msg) => Error::Transient(msg),
        KvError::Fatal(msg) => Error::Fatal(msg),
    }
}

impl AppendRequest {
    fn clone_with_txn_id(&self, txn_id: String) -> Self {
        let mut r = self.clone();
        r.txn_id = Some(txn_id);
        r
    }
}

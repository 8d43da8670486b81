//! Writers implement the two append protocols of spec §4.3 and §4.4. Both
//! are built on the same primitives: `crate::kv::KvStore` for storage,
//! `crate::retry` for the retry/backoff policy, and `crate::clock` for time.

pub mod embedded;
pub mod indexed;

use crate::kv::CasVersion;

/// Whether a successful append created the round document or updated an
/// existing one (spec §4.3 return value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
}

/// Common result shape returned by both writers (spec §4.3/§4.4).
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub success: bool,
    pub txn_id: String,
    pub round_version: Option<CasVersion>,
    pub operation: OperationKind,
    pub conflict_resolved: bool,
    pub retry_count: u32,
    pub response_time_ms: u64,
    pub business_rejected: bool,
    pub timed_out: bool,
    pub error: Option<crate::error::Error>,
    /// Index writer only; always 0 for the embedded writer.
    pub index_retry_count: u32,
    /// Index writer only; always false for the embedded writer.
    pub index_orphan: bool,
}

impl AppendOutcome {
    pub fn total_retries(&self) -> u32 {
        self.retry_count + self.index_retry_count
    }
}

/// A caller-specified append request. `txn_id` is `None` to let the writer
/// generate one (spec §4.6 generator path), or `Some` for callers exercising
/// the duplicate-rejection path (spec §8 scenario 4).
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub txn_id: Option<String>,
    pub txn_type: crate::model::TxnType,
    pub amount: crate::model::Amount,
    pub currency: String,
    pub info: crate::model::TxnInfo,
}

impl AppendRequest {
    pub fn new(txn_type: crate::model::TxnType, amount: crate::model::Amount) -> Self {
        AppendRequest {
            txn_id: None,
            txn_type,
            amount,
            currency: "USD".to_string(),
            info: crate::model::TxnInfo::default(),
        }
    }

    pub fn with_txn_id(mut self, txn_id: impl Into<String>) -> Self {
        self.txn_id = Some(txn_id.into());
        self
    }
}

/// Cap on embedded transactions per round (spec §8 boundary behavior:
/// implementers may cap round size and surface `round_full`). Set well
/// above the 10^4-transaction growth test so that scenario still succeeds
/// uncapped.
pub const MAX_ROUND_TRANSACTIONS: u64 = 50_000;

//! A key-value storage contract supporting document-level compare-and-swap,
//! as described in spec §4.1 and §6. Both keys and values are opaque byte
//! strings; the document model (`crate::model`) is responsible for encoding
//! and decoding them.
//!
//! Unlike the teacher's `storage::engine::Engine` trait, which is
//! synchronous and single-threaded by design (serialized Raft/file access),
//! this contract is `async`: the whole point of the engine is many
//! concurrent virtual clients overlapping their network I/O against one
//! store (spec §5), so a blocking trait would force one OS thread per
//! client. See SPEC_FULL.md §F.

pub mod memory;

use async_trait::async_trait;

/// Opaque CAS version token. The store is the only thing that interprets
/// this; callers just round-trip it between `get` and `replace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CasVersion(pub u64);

/// Result of a `get`.
#[derive(Debug, Clone)]
pub struct GetResult {
    pub value: Option<Vec<u8>>,
    pub version: Option<CasVersion>,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KvError {
    AlreadyExists,
    CasMismatch,
    NotFound,
    /// Retryable: timeout, connection reset, etc.
    Transient(String),
    /// Not retryable: store unreachable or corrupted.
    Fatal(String),
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::AlreadyExists => write!(f, "key already exists"),
            KvError::CasMismatch => write!(f, "cas mismatch"),
            KvError::NotFound => write!(f, "key not found"),
            KvError::Transient(msg) => write!(f, "transient store error: {msg}"),
            KvError::Fatal(msg) => write!(f, "fatal store error: {msg}"),
        }
    }
}

impl std::error::Error for KvError {}

pub type KvResult<T> = std::result::Result<T, KvError>;

/// The external key-value store contract (spec §4.1). The store must
/// linearize operations on a single key; no ordering is required across
/// keys (spec §5).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads the current value and CAS version for `key`.
    async fn get(&self, key: &str) -> KvResult<GetResult>;

    /// Creates `key` with `value` if it does not already exist.
    /// Returns `KvError::AlreadyExists` if it does.
    async fn insert(&self, key: &str, value: Vec<u8>) -> KvResult<CasVersion>;

    /// Replaces `key`'s value if `expected` still matches the stored
    /// version. Returns `KvError::CasMismatch` otherwise, or
    /// `KvError::NotFound` if the key was removed.
    async fn replace(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: CasVersion,
    ) -> KvResult<CasVersion>;

    /// Removes `key`, or does nothing if it does not exist.
    async fn remove(&self, key: &str) -> KvResult<()>;
}

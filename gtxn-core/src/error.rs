//! Error taxonomy for the engine, mirroring spec §7: `Conflict` and
//! `Transient` are recovered locally by the retry loop and never escape it;
//! everything else is surfaced to the caller.

use std::fmt;

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A CAS mismatch, or an insert racing another successful insert.
    /// Recovered locally by the retry loop; only ever surfaced via counters.
    Conflict(String),

    /// A timeout or connection reset reported by the KV store. Recovered
    /// locally up to the retry budget, tagged separately from `Conflict`.
    Transient(String),

    /// Attempt to append an already-used `txnId`. Non-retryable.
    DuplicateTxn(String),

    /// Operation deadline was reached before the attempt completed.
    Deadline,

    /// Index variant only: compensation failed after the ref append failed.
    Orphan(String),

    /// Key does not exist.
    NotFound(String),

    /// Store unreachable, corrupted value, or an invariant violation
    /// detected on read.
    Fatal(String),

    /// The business rule rejected the transaction (see spec §4.3). Not an
    /// error in the usual sense -- callers see `success = true,
    /// businessRejected = true` -- but the writer's internal state machine
    /// threads it through this type before translating it at the boundary.
    BusinessReject(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Conflict(msg) => write!(f, "conflict: {msg}"),
            Error::Transient(msg) => write!(f, "transient: {msg}"),
            Error::DuplicateTxn(id) => write!(f, "duplicate transaction id: {id}"),
            Error::Deadline => write!(f, "operation deadline exceeded"),
            Error::Orphan(id) => write!(f, "index orphan: ref missing for detail {id}"),
            Error::NotFound(key) => write!(f, "key not found: {key}"),
            Error::Fatal(msg) => write!(f, "fatal: {msg}"),
            Error::BusinessReject(reason) => write!(f, "business rejected: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the retry loop should treat this as locally recoverable
    /// within the retry/deadline budget (spec §7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Transient(_))
    }
}

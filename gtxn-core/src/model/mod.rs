//! Document shapes for the two storage variants (spec §3): `Round` in its
//! embedded and index forms, `EmbeddedTxn`, `TxnRef`, `TxnDetail`. Pure data
//! with canonical `serde` serialization; ownership and lifecycle live in the
//! writers (`crate::writer`), not here.

pub mod amount;
pub mod round;
pub mod txn;

pub use amount::{Amount, SignedAmount};
pub use round::{
    ComplianceInfo, EmbeddedRound, IndexedRound, RiskAssessment, RiskLevel, RoundHeader,
    RoundMetrics, RoundStatus, RoundSummary,
};
pub use txn::{EmbeddedTxn, TxnDetail, TxnInfo, TxnRef, TxnStatus, TxnType};

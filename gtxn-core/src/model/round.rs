//! Round documents, in both storage shapes (spec §3). Per the design notes
//! in spec §9 ("nested mutable model classes with bidirectional mutation"),
//! rounds here are plain data: every append produces a *new* snapshot via a
//! pure `with_*` constructor rather than mutating a shared object in place.
//! The CAS loop (`crate::writer`) is the only place that observes mutation,
//! and it always operates on a freshly read-then-derived snapshot.

use serde::{Deserialize, Serialize};

use super::amount::{Amount, SignedAmount};
use super::txn::{EmbeddedTxn, TxnRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundStatus {
    Active,
    Completed,
    Cancelled,
    UnderReview,
}

/// Identification and lifecycle fields shared by both round shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundHeader {
    pub round_id: String,
    pub player_id: String,
    pub operator_id: String,
    pub vendor_id: String,
    pub currency: String,
    pub initial_balance: SignedAmount,
    pub current_balance: SignedAmount,
    pub status: RoundStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl RoundHeader {
    pub fn new(round_id: impl Into<String>, now_ms: i64) -> Self {
        RoundHeader {
            round_id: round_id.into(),
            player_id: String::new(),
            operator_id: String::new(),
            vendor_id: String::new(),
            currency: "USD".to_string(),
            initial_balance: SignedAmount::from_cents(0),
            current_balance: SignedAmount::from_cents(0),
            status: RoundStatus::Active,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

/// Derived rollup over a round's embedded transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub total_transactions: u64,
    pub total_bets: u64,
    pub total_wins: u64,
    pub net_amount: i64,
}

/// Derived rollup over an indexed round's `TxnRef`s -- structurally
/// identical to `RoundSummary`, computed without touching the detail
/// documents (spec §3: "recomputed on each append from the refs").
pub type RoundMetrics = RoundSummary;

/// Informational-only compliance decoration (spec §1: not part of the
/// concurrency or durability core).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceInfo {
    pub flagged: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub score: f64,
}

impl Default for RiskAssessment {
    fn default() -> Self {
        RiskAssessment {
            level: RiskLevel::Low,
            score: 0.0,
        }
    }
}

fn summarize(transactions: &[EmbeddedTxn]) -> RoundSummary {
    let mut summary = RoundSummary::default();
    for txn in transactions {
        summary.total_transactions += 1;
        match txn.txn_type {
            super::txn::TxnType::Bet => summary.total_bets += 1,
            super::txn::TxnType::Win => summary.total_wins += 1,
            _ => {}
        }
        if txn.status == super::txn::TxnStatus::Completed {
            let signed = txn
                .txn_type
                .apply_signed(SignedAmount::from_cents(0), txn.amount);
            summary.net_amount += signed.cents();
        }
    }
    summary
}

fn summarize_refs(refs: &[TxnRef]) -> RoundMetrics {
    let mut metrics = RoundMetrics::default();
    for r in refs {
        metrics.total_transactions += 1;
        match r.txn_type {
            super::txn::TxnType::Bet => metrics.total_bets += 1,
            super::txn::TxnType::Win => metrics.total_wins += 1,
            _ => {}
        }
        if r.status == super::txn::TxnStatus::Completed {
            let signed = r
                .txn_type
                .apply_signed(SignedAmount::from_cents(0), r.amount);
            metrics.net_amount += signed.cents();
        }
    }
    metrics
}

/// Embedded-variant round: the ordered transaction list lives inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedRound {
    #[serde(flatten)]
    pub header: RoundHeader,
    pub transactions: Vec<EmbeddedTxn>,
    pub summary: RoundSummary,
}

impl EmbeddedRound {
    pub fn new(round_id: impl Into<String>, now_ms: i64) -> Self {
        EmbeddedRound {
            header: RoundHeader::new(round_id, now_ms),
            transactions: Vec::new(),
            summary: RoundSummary::default(),
        }
    }

    /// Pure append: returns a new snapshot with `txn` appended and the
    /// header/summary recomputed. Does not mutate `self`.
    pub fn with_appended(&self, mut txn: EmbeddedTxn, now_ms: i64) -> EmbeddedRound {
        let mut transactions = self.transactions.clone();
        txn.sequence_number = transactions.len() as u64 + 1;
        transactions.push(txn);

        let summary = summarize(&transactions);
        let current_balance = recompute_balance(self.header.initial_balance, &transactions);

        let mut header = self.header.clone();
        header.current_balance = current_balance;
        header.updated_at_ms = now_ms;

        EmbeddedRound {
            header,
            transactions,
            summary,
        }
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.transactions.len() as u64 + 1
    }

    pub fn contains_txn_id(&self, id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == id)
    }
}

/// I4: the current balance equals the initial balance plus the signed sum
/// over completed transactions.
pub fn recompute_balance(initial: SignedAmount, transactions: &[EmbeddedTxn]) -> SignedAmount {
    transactions
        .iter()
        .filter(|t| t.status == super::txn::TxnStatus::Completed)
        .fold(initial, |bal, t| t.txn_type.apply_signed(bal, t.amount))
}

pub fn recompute_balance_refs(initial: SignedAmount, refs: &[TxnRef]) -> SignedAmount {
    refs.iter()
        .filter(|r| r.status == super::txn::TxnStatus::Completed)
        .fold(initial, |bal, r| r.txn_type.apply_signed(bal, r.amount))
}

/// Index-variant round: holds only `TxnRef`s; full records live in separate
/// `TxnDetail` documents (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRound {
    #[serde(flatten)]
    pub header: RoundHeader,
    pub refs: Vec<TxnRef>,
    pub metrics: RoundMetrics,
    #[serde(default)]
    pub compliance: ComplianceInfo,
    #[serde(default)]
    pub risk: RiskAssessment,
}

impl IndexedRound {
    pub fn new(round_id: impl Into<String>, now_ms: i64) -> Self {
        IndexedRound {
            header: RoundHeader::new(round_id, now_ms),
            refs: Vec::new(),
            metrics: RoundMetrics::default(),
            compliance: ComplianceInfo::default(),
            risk: RiskAssessment::default(),
        }
    }

    pub fn next_sequence_number(&self) -> u64 {
        self.refs.len() as u64 + 1
    }

    /// Pure append: returns a new snapshot with `reference` appended and the
    /// header/metrics recomputed.
    pub fn with_appended(&self, reference: TxnRef, now_ms: i64) -> IndexedRound {
        let mut refs = self.refs.clone();
        refs.push(reference);

        let metrics = summarize_refs(&refs);
        let current_balance = recompute_balance_refs(self.header.initial_balance, &refs);

        let mut header = self.header.clone();
        header.current_balance = current_balance;
        header.updated_at_ms = now_ms;

        IndexedRound {
            header,
            refs,
            metrics,
            compliance: self.compliance.clone(),
            risk: self.risk,
        }
    }

    pub fn contains_txn_id(&self, id: &str) -> bool {
        self.refs.iter().any(|r| r.txn_id == id)
    }
}

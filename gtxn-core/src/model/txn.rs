//! Transaction shapes: `EmbeddedTxn` (embedded variant), `TxnRef` and
//! `TxnDetail` (index variant). See spec §3.

use serde::{Deserialize, Serialize};

use super::amount::{Amount, SignedAmount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnType {
    Bet,
    Win,
    Bonus,
    Refund,
    Cashout,
    Rake,
    Jackpot,
    Fee,
}

impl TxnType {
    /// Signed direction applied to the round balance per I4. The spec
    /// states WIN/REFUND/BONUS add and BET/FEE subtract explicitly; CASHOUT,
    /// RAKE and JACKPOT are not named, so this implementation treats JACKPOT
    /// as a win-class credit and CASHOUT/RAKE as debits (funds leaving the
    /// round). Recorded as an Open Question resolution in DESIGN.md.
    pub fn is_credit(self) -> bool {
        matches!(self, TxnType::Win | TxnType::Refund | TxnType::Bonus | TxnType::Jackpot)
    }

    pub fn apply_signed(self, balance: SignedAmount, amount: Amount) -> SignedAmount {
        if self.is_credit() {
            balance.checked_add_amount(amount)
        } else {
            balance.checked_sub_amount(amount)
        }
    }
}

impl std::fmt::Display for TxnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TxnType::Bet => "BET",
            TxnType::Win => "WIN",
            TxnType::Bonus => "BONUS",
            TxnType::Refund => "REFUND",
            TxnType::Cashout => "CASHOUT",
            TxnType::Rake => "RAKE",
            TxnType::Jackpot => "JACKPOT",
            TxnType::Fee => "FEE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnStatus {
    Pending,
    Completed,
    Failed,
}

/// Optional, informational-only fields carried on a transaction (spec §1:
/// "risk-assessment/compliance decoration ... is informational metadata
/// only"). Never consulted by the CAS protocol or the balance invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxnInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bet_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A transaction embedded directly in a round document (embedded variant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedTxn {
    pub id: String,
    pub sequence_number: u64,
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub amount: Amount,
    pub currency: String,
    pub create_time_ms: i64,
    pub status: TxnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<SignedAmount>,
    #[serde(flatten)]
    pub info: TxnInfo,
}

/// A lightweight reference to a `TxnDetail`, held inline in an indexed
/// round's transaction list (spec §3).
///
/// Extends the literal spec §3 shape (`txnId`, `sequenceNumber`, `type`,
/// `amount`, `createTimeMs`) with a `status` field. I3's field-matching
/// requirement names only `roundId`, `type`, `amount`, `sequenceNumber`, so
/// this addition doesn't weaken the invariant -- it's needed so a
/// business-rejected indexed append (spec §4.3's "record the attempt, mark
/// FAILED" default, which spec §4.4 extends to the index variant by
/// analogy) can be excluded from the round's balance/metrics recomputation
/// the same way a FAILED `EmbeddedTxn` is. See DESIGN.md.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnRef {
    pub txn_id: String,
    pub sequence_number: u64,
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub amount: Amount,
    pub create_time_ms: i64,
    pub status: TxnStatus,
}

/// The full transaction record for the index variant, one document per
/// `txnId` (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnDetail {
    pub txn_id: String,
    pub round_id: String,
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub amount: Amount,
    pub currency: String,
    pub create_time_ms: i64,
    pub sequence_number: u64,
    pub status: TxnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<SignedAmount>,
    #[serde(flatten)]
    pub info: TxnInfo,
}

impl TxnDetail {
    /// A `TxnRef` derived from this detail, for appending to the round's
    /// reference list (spec §4.4 step 3).
    pub fn as_ref_entry(&self) -> TxnRef {
        TxnRef {
            txn_id: self.txn_id.clone(),
            sequence_number: self.sequence_number,
            txn_type: self.txn_type,
            amount: self.amount,
            create_time_ms: self.create_time_ms,
            status: self.status,
        }
    }

    /// I3: does this detail match the fields carried by `reference`?
    pub fn matches_ref(&self, round_id: &str, reference: &TxnRef) -> bool {
        self.round_id == round_id
            && self.txn_id == reference.txn_id
            && self.txn_type == reference.txn_type
            && self.amount == reference.amount
            && self.sequence_number == reference.sequence_number
    }
}

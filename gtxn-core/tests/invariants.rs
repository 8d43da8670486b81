//! Property-based tests for the quantified invariants of spec §8: I1
//! (monotonic sequence), I4 (balance consistency), and no two successful
//! appends sharing a `(roundId, sequenceNumber)`.

use std::sync::Arc;

use gtxn_core::clock::SystemClock;
use gtxn_core::kv::memory::MemoryStore;
use gtxn_core::kv::KvStore;
use gtxn_core::model::{Amount, EmbeddedRound, TxnType};
use gtxn_core::retry::RetryPolicy;
use gtxn_core::writer::embedded::EmbeddedWriter;
use gtxn_core::writer::AppendRequest;
use proptest::prelude::*;

fn txn_type_strategy() -> impl Strategy<Value = TxnType> {
    prop_oneof![
        Just(TxnType::Bet),
        Just(TxnType::Win),
        Just(TxnType::Bonus),
        Just(TxnType::Refund),
        Just(TxnType::Rake),
        Just(TxnType::Jackpot),
    ]
}

proptest! {
    /// I1: sequential appends to one round always land at `1..N` with no
    /// gaps or repeats.
    #[test]
    fn sequence_numbers_are_contiguous(types in prop::collection::vec(txn_type_strategy(), 1..30)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            let writer = EmbeddedWriter::new(store.clone(), Arc::new(SystemClock), RetryPolicy::default(), false);

            for ty in &types {
                let outcome = writer.append("R", AppendRequest::new(*ty, Amount::from_cents(100))).await;
                prop_assert!(outcome.success);
            }

            let bytes = store.get("R").await.unwrap().value.unwrap();
            let round: EmbeddedRound = serde_json::from_slice(&bytes).unwrap();
            let seqs: Vec<u64> = round.transactions.iter().map(|t| t.sequence_number).collect();
            let expected: Vec<u64> = (1..=types.len() as u64).collect();
            prop_assert_eq!(seqs, expected);
            Ok(())
        })?;
    }

    /// I4: currentBalance always equals the signed sum over completed
    /// transactions, for any mix of credit/debit types.
    #[test]
    fn balance_matches_signed_sum(
        types in prop::collection::vec(txn_type_strategy(), 1..30),
        cents in prop::collection::vec(1u64..10_000, 1..30),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            let writer = EmbeddedWriter::new(store.clone(), Arc::new(SystemClock), RetryPolicy::default(), false);

            let n = types.len().min(cents.len());
            let mut expected_balance: i64 = 0;
            for i in 0..n {
                let amount = Amount::from_cents(cents[i]);
                let outcome = writer.append("R", AppendRequest::new(types[i], amount)).await;
                prop_assert!(outcome.success);
                expected_balance += if types[i].is_credit() {
                    cents[i] as i64
                } else {
                    -(cents[i] as i64)
                };
            }

            let bytes = store.get("R").await.unwrap().value.unwrap();
            let round: EmbeddedRound = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(round.header.current_balance.cents(), expected_balance);
            Ok(())
        })?;
    }

    /// No two successful appends share `(roundId, sequenceNumber)`.
    #[test]
    fn no_duplicate_sequence_within_a_round(count in 1usize..40) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
            let writer = EmbeddedWriter::new(store.clone(), Arc::new(SystemClock), RetryPolicy::default(), false);

            for _ in 0..count {
                writer.append("R", AppendRequest::new(TxnType::Bet, Amount::from_cents(10))).await;
            }

            let bytes = store.get("R").await.unwrap().value.unwrap();
            let round: EmbeddedRound = serde_json::from_slice(&bytes).unwrap();
            let mut seen = std::collections::HashSet::new();
            for t in &round.transactions {
                prop_assert!(seen.insert(t.sequence_number), "duplicate sequence number {}", t.sequence_number);
            }
            Ok(())
        })?;
    }
}

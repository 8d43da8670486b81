//! End-to-end scenario tests mirroring spec §8's six concrete scenarios,
//! scaled down to keep the suite fast.

use std::sync::Arc;
use std::time::Duration;

use gtxn_core::bench::run_benchmark;
use gtxn_core::clock::SystemClock;
use gtxn_core::config::{EngineConfig, WriterMode};
use gtxn_core::kv::memory::{FaultInjector, MemoryStore};
use gtxn_core::kv::KvStore;
use gtxn_core::model::{Amount, EmbeddedRound, TxnType};
use gtxn_core::reader::Reader;
use gtxn_core::retry::RetryPolicy;
use gtxn_core::writer::embedded::EmbeddedWriter;
use gtxn_core::writer::indexed::IndexWriter;
use gtxn_core::writer::AppendRequest;

/// Scenario 1: single-client smoke, embedded.
#[tokio::test(flavor = "multi_thread")]
async fn single_client_smoke_embedded() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let config = EngineConfig {
        writer_mode: WriterMode::Embedded,
        concurrent_clients: 1,
        duration_seconds: 1,
        ..EngineConfig::default()
    };

    let report = run_benchmark(store, clock, &config, "scenario1").await;
    assert!(report.total_attempted >= 1);
    assert_eq!(report.total_failed, 0);
    assert_eq!(report.conflicts_resolved, 0);
}

/// Scenario 2: contended single round, embedded -- 10 clients hammering
/// the same `roundId`.
#[tokio::test(flavor = "multi_thread")]
async fn contended_single_round_embedded() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let policy = RetryPolicy::new(10, 200);

    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let clock = clock.clone();
        let policy = policy;
        handles.push(tokio::spawn(async move {
            let writer = EmbeddedWriter::new(store, clock, policy, false);
            let mut successes = 0u32;
            while tokio::time::Instant::now() < deadline {
                let outcome = writer
                    .append("R", AppendRequest::new(TxnType::Bet, Amount::from_cents(100)))
                    .await;
                if outcome.success {
                    successes += 1;
                }
            }
            successes
        }));
    }

    let mut total_successful = 0u32;
    for h in handles {
        total_successful += h.await.unwrap();
    }

    let bytes = store.get("R").await.unwrap().value.unwrap();
    let round: EmbeddedRound = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(round.transactions.len() as u32, total_successful);

    let seqs: Vec<u64> = round.transactions.iter().map(|t| t.sequence_number).collect();
    let expected: Vec<u64> = (1..=round.transactions.len() as u64).collect();
    assert_eq!(seqs, expected);
}

/// Scenario 3: contended many rounds, indexed -- scaled to fewer clients
/// and a shorter duration.
#[tokio::test(flavor = "multi_thread")]
async fn contended_many_rounds_indexed() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let config = EngineConfig {
        writer_mode: WriterMode::Indexed,
        concurrent_clients: 5,
        duration_seconds: 1,
        max_retries: 5,
        ..EngineConfig::default()
    };

    let report = run_benchmark(store, clock, &config, "scenario3").await;
    assert_eq!(report.success_rate_pct, 100.0);
    assert_eq!(report.index_consistency_verified, Some(true));
    assert_eq!(report.index_orphan_count, 0);
}

/// Scenario 4: duplicate txnId rejection.
#[tokio::test]
async fn duplicate_txn_id_rejection() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let writer = EmbeddedWriter::new(store.clone(), clock, RetryPolicy::default(), false);

    let req = AppendRequest::new(TxnType::Bet, Amount::from_cents(1000)).with_txn_id("T1");
    let first = writer.append("R1", req.clone()).await;
    assert!(first.success);
    assert_eq!(first.operation, gtxn_core::writer::OperationKind::Create);

    let second = writer.append("R1", req).await;
    assert!(!second.success);
    assert!(matches!(second.error, Some(gtxn_core::error::Error::DuplicateTxn(_))));

    let bytes = store.get("R1").await.unwrap().value.unwrap();
    let round: EmbeddedRound = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(round.transactions.len(), 1);
}

/// Scenario 5: deadline exhaustion, indexed -- a store that always
/// mismatches on the round replace must compensate with zero orphans.
#[tokio::test]
async fn deadline_exhaustion_indexed_compensates() {
    let faults = FaultInjector::new();
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::with_faults(faults.clone()));
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let writer = IndexWriter::new(store.clone(), clock, RetryPolicy::new(3, 30), false);

    writer
        .append("R1", AppendRequest::new(TxnType::Bet, Amount::from_cents(100)))
        .await;

    faults.always_mismatch("R1");
    let outcome = writer
        .append("R1", AppendRequest::new(TxnType::Win, Amount::from_cents(50)))
        .await;

    assert!(!outcome.success);
    assert!(!outcome.index_orphan);
    let detail = store.get(&outcome.txn_id).await.unwrap();
    assert!(!detail.exists);
}

/// Scenario 6: a reader polling during concurrent writes only ever
/// observes a prefix of a later read's transactions.
#[tokio::test(flavor = "multi_thread")]
async fn reads_during_concurrent_writes_are_monotonic_prefixes() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn gtxn_core::clock::Clock> = Arc::new(SystemClock);
    let writer = Arc::new(EmbeddedWriter::new(store.clone(), clock, RetryPolicy::new(10, 200), false));

    let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
    let mut write_handles = Vec::new();
    for _ in 0..5 {
        let writer = writer.clone();
        write_handles.push(tokio::spawn(async move {
            while tokio::time::Instant::now() < deadline {
                writer
                    .append("R", AppendRequest::new(TxnType::Bet, Amount::from_cents(10)))
                    .await;
            }
        }));
    }

    let reader = Reader::new(store.clone());
    let mut previous_ids: Vec<String> = Vec::new();
    while tokio::time::Instant::now() < deadline {
        if let Ok(round) = reader.get_embedded("R").await {
            let ids: Vec<String> = round.transactions.iter().map(|t| t.id.clone()).collect();
            assert!(
                ids.len() >= previous_ids.len() && ids[..previous_ids.len()] == previous_ids[..],
                "later read must extend the previous read as a prefix"
            );
            let seqs: Vec<u64> = round.transactions.iter().map(|t| t.sequence_number).collect();
            let expected: Vec<u64> = (1..=round.transactions.len() as u64).collect();
            assert_eq!(seqs, expected);
            previous_ids = ids;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for h in write_handles {
        let _ = h.await;
    }
}

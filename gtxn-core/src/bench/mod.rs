//! Benchmark Driver & Aggregator (spec §4.7): the end-to-end entry point
//! that spawns K concurrent clients, reduces their results, and -- for the
//! index variant -- verifies I3 still holds across the run.

pub mod aggregator;
pub mod driver;
pub mod report;

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use crate::clock::Clock;
use crate::config::{EngineConfig, WriterMode};
use crate::kv::KvStore;
use crate::reader::{ReadRound, Reader};

pub use report::BenchmarkReport;

/// Runs a full benchmark per `config` and returns the aggregated report.
/// `run_tag` seeds the generator's `roundId` prefix (spec §4.6).
pub async fn run_benchmark(
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: &EngineConfig,
    run_tag: &str,
) -> BenchmarkReport {
    config
        .validate()
        .unwrap_or_else(|e| panic!("invalid benchmark configuration: {e}"));

    let started = Instant::now();
    let aggregator = driver::run(store.clone(), clock, config, run_tag).await;
    let actual_duration_secs = started.elapsed().as_secs_f64();
    let snapshot = aggregator.snapshot();

    let index_consistency_verified = match config.writer_mode {
        WriterMode::Embedded => None,
        WriterMode::Indexed => Some(verify_index_consistency(store, run_tag, config).await),
    };

    info!(
        "benchmark run complete: attempted={} successful={} duration={:.2}s",
        snapshot.total_attempted, snapshot.total_successful, actual_duration_secs
    );

    BenchmarkReport::from_snapshot(
        &snapshot,
        actual_duration_secs,
        index_consistency_verified,
        None,
    )
}

/// Spec §4.7 post-run check: for the sampled `roundId`s produced by this
/// run, `len(round.refs)` must match the number of TxnDetail documents
/// reachable via those refs. We derive the sampled round ids from the
/// generator's naming convention rather than tracking every one emitted,
/// since the driver doesn't thread round ids back out of its workers.
async fn verify_index_consistency(
    store: Arc<dyn KvStore>,
    run_tag: &str,
    config: &EngineConfig,
) -> bool {
    let reader = Reader::new(store.clone());
    let mut any_checked = false;
    let mut all_consistent = true;

    for client_id in 0..config.concurrent_clients {
        let mut round_counter = 1u64;
        // Rounds rotate every 3-5 txns; probe forward from 1 until a round
        // id is not found, which bounds the scan to rounds this client
        // actually created.
        loop {
            let round_id = format!("{run_tag}-client{client_id}-round{round_counter}");
            match reader.get_indexed(&round_id).await {
                Ok(ReadRound::Indexed { round, details, degraded, missing_txn_ids }) => {
                    any_checked = true;
                    if degraded || round.refs.len() != details.len() {
                        warn!(
                            "index consistency check: round {round_id} has {} refs but {} details (missing {:?})",
                            round.refs.len(),
                            details.len(),
                            missing_txn_ids
                        );
                        all_consistent = false;
                    }
                    round_counter += 1;
                }
                Ok(ReadRound::Embedded(_)) => unreachable!("indexed mode reader returns ReadRound::Indexed"),
                Err(_) => break,
            }
            if round_counter > 10_000 {
                break;
            }
        }
    }

    if !any_checked {
        warn!("index consistency check: no rounds found for run tag {run_tag}");
    }

    all_consistent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::kv::memory::MemoryStore;

    #[tokio::test]
    async fn indexed_benchmark_reports_consistent_index() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = EngineConfig {
            writer_mode: WriterMode::Indexed,
            concurrent_clients: 2,
            duration_seconds: 1,
            max_retries: 5,
            ..EngineConfig::default()
        };

        let report = run_benchmark(store, clock, &config, "t1").await;
        assert_eq!(report.index_consistency_verified, Some(true));
        assert_eq!(report.index_orphan_count, 0);
    }

    #[tokio::test]
    async fn embedded_benchmark_skips_index_check() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = EngineConfig {
            writer_mode: WriterMode::Embedded,
            concurrent_clients: 1,
            duration_seconds: 1,
            ..EngineConfig::default()
        };

        let report = run_benchmark(store, clock, &config, "t2").await;
        assert_eq!(report.index_consistency_verified, None);
    }
}

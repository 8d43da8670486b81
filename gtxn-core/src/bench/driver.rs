//! Benchmark Driver (spec §4.7): spawns K concurrent client loops on the
//! **parallel workers** scheduling model (spec §5) -- each client is a
//! plain tokio task running a sequential loop, so total in-flight KV
//! operations equal `concurrentClients`.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use crate::clock::Clock;
use crate::config::{EngineConfig, WriterMode};
use crate::generator::RoundSessionGenerator;
use crate::kv::KvStore;
use crate::model::Amount;
use crate::retry::RetryPolicy;
use crate::writer::{embedded::EmbeddedWriter, indexed::IndexWriter, AppendRequest};

use super::aggregator::{Aggregator, SampleOutcome, WorkerAccumulator};

enum AnyWriter {
    Embedded(EmbeddedWriter),
    Indexed(IndexWriter),
}

impl AnyWriter {
    fn new(
        mode: WriterMode,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        business_reject_on_negative_balance: bool,
    ) -> Self {
        match mode {
            WriterMode::Embedded => AnyWriter::Embedded(EmbeddedWriter::new(
                store,
                clock,
                policy,
                business_reject_on_negative_balance,
            )),
            WriterMode::Indexed => AnyWriter::Indexed(IndexWriter::new(
                store,
                clock,
                policy,
                business_reject_on_negative_balance,
            )),
        }
    }

    async fn append(&self, round_id: &str, request: AppendRequest) -> SampleOutcome {
        let outcome = match self {
            AnyWriter::Embedded(w) => w.append(round_id, request).await,
            AnyWriter::Indexed(w) => w.append(round_id, request).await,
        };
        SampleOutcome {
            success: outcome.success,
            response_time_ms: outcome.response_time_ms,
            conflict_resolved: outcome.conflict_resolved,
            index_conflict_resolved: outcome.index_retry_count > 0,
            retries: outcome.total_retries(),
            index_orphan: outcome.index_orphan,
        }
    }
}

/// Runs the benchmark described by `config` for `config.duration_seconds`
/// and returns the raw aggregate once every client loop has exited.
///
/// `run_tag` distinguishes concurrently-run benchmarks sharing one store
/// (spec §4.6's `roundId` format embeds it).
pub async fn run(
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: &EngineConfig,
    run_tag: &str,
) -> Arc<Aggregator> {
    let aggregator = Arc::new(Aggregator::new());
    let policy = RetryPolicy::new(config.max_retries, config.operation_deadline_ms);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(config.duration_seconds);

    info!(
        "benchmark driver: spawning {} clients, mode={:?}, duration={}s",
        config.concurrent_clients, config.writer_mode, config.duration_seconds
    );

    let mut handles = Vec::with_capacity(config.concurrent_clients as usize);
    for client_id in 0..config.concurrent_clients {
        let store = store.clone();
        let clock = clock.clone();
        let aggregator = aggregator.clone();
        let run_tag = run_tag.to_string();
        let mode = config.writer_mode;
        let business_reject = config.business_reject_on_negative_balance;

        let handle = tokio::spawn(async move {
            let writer = AnyWriter::new(mode, store, clock, policy, business_reject);
            let mut generator = RoundSessionGenerator::new(run_tag, client_id);
            let mut worker = WorkerAccumulator::new();

            while tokio::time::Instant::now() < deadline {
                let event = generator.next_event();
                let request = AppendRequest::new(event.txn_type, event.amount);
                let sample = writer.append(&event.round_id, request).await;
                worker.record(sample);
            }
            aggregator.merge(worker);
        });
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.await;
    }

    aggregator
}

/// Amount band used by integration tests that want a deterministic single
/// append without going through the generator.
pub fn fixed_amount(dollars: f64) -> Amount {
    Amount::from_dollars(dollars)
}

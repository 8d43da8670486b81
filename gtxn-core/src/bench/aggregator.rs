//! The Aggregator (spec §4.7): owns all counters and the latency buffer
//! (spec §5: "the per-worker latency buffer is accumulated locally and
//! merged at shutdown"). Each benchmark client loop (`crate::bench::driver`)
//! owns a `WorkerAccumulator` and folds its samples in with zero shared-state
//! contention on the hot path; `Aggregator::merge` takes the lock exactly
//! once per worker, when that worker's loop exits. `Aggregator::record` is a
//! single-sample convenience for callers (tests, one-shot callers) that
//! don't need a worker-local buffer -- it does take the lock per call and
//! should not be used from a tight concurrent loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct Aggregator {
    total_attempted: AtomicU64,
    total_successful: AtomicU64,
    total_failed: AtomicU64,
    conflicts_resolved: AtomicU64,
    index_conflicts_resolved: AtomicU64,
    total_retries: AtomicU64,
    index_orphan_count: AtomicU64,
    samples: Mutex<Vec<u64>>,
}

/// One append's contribution to the aggregate (spec §4.7: "each attempted
/// transaction ... contributes one latency sample").
#[derive(Debug, Clone, Copy)]
pub struct SampleOutcome {
    pub success: bool,
    pub response_time_ms: u64,
    pub conflict_resolved: bool,
    pub index_conflict_resolved: bool,
    pub retries: u32,
    pub index_orphan: bool,
}

/// A worker's local fold of its own samples, owned by one client loop for
/// its entire run and merged into the shared `Aggregator` exactly once, when
/// that loop exits. Plain counters, not atomics -- nothing else touches this.
#[derive(Debug, Default)]
pub struct WorkerAccumulator {
    total_attempted: u64,
    total_successful: u64,
    total_failed: u64,
    conflicts_resolved: u64,
    index_conflicts_resolved: u64,
    total_retries: u64,
    index_orphan_count: u64,
    samples_ms: Vec<u64>,
}

impl WorkerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: SampleOutcome) {
        self.total_attempted += 1;
        if sample.success {
            self.total_successful += 1;
        } else {
            self.total_failed += 1;
        }
        if sample.conflict_resolved {
            self.conflicts_resolved += 1;
        }
        if sample.index_conflict_resolved {
            self.index_conflicts_resolved += 1;
        }
        if sample.index_orphan {
            self.index_orphan_count += 1;
        }
        self.total_retries += sample.retries as u64;
        self.samples_ms.push(sample.response_time_ms);
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-sample path; see the module doc comment for when to prefer
    /// `WorkerAccumulator` + `merge` instead.
    pub fn record(&self, sample: SampleOutcome) {
        self.total_attempted.fetch_add(1, Ordering::Relaxed);
        if sample.success {
            self.total_successful.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failed.fetch_add(1, Ordering::Relaxed);
        }
        if sample.conflict_resolved {
            self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
        }
        if sample.index_conflict_resolved {
            self.index_conflicts_resolved.fetch_add(1, Ordering::Relaxed);
        }
        if sample.index_orphan {
            self.index_orphan_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_retries
            .fetch_add(sample.retries as u64, Ordering::Relaxed);

        self.samples.lock().unwrap().push(sample.response_time_ms);
    }

    /// Folds one worker's locally-accumulated samples into the shared
    /// aggregate. Called once, when the worker's loop exits.
    pub fn merge(&self, worker: WorkerAccumulator) {
        self.total_attempted
            .fetch_add(worker.total_attempted, Ordering::Relaxed);
        self.total_successful
            .fetch_add(worker.total_successful, Ordering::Relaxed);
        self.total_failed
            .fetch_add(worker.total_failed, Ordering::Relaxed);
        self.conflicts_resolved
            .fetch_add(worker.conflicts_resolved, Ordering::Relaxed);
        self.index_conflicts_resolved
            .fetch_add(worker.index_conflicts_resolved, Ordering::Relaxed);
        self.total_retries
            .fetch_add(worker.total_retries, Ordering::Relaxed);
        self.index_orphan_count
            .fetch_add(worker.index_orphan_count, Ordering::Relaxed);
        self.samples.lock().unwrap().extend(worker.samples_ms);
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        let mut samples = self.samples.lock().unwrap().clone();
        samples.sort_unstable();

        AggregateSnapshot {
            total_attempted: self.total_attempted.load(Ordering::Relaxed),
            total_successful: self.total_successful.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            index_conflicts_resolved: self.index_conflicts_resolved.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            index_orphan_count: self.index_orphan_count.load(Ordering::Relaxed),
            sorted_samples_ms: samples,
        }
    }
}

/// A point-in-time reduction of the aggregator's state, ready for
/// percentile computation (`crate::bench::report`).
#[derive(Debug, Clone)]
pub struct AggregateSnapshot {
    pub total_attempted: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub conflicts_resolved: u64,
    pub index_conflicts_resolved: u64,
    pub total_retries: u64,
    pub index_orphan_count: u64,
    pub sorted_samples_ms: Vec<u64>,
}

impl AggregateSnapshot {
    fn percentile(&self, p: f64) -> f64 {
        if self.sorted_samples_ms.is_empty() {
            return 0.0;
        }
        let n = self.sorted_samples_ms.len();
        let rank = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
        self.sorted_samples_ms[rank.min(n - 1)] as f64
    }

    pub fn avg_ms(&self) -> f64 {
        if self.sorted_samples_ms.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.sorted_samples_ms.iter().sum();
        sum as f64 / self.sorted_samples_ms.len() as f64
    }

    pub fn p50_ms(&self) -> f64 {
        self.percentile(50.0)
    }
    pub fn p95_ms(&self) -> f64 {
        self.percentile(95.0)
    }
    pub fn p99_ms(&self) -> f64 {
        self.percentile(99.0)
    }
    pub fn p99_5_ms(&self) -> f64 {
        self.percentile(99.5)
    }
    pub fn p99_9_ms(&self) -> f64 {
        self.percentile(99.9)
    }
    pub fn min_ms(&self) -> u64 {
        self.sorted_samples_ms.first().copied().unwrap_or(0)
    }
    pub fn max_ms(&self) -> u64 {
        self.sorted_samples_ms.last().copied().unwrap_or(0)
    }

    pub fn success_rate_pct(&self) -> f64 {
        if self.total_attempted == 0 {
            return 0.0;
        }
        self.total_successful as f64 / self.total_attempted as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_known_samples() {
        let agg = Aggregator::new();
        for ms in [1, 2, 3, 4, 5, 6, 7, 8, 9, 10] {
            agg.record(SampleOutcome {
                success: true,
                response_time_ms: ms,
                conflict_resolved: false,
                index_conflict_resolved: false,
                retries: 0,
                index_orphan: false,
            });
        }
        let snap = agg.snapshot();
        assert_eq!(snap.min_ms(), 1);
        assert_eq!(snap.max_ms(), 10);
        assert_eq!(snap.avg_ms(), 5.5);
    }

    #[test]
    fn success_rate_reflects_failures() {
        let agg = Aggregator::new();
        agg.record(SampleOutcome {
            success: true,
            response_time_ms: 1,
            conflict_resolved: false,
            index_conflict_resolved: false,
            retries: 0,
            index_orphan: false,
        });
        agg.record(SampleOutcome {
            success: false,
            response_time_ms: 1,
            conflict_resolved: false,
            index_conflict_resolved: false,
            retries: 0,
            index_orphan: false,
        });
        let snap = agg.snapshot();
        assert_eq!(snap.success_rate_pct(), 50.0);
    }
}

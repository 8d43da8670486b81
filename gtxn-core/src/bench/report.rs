//! The aggregated report returned by a benchmark run (spec §4.7): computed
//! metrics plus the four pass/fail flags a run is judged against.

use std::fmt;

use super::aggregator::AggregateSnapshot;

#[derive(Debug, Clone)]
pub struct LatencyReport {
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub p99_5_ms: f64,
    pub p99_9_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl From<&AggregateSnapshot> for LatencyReport {
    fn from(snap: &AggregateSnapshot) -> Self {
        LatencyReport {
            avg_ms: snap.avg_ms(),
            p50_ms: snap.p50_ms(),
            p95_ms: snap.p95_ms(),
            p99_ms: snap.p99_ms(),
            p99_5_ms: snap.p99_5_ms(),
            p99_9_ms: snap.p99_9_ms(),
            min_ms: snap.min_ms(),
            max_ms: snap.max_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub total_attempted: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub success_rate_pct: f64,
    pub tps: f64,
    pub latency: LatencyReport,
    pub conflicts_resolved: u64,
    pub index_conflicts_resolved: u64,
    pub total_retries: u64,
    pub index_orphan_count: u64,
    /// `None` when the index-consistency check was not run (embedded
    /// variant, or no sampled rounds).
    pub index_consistency_verified: Option<bool>,
    pub meets_100pct_success: bool,
    pub meets_20ms_response: bool,
    pub meets_50ms_read: Option<bool>,
}

impl BenchmarkReport {
    pub fn from_snapshot(
        snapshot: &AggregateSnapshot,
        actual_duration_secs: f64,
        index_consistency_verified: Option<bool>,
        reader_p95_ms: Option<f64>,
    ) -> Self {
        let latency = LatencyReport::from(snapshot);
        let success_rate_pct = snapshot.success_rate_pct();
        let tps = if actual_duration_secs > 0.0 {
            snapshot.total_successful as f64 / actual_duration_secs
        } else {
            0.0
        };

        BenchmarkReport {
            total_attempted: snapshot.total_attempted,
            total_successful: snapshot.total_successful,
            total_failed: snapshot.total_failed,
            success_rate_pct,
            tps,
            meets_100pct_success: success_rate_pct >= 100.0,
            meets_20ms_response: latency.avg_ms <= 20.0,
            meets_50ms_read: reader_p95_ms.map(|p95| p95 <= 50.0),
            latency,
            conflicts_resolved: snapshot.conflicts_resolved,
            index_conflicts_resolved: snapshot.index_conflicts_resolved,
            total_retries: snapshot.total_retries,
            index_orphan_count: snapshot.index_orphan_count,
            index_consistency_verified,
        }
    }

    /// Spec §7: "a run with `indexConsistencyVerified = false` is a failed
    /// benchmark regardless of other metrics."
    pub fn passed(&self) -> bool {
        self.meets_100pct_success
            && self.meets_20ms_response
            && self.meets_50ms_read.unwrap_or(true)
            && self.index_consistency_verified.unwrap_or(true)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "attempted={} successful={} failed={} success_rate={:.2}% tps={:.1}",
            self.total_attempted,
            self.total_successful,
            self.total_failed,
            self.success_rate_pct,
            self.tps
        )?;
        writeln!(
            f,
            "latency(ms) avg={:.2} p50={:.2} p95={:.2} p99={:.2} p99.5={:.2} p99.9={:.2} min={} max={}",
            self.latency.avg_ms,
            self.latency.p50_ms,
            self.latency.p95_ms,
            self.latency.p99_ms,
            self.latency.p99_5_ms,
            self.latency.p99_9_ms,
            self.latency.min_ms,
            self.latency.max_ms
        )?;
        writeln!(
            f,
            "conflicts_resolved={} index_conflicts_resolved={} total_retries={} index_orphan_count={}",
            self.conflicts_resolved,
            self.index_conflicts_resolved,
            self.total_retries,
            self.index_orphan_count
        )?;
        write!(
            f,
            "pass: 100pct_success={} 20ms_response={} 50ms_read={:?} index_consistency={:?} overall={}",
            self.meets_100pct_success,
            self.meets_20ms_response,
            self.meets_50ms_read,
            self.index_consistency_verified,
            self.passed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::aggregator::{Aggregator, SampleOutcome};

    #[test]
    fn overall_pass_requires_index_consistency() {
        let agg = Aggregator::new();
        agg.record(SampleOutcome {
            success: true,
            response_time_ms: 5,
            conflict_resolved: false,
            index_conflict_resolved: false,
            retries: 0,
            index_orphan: false,
        });
        let snap = agg.snapshot();
        let report = BenchmarkReport::from_snapshot(&snap, 1.0, Some(false), None);
        assert!(!report.passed());
    }

    #[test]
    fn overall_pass_when_all_flags_hold() {
        let agg = Aggregator::new();
        agg.record(SampleOutcome {
            success: true,
            response_time_ms: 5,
            conflict_resolved: false,
            index_conflict_resolved: false,
            retries: 0,
            index_orphan: false,
        });
        let snap = agg.snapshot();
        let report = BenchmarkReport::from_snapshot(&snap, 1.0, Some(true), Some(10.0));
        assert!(report.passed());
    }
}

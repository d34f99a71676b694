use crate::worker::{OperationCounters, WorkerReport};

/// A single worker's contribution to the aggregated [`BenchResult`], kept around only when
/// per-worker detail was requested.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSummary {
    pub thread_id:      u32,
    pub inserts:        OperationCounters,
    pub deletes:        OperationCounters,
    pub contains:       OperationCounters,
    pub elapsed_secs:   f64,
}

/// The aggregated outcome of a [`crate::harness::bench`] run (spec §6's harness surface,
/// §4.7 step 5).
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Mean of each worker's elapsed wall-clock time, in seconds.
    pub elapsed_secs:        f64,
    pub total_operations:    u64,
    pub inserts:             OperationCounters,
    pub deletes:             OperationCounters,
    pub contains:            OperationCounters,
    /// `true` when the configured range layout was overlapping, in which case `successful`
    /// counters above are a lower bound on true library-level success, not an exact count
    /// (spec §4.6, §9).
    pub oracle_is_lower_bound: bool,
    /// `Some(passed)` if `basic_testing` was requested; `None` if it was skipped.
    pub smoke_test_passed:    Option<bool>,
    /// Present only when per-worker detail was requested.
    pub per_worker:           Option<Vec<WorkerSummary>>,
}

impl BenchResult {
    pub(crate) fn aggregate(
        reports:               &[WorkerReport],
        oracle_is_lower_bound: bool,
        smoke_test_passed:     Option<bool>,
        keep_per_worker:       bool,
    ) -> Self {
        let mut inserts = OperationCounters::default();
        let mut deletes = OperationCounters::default();
        let mut contains = OperationCounters::default();
        let mut elapsed_sum = 0.0;

        for report in reports {
            inserts.total += report.inserts.total;
            inserts.successful += report.inserts.successful;
            deletes.total += report.deletes.total;
            deletes.successful += report.deletes.successful;
            contains.total += report.contains.total;
            contains.successful += report.contains.successful;
            elapsed_sum += report.elapsed.as_secs_f64();
        }

        #[expect(clippy::cast_precision_loss, reason = "worker counts are tiny relative to f64's mantissa")]
        let elapsed_secs = if reports.is_empty() { 0.0 } else { elapsed_sum / reports.len() as f64 };

        let per_worker = keep_per_worker.then(|| {
            reports
                .iter()
                .enumerate()
                .map(|(thread_id, report)| WorkerSummary {
                    thread_id:    thread_id as u32,
                    inserts:      report.inserts,
                    deletes:      report.deletes,
                    contains:     report.contains,
                    elapsed_secs: report.elapsed.as_secs_f64(),
                })
                .collect()
        });

        Self {
            elapsed_secs,
            total_operations: inserts.total + deletes.total + contains.total,
            inserts,
            deletes,
            contains,
            oracle_is_lower_bound,
            smoke_test_passed,
            per_worker,
        }
    }
}

use std::sync::{Arc, Barrier};
use std::thread;

use skiplist::{build, ConcurrentSkipSet};

use crate::config::{BenchConfig, KeyStrategy, RangeLayout};
use crate::oracle::ShadowOracle;
use crate::result::BenchResult;
use crate::worker::{Worker, WorkerReport};

/// Run the deterministic single-threaded smoke test from spec §4.7 step 2 / §8 scenario 1
/// against a fresh, disposable list instance — never the list the real workload will run
/// against, so a smoke-test failure can never corrupt benchmark state.
fn run_smoke_test(config: &BenchConfig) -> bool {
    let list = build::<u64>(config.variant, config.seed);
    let mut ok = true;

    for k in 0..100_i64 {
        ok &= !list.contains(k);
        ok &= list.add(k, 0);
        ok &= list.contains(k);
    }
    for k in 0..100_i64 {
        ok &= list.contains(k);
        ok &= list.remove(k);
        ok &= !list.contains(k);
    }
    ok &= !list.contains(999);

    if !ok {
        tracing::warn!("smoke test failed one or more assertions");
    }
    ok
}

/// Insert `prefill_count` keys, chosen by the configured [`KeyStrategy`] over the full
/// `[start_range, end_range)` span, before workers start (spec §4.7 step 3).
fn prefill(list: &Arc<dyn ConcurrentSkipSet<u64>>, oracle: &ShadowOracle, config: &BenchConfig) {
    if config.prefill_count == 0 {
        return;
    }

    let span = tracing::debug_span!("prefill", count = config.prefill_count);
    let _entered = span.enter();

    let mut rng = oorandom::Rand32::new(config.seed);
    let keys: Vec<i64> = match config.strategy {
        KeyStrategy::Linear | KeyStrategy::Random => {
            (config.start_range..config.end_range).collect()
        }
        KeyStrategy::ShuffledUnique => {
            let mut keys: Vec<i64> = (config.start_range..config.end_range).collect();
            for i in (1..keys.len()).rev() {
                let j = (rng.rand_u32() as usize) % (i + 1);
                keys.swap(i, j);
            }
            keys
        }
    };

    for &key in keys.iter().take(config.prefill_count as usize) {
        if list.add(key, 0) {
            oracle.mark_present(key);
        }
    }
}

/// Run the benchmark harness described by spec §4.7: build the list and oracle, optionally
/// smoke-test, prefill, then fork workers at a barrier and aggregate their counters.
#[must_use]
pub fn bench(config: &BenchConfig) -> BenchResult {
    let smoke_test_passed = config.basic_testing.then(|| run_smoke_test(config));

    let list: Arc<dyn ConcurrentSkipSet<u64>> = Arc::from(build::<u64>(config.variant, config.seed));
    let oracle = Arc::new(ShadowOracle::new(config.start_range, config.end_range));

    prefill(&list, &oracle, config);

    let num_threads = config.num_threads as usize;
    let barrier = Arc::new(Barrier::new(num_threads));

    let reports: Vec<WorkerReport> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.num_threads)
            .map(|thread_id| {
                let list = Arc::clone(&list);
                let oracle = Arc::clone(&oracle);
                let barrier = Arc::clone(&barrier);
                let worker = Worker::new(thread_id, *config);
                scope.spawn(move || {
                    barrier.wait();
                    worker.run(&list, &oracle)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().expect("worker thread panicked")).collect()
    });

    let oracle_is_lower_bound = config.range_layout == RangeLayout::Overlapping;
    BenchResult::aggregate(&reports, oracle_is_lower_bound, smoke_test_passed, true)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::OperationMix;

    /// Routes this crate's `tracing` events to the test harness's captured output so a failing
    /// run shows worker spans and smoke-test warnings alongside the assertion failure.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn disjoint_range_is_exact() {
        init_tracing();
        let config = BenchConfig::new(
            skiplist::Variant::Coarse,
            4,
            Duration::from_millis(200),
            OperationMix { insert_pct: 10, delete_pct: 10, contains_pct: 80 },
            0,
            100_000,
            RangeLayout::Disjoint,
            KeyStrategy::Random,
            0,
            true,
            7,
        )
        .unwrap();

        let result = bench(&config);
        assert_eq!(result.smoke_test_passed, Some(true));
        assert_eq!(result.inserts.successful, result.inserts.total);
        assert_eq!(result.deletes.successful, result.deletes.total);
        assert_eq!(result.contains.successful, result.contains.total);
        assert!(!result.oracle_is_lower_bound);
    }

    #[test]
    fn overlapping_range_runs_without_crashing() {
        init_tracing();
        let config = BenchConfig::new(
            skiplist::Variant::LockFree,
            4,
            Duration::from_millis(200),
            OperationMix { insert_pct: 40, delete_pct: 40, contains_pct: 20 },
            0,
            1_000,
            RangeLayout::Overlapping,
            KeyStrategy::Random,
            0,
            false,
            11,
        )
        .unwrap();

        let result = bench(&config);
        assert!(result.total_operations > 0);
        assert!(result.oracle_is_lower_bound);
        assert!(result.inserts.successful <= result.inserts.total);
    }
}

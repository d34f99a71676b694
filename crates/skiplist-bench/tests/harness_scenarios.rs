//! Black-box tests for spec §8's harness-level concrete scenarios (4-6). Runtimes are shortened
//! from the spec's literal "1 s" to keep the test suite fast; the scenario shapes (worker count,
//! mix, range layout) are unchanged.

use std::time::Duration;

use skiplist_bench::{bench, BenchConfig, KeyStrategy, OperationMix, RangeLayout};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Scenario 4: disjoint-range harness, 4 workers, mix (10, 10, 80) — oracle must be exact.
#[test]
fn scenario_4_disjoint_range_oracle_is_exact() {
    init_tracing();
    let config = BenchConfig::new(
        skiplist::Variant::Lazy,
        4,
        Duration::from_millis(300),
        OperationMix { insert_pct: 10, delete_pct: 10, contains_pct: 80 },
        0,
        100_000,
        RangeLayout::Disjoint,
        KeyStrategy::Random,
        0,
        false,
        123,
    )
    .unwrap();

    let result = bench(&config);
    assert_eq!(result.inserts.successful, result.inserts.total);
    assert_eq!(result.deletes.successful, result.deletes.total);
    assert_eq!(result.contains.successful, result.contains.total);
}

/// Scenario 5: overlapping-range harness, 4 workers, mix (40, 40, 20) — no crashes, operations
/// actually ran.
#[test]
fn scenario_5_overlapping_range_survives_contention() {
    init_tracing();
    let config = BenchConfig::new(
        skiplist::Variant::LockFree,
        4,
        Duration::from_millis(300),
        OperationMix { insert_pct: 40, delete_pct: 40, contains_pct: 20 },
        0,
        10_000,
        RangeLayout::Overlapping,
        KeyStrategy::Random,
        0,
        false,
        456,
    )
    .unwrap();

    let result = bench(&config);
    assert!(result.total_operations > 0);
    assert!(result.oracle_is_lower_bound);
}

/// Scenario 6: 64 workers, mix (34, 33, 33), key range 1024, overlapping — survives heavy
/// contention and produces a sensible result. The "no flapping at rest" half of this scenario
/// (repeated `contains` on the same key agreeing once contention settles) is checked directly
/// against each variant's list in `skiplist`'s own `contains_does_not_flap_at_rest` test, since
/// `bench` does not expose its internal list after the run.
#[test]
fn scenario_6_survives_heavy_contention() {
    init_tracing();
    let config = BenchConfig::new(
        skiplist::Variant::Lazy,
        64,
        Duration::from_millis(500),
        OperationMix { insert_pct: 34, delete_pct: 33, contains_pct: 33 },
        0,
        1_024,
        RangeLayout::Overlapping,
        KeyStrategy::Random,
        0,
        false,
        789,
    )
    .unwrap();

    let result = bench(&config);
    assert!(result.total_operations > 0);
    assert!(result.oracle_is_lower_bound);
    assert_eq!(result.per_worker.as_ref().map(Vec::len), Some(64));
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use oorandom::Rand32;
use skiplist::ConcurrentSkipSet;

use crate::config::{BenchConfig, KeyStrategy, RangeLayout};
use crate::oracle::ShadowOracle;

/// Per-operation-kind tallies accumulated by one worker over its run.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationCounters {
    pub total:      u64,
    pub successful: u64,
}

impl OperationCounters {
    fn record(&mut self, agreed_with_oracle: bool) {
        self.total += 1;
        if agreed_with_oracle {
            self.successful += 1;
        }
    }
}

/// The outcome of one worker's run: its per-kind counters and how long it actually ran.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerReport {
    pub inserts:     OperationCounters,
    pub deletes:     OperationCounters,
    pub contains:    OperationCounters,
    pub elapsed:     Duration,
}

impl WorkerReport {
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.inserts.total + self.deletes.total + self.contains.total
    }
}

/// Generates the next key a worker should operate on, per spec §4.6's three strategies.
enum KeySource {
    Random { start: i64, len: u32 },
    Linear { start: i64, len: i64, prev: i64 },
    ShuffledUnique { shuffled: Vec<i64>, next_index: usize },
}

impl KeySource {
    fn new(strategy: KeyStrategy, start: i64, end: i64, rng: &mut Rand32) -> Self {
        match strategy {
            KeyStrategy::Random => {
                // Safe: `BenchConfig::new` enforces `start < end` and a key-range size that was
                // already validated to fit prefill counts in `u64`; ranges used by this harness
                // stay well within `u32`.
                let len = u32::try_from(end - start).unwrap_or(u32::MAX);
                Self::Random { start, len }
            }
            KeyStrategy::Linear => Self::Linear { start, len: end - start, prev: start - 1 },
            KeyStrategy::ShuffledUnique => {
                let mut shuffled: Vec<i64> = (start..end).collect();
                // Fisher-Yates.
                for i in (1..shuffled.len()).rev() {
                    let j = (rng.rand_u32() as usize) % (i + 1);
                    shuffled.swap(i, j);
                }
                Self::ShuffledUnique { shuffled, next_index: 0 }
            }
        }
    }

    /// Returns the next key, or `None` if this strategy has been exhausted (only
    /// [`KeySource::ShuffledUnique`] ever exhausts; the other two are unbounded).
    fn next_key(&mut self, rng: &mut Rand32) -> Option<i64> {
        match self {
            Self::Random { start, len } => {
                if *len == 0 {
                    return None;
                }
                Some(*start + i64::from(rng.rand_u32() % *len))
            }
            Self::Linear { start, len, prev } => {
                if *len == 0 {
                    return None;
                }
                let next = (*prev - *start + 1).rem_euclid(*len) + *start;
                *prev = next;
                Some(next)
            }
            Self::ShuffledUnique { shuffled, next_index } => {
                let key = shuffled.get(*next_index).copied()?;
                *next_index += 1;
                Some(key)
            }
        }
    }
}

/// A single benchmark worker (spec §4.5/§4.6): drives operations against the shared list and
/// shadow oracle for one thread's fixed wall-clock window.
pub struct Worker {
    thread_id: u32,
    config:    BenchConfig,
}

impl Worker {
    #[must_use]
    pub fn new(thread_id: u32, config: BenchConfig) -> Self {
        Self { thread_id, config }
    }

    /// The `[start, end)` key range this worker is assigned, per the configured [`RangeLayout`].
    fn assigned_range(&self) -> (i64, i64) {
        match self.config.range_layout {
            RangeLayout::Overlapping => (self.config.start_range, self.config.end_range),
            RangeLayout::Disjoint => {
                let total = self.config.end_range - self.config.start_range;
                let threads = i64::from(self.config.num_threads);
                let span = total / threads;
                let start = self.config.start_range + span * i64::from(self.thread_id);
                let end = if self.thread_id + 1 == self.config.num_threads {
                    self.config.end_range
                } else {
                    start + span
                };
                (start, end)
            }
        }
    }

    /// Run this worker's loop until its wall-clock budget is exhausted (or, for
    /// [`KeyStrategy::ShuffledUnique`], until its key range is exhausted first).
    pub fn run(&self, list: &Arc<dyn ConcurrentSkipSet<u64>>, oracle: &Arc<ShadowOracle>) -> WorkerReport {
        let span = tracing::debug_span!("worker", thread_id = self.thread_id);
        let _entered = span.enter();

        // Pin this thread's identifier once so every list this worker touches draws levels from
        // its own `seed ^ thread_id` stream (spec §4.1) instead of contending on one shared
        // generator owned by the list.
        skiplist::set_thread_identifier(u64::from(self.thread_id));

        let (start, end) = self.assigned_range();
        let mut rng = Rand32::new(self.config.seed ^ u64::from(self.thread_id));
        let mut keys = KeySource::new(self.config.strategy, start, end, &mut rng);
        let mut report = WorkerReport::default();

        let start_time = Instant::now();
        while start_time.elapsed() < self.config.runtime {
            let Some(key) = keys.next_key(&mut rng) else {
                tracing::debug!("key strategy exhausted, stopping early");
                break;
            };

            let roll = 1 + (rng.rand_u32() % 100);
            if roll <= u32::from(self.config.mix.insert_pct) {
                self.do_insert(list, oracle, key, &mut report);
            } else if roll <= u32::from(self.config.mix.insert_pct) + u32::from(self.config.mix.delete_pct) {
                self.do_delete(list, oracle, key, &mut report);
            } else {
                self.do_contains(list, oracle, key, &mut report);
            }
        }

        report.elapsed = start_time.elapsed();
        tracing::debug!(ops = report.total_operations(), "worker finished");
        report
    }

    fn do_insert(
        &self,
        list:   &Arc<dyn ConcurrentSkipSet<u64>>,
        oracle: &Arc<ShadowOracle>,
        key:    i64,
        report: &mut WorkerReport,
    ) {
        if oracle.believes_present(key) {
            return;
        }
        let inserted = list.add(key, u64::from(self.thread_id));
        report.inserts.total += 1;
        if inserted {
            oracle.mark_present(key);
            report.inserts.successful += 1;
        }
    }

    fn do_delete(
        &self,
        list:   &Arc<dyn ConcurrentSkipSet<u64>>,
        oracle: &Arc<ShadowOracle>,
        key:    i64,
        report: &mut WorkerReport,
    ) {
        let removed = list.remove(key);
        let expected = oracle.believes_present(key);
        report.deletes.record(removed == expected);
        if removed {
            oracle.mark_absent(key);
        }
    }

    fn do_contains(
        &self,
        list:   &Arc<dyn ConcurrentSkipSet<u64>>,
        oracle: &Arc<ShadowOracle>,
        key:    i64,
        report: &mut WorkerReport,
    ) {
        let present = list.contains(key);
        let expected = oracle.believes_present(key);
        report.contains.record(present == expected);
    }
}

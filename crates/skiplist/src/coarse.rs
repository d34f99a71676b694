use parking_lot::Mutex;

use crate::interface::SkipSet;
use crate::sequential::SequentialSkipSet;

/// Coarse-grained (global-lock) variant (spec §4.3): every operation acquires the list's single
/// exclusive lock before delegating to [`SequentialSkipSet`]. Correctness reduces entirely to
/// the sequential baseline; this variant exists as a correctness and scalability-lower-bound
/// reference for the benchmark harness.
///
/// Each list instance owns its own lock — this is not a process-wide static.
#[derive(Debug)]
pub struct CoarseSkipSet<V> {
    inner: Mutex<SequentialSkipSet<V>>,
}

impl<V> SkipSet<V> for CoarseSkipSet<V> {
    fn new_seeded(seed: u64) -> Self {
        Self {
            inner: Mutex::new(SequentialSkipSet::new_seeded(seed)),
        }
    }

    fn add(&self, key: i64, value: V) -> bool {
        self.inner.lock().add(key, value)
    }

    fn remove(&self, key: i64) -> bool {
        self.inner.lock().remove(key)
    }

    fn contains(&self, key: i64) -> bool {
        self.inner.lock().contains(key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn smoke_scenario() {
        let list = CoarseSkipSet::new_seeded(7);
        for k in 0..100 {
            assert!(!list.contains(k));
            assert!(list.add(k, ()));
            assert!(list.contains(k));
        }
        for k in 0..100 {
            assert!(list.remove(k));
            assert!(!list.contains(k));
        }
        assert!(!list.contains(999));
    }

    #[test]
    fn concurrent_disjoint_inserts_all_land() {
        let list = Arc::new(CoarseSkipSet::new_seeded(1));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let list = Arc::clone(&list);
                thread::spawn(move || {
                    for k in 0..100 {
                        list.add(t * 100 + k, ());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for k in 0..800 {
            assert!(list.contains(k));
        }
    }
}

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use oorandom::Rand32;

/// The maximum height of any skiplist implementation in this crate: the cap on forward-pointer
/// fan-out per node, and one greater than the highest legal `top_level`.
pub const MAX_LEVEL: usize = 32;

/// Per-level promotion probability used by [`random_level`].
const P_NUMERATOR: u32 = 1;
const P_DENOMINATOR: u32 = 2;

/// A simple PRNG trait, used for generating random levels for nodes in a skiplist.
///
/// Every variant in this crate owns one generator per thread; there is no shared RNG state,
/// so reproducing a run only requires reproducing each thread's seed.
pub(crate) trait Prng32 {
    /// Produces a random `u32` in the range `[0, u32::MAX]`.
    #[must_use]
    fn rand_u32(&mut self) -> u32;
}

/// A per-thread level generator, seeded from the harness seed XORed with a thread identifier.
#[derive(Debug, Clone)]
pub struct LevelGenerator(Rand32);

impl LevelGenerator {
    /// Construct a generator seeded with `seed ^ thread_id`, so that a given `(seed, thread_id)`
    /// pair always reproduces the same stream of levels.
    #[must_use]
    pub fn new(seed: u64, thread_id: u64) -> Self {
        Self(Rand32::new(seed ^ thread_id))
    }

    /// Draw the next random level in `[0, MAX_LEVEL - 1]`.
    #[must_use]
    pub fn next_level(&mut self) -> usize {
        random_level(&mut self.0, P_NUMERATOR, P_DENOMINATOR, MAX_LEVEL - 1)
    }
}

impl Prng32 for Rand32 {
    #[inline]
    fn rand_u32(&mut self) -> u32 {
        Self::rand_u32(self)
    }
}

thread_local! {
    static THREAD_IDENTIFIER: Cell<Option<u64>> = const { Cell::new(None) };
    static GENERATORS: RefCell<HashMap<(usize, u64), LevelGenerator>> = RefCell::new(HashMap::new());
}

/// Pin the identifier this thread's future level draws are seeded with (spec §4.1: `seed ^
/// thread_id`). The benchmark harness calls this once per worker, with that worker's thread
/// index, before it touches any list — see `skiplist_bench::worker::Worker::run`.
///
/// Callers that never opt in (ad hoc single- or multi-threaded use of this crate directly) get a
/// fallback identifier derived from this thread's OS-assigned [`std::thread::ThreadId`] instead,
/// established lazily the first time a level is drawn and then held fixed for the rest of the
/// thread's life. That fallback is stable for the process's lifetime but not reproducible across
/// runs, since the OS is free to hand out different thread IDs from one run to the next.
pub fn set_thread_identifier(id: u64) {
    THREAD_IDENTIFIER.with(|cell| cell.set(Some(id)));
}

fn thread_identifier() -> u64 {
    THREAD_IDENTIFIER.with(|cell| {
        if let Some(id) = cell.get() {
            return id;
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::thread::current().id().hash(&mut hasher);
        let fallback = hasher.finish();
        cell.set(Some(fallback));
        fallback
    })
}

/// Draw the next level for `list_id` (a skiplist instance's own address, used only as a
/// per-instance key) using *this thread's own* generator for that list, lazily creating it from
/// `base_seed` the first time this thread touches that list.
///
/// This is what gives every variant a genuinely per-thread RNG stream (spec §4.1, §9): each
/// `(thread, list)` pair gets its own [`LevelGenerator`] rather than every caller contending on
/// one generator owned by the list itself, which would both serialize every `add` on a single
/// mutex purely to draw a level and collapse per-thread reproducibility into one shared,
/// scheduling-order-dependent stream.
///
/// Keying on the list's address alone would wrongly resume a stale generator if a list is
/// dropped and a new, differently-seeded one happens to be allocated at the same address; keying
/// on `(address, base_seed)` instead means that can only happen if the reused list also picked
/// the exact same seed, in which case resuming the same stream is harmless.
pub(crate) fn next_level_for(list_id: usize, base_seed: u64) -> usize {
    GENERATORS.with(|cell| {
        cell.borrow_mut()
            .entry((list_id, base_seed))
            .or_insert_with(|| LevelGenerator::new(base_seed, thread_identifier()))
            .next_level()
    })
}

/// Returns the smallest non-negative integer `k` such that, drawing `k + 1` independent
/// Bernoulli(`numerator / denominator`) trials, the last trial is false; capped at `cap`.
///
/// With `numerator = 1, denominator = 2` this is `P = 0.5` from spec §4.1: each additional level
/// is half as likely as the one below it.
pub(crate) fn random_level<P: Prng32>(
    prng:       &mut P,
    numerator:   u32,
    denominator: u32,
    cap:         usize,
) -> usize {
    let mut level = 0;
    while level < cap && prng.rand_u32() % denominator < numerator {
        level += 1;
    }
    level
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrng(Vec<u32>);

    impl Prng32 for FixedPrng {
        fn rand_u32(&mut self) -> u32 {
            if self.0.is_empty() { u32::MAX } else { self.0.remove(0) }
        }
    }

    #[test]
    fn caps_at_max() {
        // Always "succeed" (draw 0, which is < denominator/2), so the cap should kick in.
        let mut prng = FixedPrng(vec![0; 100]);
        assert_eq!(random_level(&mut prng, 1, 2, 5), 5);
    }

    #[test]
    fn stops_at_first_failure() {
        // succeed, succeed, fail -> level 2
        let mut prng = FixedPrng(vec![0, 0, u32::MAX]);
        assert_eq!(random_level(&mut prng, 1, 2, 10), 2);
    }

    #[test]
    fn zero_cap_is_always_zero() {
        let mut prng = FixedPrng(vec![0; 10]);
        assert_eq!(random_level(&mut prng, 1, 2, 0), 0);
    }

    #[test]
    fn reproducible_for_same_seed() {
        let mut a = LevelGenerator::new(42, 7);
        let mut b = LevelGenerator::new(42, 7);
        let levels_a: Vec<_> = (0..50).map(|_| a.next_level()).collect();
        let levels_b: Vec<_> = (0..50).map(|_| b.next_level()).collect();
        assert_eq!(levels_a, levels_b);
    }

    #[test]
    fn different_thread_ids_diverge() {
        let mut a = LevelGenerator::new(42, 1);
        let mut b = LevelGenerator::new(42, 2);
        let levels_a: Vec<_> = (0..50).map(|_| a.next_level()).collect();
        let levels_b: Vec<_> = (0..50).map(|_| b.next_level()).collect();
        assert_ne!(levels_a, levels_b);
    }

    #[test]
    fn levels_stay_in_bounds() {
        let mut gen = LevelGenerator::new(1, 1);
        for _ in 0..10_000 {
            let level = gen.next_level();
            assert!(level < MAX_LEVEL);
        }
    }
}

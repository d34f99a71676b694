use crate::coarse::CoarseSkipSet;
use crate::lazy::LazySkipSet;
use crate::lockfree::LockFreeSkipSet;
use crate::sequential::SequentialSkipSet;

/// The common contract implemented by every skiplist variant in this crate.
///
/// `init` from spec §6 corresponds to construction via [`new_seeded`]; `clean` corresponds to
/// `Drop`. Every method is total: none of them panic, and none of them return anything other
/// than the outcome of the operation (spec §7 — "no panics, no fatal errors, and no
/// exceptions").
///
/// [`new_seeded`]: SkipSet::new_seeded
pub trait SkipSet<V> {
    /// Construct an empty set, seeding any internal per-thread level generators from `seed`.
    #[must_use]
    fn new_seeded(seed: u64) -> Self
    where
        Self: Sized;

    /// Insert `key` with the given `value`. Returns `true` if `key` became a member, `false` if
    /// it was already present (a no-op).
    fn add(&self, key: i64, value: V) -> bool;

    /// Remove `key`. Returns `true` if `key` was a member and is now removed, `false` if it was
    /// already absent (a no-op).
    fn remove(&self, key: i64) -> bool;

    /// Returns `true` iff `key` is currently a member.
    #[must_use]
    fn contains(&self, key: i64) -> bool;
}

/// A [`SkipSet`] that is additionally safe to share across threads.
///
/// [`sequential::SequentialSkipSet`] deliberately does *not* implement this: it performs no
/// internal synchronization, so sharing `&SequentialSkipSet<V>` across threads would be a data
/// race. It is still a [`SkipSet`] (spec §4.2's algorithm is the basis every other variant
/// builds on), just not one the multi-threaded harness can hold behind an `Arc`.
///
/// [`sequential::SequentialSkipSet`]: crate::sequential::SequentialSkipSet
pub trait ConcurrentSkipSet<V>: SkipSet<V> + Send + Sync {}

impl<V: Send> ConcurrentSkipSet<V> for CoarseSkipSet<V> {}
impl<V: Send + Sync> ConcurrentSkipSet<V> for LazySkipSet<V> {}
impl<V: Send + Sync> ConcurrentSkipSet<V> for LockFreeSkipSet<V> {}

/// Selects which concurrency strategy a [`SkipSet`] trait object should use.
///
/// Per spec §9's design notes, variant selection happens once, at construction time, through
/// this capability interface — never by branching on the variant inside a single call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// [`sequential::SequentialSkipSet`] behind one exclusive lock (spec §4.3).
    ///
    /// [`sequential::SequentialSkipSet`]: crate::sequential::SequentialSkipSet
    Coarse,
    /// Lazy, lock-per-node, optimistic fine-grained locking (spec §4.4).
    Lazy,
    /// Lock-free, marked-pointer CAS-based deletion (spec §4.5).
    LockFree,
}

/// Build a boxed [`ConcurrentSkipSet`] trait object implementing the requested [`Variant`].
///
/// `seed` is forwarded to [`SkipSet::new_seeded`]; callers that want independent per-thread level
/// streams (spec §4.1) are responsible for XOR-ing in a thread identifier before calling this
/// function, as [`crate::level::LevelGenerator::new`] does internally.
#[must_use]
pub fn build<V>(variant: Variant, seed: u64) -> Box<dyn ConcurrentSkipSet<V>>
where
    V: Send + Sync + 'static,
{
    match variant {
        Variant::Coarse   => Box::new(CoarseSkipSet::new_seeded(seed)),
        Variant::Lazy     => Box::new(LazySkipSet::new_seeded(seed)),
        Variant::LockFree => Box::new(LockFreeSkipSet::new_seeded(seed)),
    }
}

#![expect(unsafe_code, reason = "tagged-pointer lock-free skiplist: deletion marks live in the pointer's tag bit, reclamation is epoch-deferred")]

//! Lock-free skiplist (spec §4.5): insertion links a new node bottom-up, starting with a single
//! CAS at level 0 as its linearization point and opportunistically racing to link higher levels
//! afterward; deletion marks a node top-down via the tag bit on its own forward pointers, with
//! the level-0 mark as the sole linearization point, then helps physically unlink it. Any
//! traversal that encounters a marked node's tag snips it from its predecessor on the way past
//! ("helping"), so removal completes even if the original remover is descheduled.
//!
//! This is the classic Fraser-style construction (used by `java.util.concurrent`'s
//! `ConcurrentSkipListMap`): a node's existence at level 0 is what makes it a member, so it is
//! safe for `contains`/`add`/`remove` to observe a node that is still being linked into higher
//! levels, or a node that has been logically marked but not yet fully unlinked.

use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use crate::interface::SkipSet;
use crate::level::MAX_LEVEL;

struct Node<V> {
    key:       i64,
    value:     Option<V>,
    top_level: usize,
    next:      Vec<Atomic<Node<V>>>,
}

impl<V> std::fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("key", &self.key).field("top_level", &self.top_level).finish()
    }
}

impl<V> Node<V> {
    fn new_header() -> Self {
        Self {
            key:       i64::MIN,
            value:     None,
            top_level: MAX_LEVEL - 1,
            next:      (0..MAX_LEVEL).map(|_| Atomic::null()).collect(),
        }
    }

    fn new(key: i64, value: V, top_level: usize) -> Owned<Self> {
        Owned::new(Self {
            key,
            value: Some(value),
            top_level,
            next: (0..=top_level).map(|_| Atomic::null()).collect(),
        })
    }
}

/// Lock-free, marked-pointer variant (spec §4.5).
#[derive(Debug)]
pub struct LockFreeSkipSet<V> {
    header:    Node<V>,
    base_seed: u64,
}

impl<V> LockFreeSkipSet<V> {
    /// Search for `key`, snipping any logically-marked node encountered along the way.
    ///
    /// Returns whether a live (unmarked) node with key `key` exists, plus the immediate
    /// predecessor and successor at every level, suitable both for `add`'s and `remove`'s own
    /// re-derivation and for `contains`'s single pass.
    fn find<'g>(
        &'g self,
        key:   i64,
        guard: &'g epoch::Guard,
    ) -> (bool, [Shared<'g, Node<V>>; MAX_LEVEL], [Shared<'g, Node<V>>; MAX_LEVEL]) {
        'retry: loop {
            let mut preds = [Shared::null(); MAX_LEVEL];
            let mut succs = [Shared::null(); MAX_LEVEL];
            let mut pred: *const Node<V> = &self.header;

            for level in (0..MAX_LEVEL).rev() {
                // SAFETY: `pred` is always a live node.
                let pred_ref = unsafe { &*pred };
                let mut curr = pred_ref.next[level].load(Ordering::Acquire, guard);

                loop {
                    let Some(curr_ref) = (unsafe { curr.as_ref() }) else { break };
                    let succ = curr_ref.next[level].load(Ordering::Acquire, guard);

                    if succ.tag() == 1 {
                        // `curr` is marked for deletion at this level; help unlink it.
                        let unmarked_succ = succ.with_tag(0);
                        match pred_ref.next[level].compare_exchange(
                            curr,
                            unmarked_succ,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        ) {
                            Ok(_) => {
                                if level == 0 {
                                    // SAFETY: this CAS is what physically removes `curr` from the
                                    // level-0 chain; it is unreachable from any future `find`.
                                    // Actual deallocation is deferred until no pinned guard could
                                    // still hold a reference.
                                    unsafe { guard.defer_destroy(curr) };
                                }
                                curr = unmarked_succ;
                                continue;
                            }
                            // `pred`'s pointer changed under us; restart the whole search.
                            Err(_) => continue 'retry,
                        }
                    }

                    if curr_ref.key < key {
                        pred = curr_ref;
                        curr = succ;
                    } else {
                        break;
                    }
                }

                preds[level] = Shared::from(pred as *const Node<V>);
                succs[level] = curr;
            }

            let found = unsafe { succs[0].as_ref() }.is_some_and(|n| n.key == key);
            return (found, preds, succs);
        }
    }
}

impl<V> SkipSet<V> for LockFreeSkipSet<V> {
    fn new_seeded(seed: u64) -> Self {
        Self {
            header:    Node::new_header(),
            base_seed: seed,
        }
    }

    fn add(&self, key: i64, value: V) -> bool {
        let top_level = crate::level::next_level_for(self as *const Self as usize, self.base_seed);
        let mut value = Some(value);

        let new_node_shared = loop {
            let guard = epoch::pin();
            let (found, preds, succs) = self.find(key, &guard);
            if found {
                return false;
            }

            let new_node = Node::new(key, value.take().expect("value consumed at most once"), top_level);
            for level in 0..=top_level {
                new_node.next[level].store(succs[level], Ordering::Relaxed);
            }
            let new_node_shared = new_node.into_shared(&guard);

            // SAFETY: `preds[0]` is live.
            let pred0 = unsafe { &*preds[0].as_raw() };
            match pred0.next[0].compare_exchange(
                succs[0],
                new_node_shared,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(_) => break new_node_shared,
                Err(_) => {
                    // Not yet published anywhere: reclaim immediately rather than deferring.
                    value = unsafe { new_node_shared.into_owned() }.into_box().value;
                    continue;
                }
            }
        };

        for level in 1..=top_level {
            loop {
                let guard = epoch::pin();
                let (_, preds, succs) = self.find(key, &guard);
                // SAFETY: `new_node_shared` is live; nothing frees it while it's reachable at
                // level 0, which it is throughout this loop.
                let new_node_ref = unsafe { new_node_shared.as_ref() }.expect("linked at level 0");
                new_node_ref.next[level].store(succs[level], Ordering::Relaxed);

                // SAFETY: `preds[level]` is live.
                let pred_ref = unsafe { &*preds[level].as_raw() };
                match pred_ref.next[level].compare_exchange(
                    succs[level],
                    new_node_shared,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => break,
                    Err(_) => continue,
                }
            }
        }

        true
    }

    fn remove(&self, key: i64) -> bool {
        let guard = epoch::pin();
        let (found, _preds, succs) = self.find(key, &guard);
        if !found {
            return false;
        }
        // SAFETY: `found` implies `succs[0]` is non-null and unmarked.
        let victim = succs[0];
        let victim_ref = unsafe { victim.as_ref() }.expect("found implies non-null");

        for level in (1..=victim_ref.top_level).rev() {
            loop {
                let succ = victim_ref.next[level].load(Ordering::Acquire, &guard);
                if succ.tag() == 1 {
                    break;
                }
                let marked = succ.with_tag(1);
                match victim_ref.next[level].compare_exchange(
                    succ,
                    marked,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    &guard,
                ) {
                    Ok(_) => break,
                    Err(_) => continue,
                }
            }
        }

        loop {
            let succ0 = victim_ref.next[0].load(Ordering::Acquire, &guard);
            if succ0.tag() == 1 {
                // Lost the race: someone else's `remove` marked level 0 first.
                return false;
            }
            let marked0 = succ0.with_tag(1);
            match victim_ref.next[0].compare_exchange(
                succ0,
                marked0,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }

        // Drive physical unlinking at every level; `find`'s helping logic does the rest.
        let _ = self.find(key, &guard);
        true
    }

    fn contains(&self, key: i64) -> bool {
        let guard = epoch::pin();
        self.find(key, &guard).0
    }
}

// SAFETY: every `Node<V>` is allocated via `Node::new` (an `Owned`, requiring `V: Send`) and
// mutated only through atomic CAS loops; no `&V` escapes this type's public API.
unsafe impl<V: Send> Send for LockFreeSkipSet<V> {}
// SAFETY: as above; all structural reads use `Atomic<Node<V>>` with explicit orderings, so
// sharing `&LockFreeSkipSet<V>` across threads is race-free for `V: Sync`.
unsafe impl<V: Send + Sync> Sync for LockFreeSkipSet<V> {}

impl<V> Drop for LockFreeSkipSet<V> {
    fn drop(&mut self) {
        // No concurrent access is possible once we have `&mut self`.
        let guard = unsafe { epoch::unprotected() };
        let mut curr = self.header.next[0].load(Ordering::Relaxed, guard);
        while let Some(curr_ref) = unsafe { curr.as_ref() } {
            let next = curr_ref.next[0].load(Ordering::Relaxed, guard).with_tag(0);
            // SAFETY: `curr` was allocated by `Node::new`, and `&mut self` proves exclusive
            // access.
            unsafe { drop(curr.with_tag(0).into_owned()) };
            curr = next;
        }
    }
}

//! Keyed list diff
//!
//! Matches an old child list against a new one by identity key and produces
//! a patch plan. This is a **pure algorithm module**: it works on keys only
//! and never touches work nodes or the host.
//!
//! # Algorithm
//!
//! A single forward pass with a cursor `i` over old and `j` over new:
//!
//! 1. Index old positions by key (a FIFO queue per key, so duplicate keys
//!    resolve first-come first-served) and new keys by first occurrence.
//! 2. Skip old slots already consumed by a move.
//! 3. When one side is exhausted, remaining new items append and remaining
//!    old items are removed.
//! 4. Equal keys at `i` and `j`: stable update, advance both.
//! 5. Old key absent from the new list: remove, advance `i`.
//! 6. New key has no old entry left: insert before old `i`, advance `j`.
//! 7. Otherwise: move the first queued old entry before old `i`, advance `j`.
//!
//! Steps 6 and 7 record `j` as the partner of old `i`. If old `i` turns out
//! to be removed, the commit phase detaches it only after its partner is
//! placed, since the partner was anchored on it.
//!
//! # Complexity
//!
//! - Time: O(n + m) expected (hash lookups)
//! - Space: O(n + m)

use std::collections::VecDeque;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

// =============================================================================
// Public Types
// =============================================================================

/// Type half of an identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KindKey {
    Root,
    Element(CompactString),
    Text,
    /// Component, by name
    Component(&'static str),
}

/// `(explicit key, type)` pair. Items sharing an identity key are the same
/// logical item even when reordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub key: Option<CompactString>,
    pub kind: KindKey,
}

impl IdentityKey {
    pub fn new(key: Option<CompactString>, kind: KindKey) -> Self {
        Self { key, kind }
    }
}

/// Plan for one entry of the new list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewOp {
    /// Reuse `old` in place
    Update { old: usize },
    /// Reuse `old`, placed before old `anchor`
    Move { old: usize, anchor: usize },
    /// Create a new node, placed before old `anchor` (append when `None`)
    Insert { anchor: Option<usize> },
}

/// Outcome for one entry of the old list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OldOp {
    /// Input slot was already empty
    Vacant,
    /// Reused in place by new `new`
    Kept { new: usize },
    /// Reused by new `new` at another position
    Moved { new: usize },
    /// Torn down. `partner` is the last new entry anchored on this one.
    Remove { partner: Option<usize> },
}

impl OldOp {
    #[inline]
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

/// Statistics about a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub updated: usize,
    pub moved: usize,
    pub inserted: usize,
    pub removed: usize,
}

/// Result of [`diff_keyed`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct KeyedDiff {
    /// One op per new entry, in new order
    pub new_ops: Vec<NewOp>,
    /// One op per old entry, in old order
    pub old_ops: Vec<OldOp>,
    pub stats: DiffStats,
}

impl KeyedDiff {
    /// Only stable updates, nothing inserted, moved or removed.
    pub fn is_stable(&self) -> bool {
        self.stats.moved == 0 && self.stats.inserted == 0 && self.stats.removed == 0
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Diff an old key list (with `None` for consumed slots) against a new one.
pub fn diff_keyed(old: &[Option<IdentityKey>], new: &[IdentityKey]) -> KeyedDiff {
    let old_len = old.len();
    let new_len = new.len();

    let mut old_index: FxHashMap<&IdentityKey, VecDeque<usize>> = FxHashMap::default();
    for (i, key) in old.iter().enumerate() {
        if let Some(key) = key {
            old_index.entry(key).or_default().push_back(i);
        }
    }
    let mut new_index: FxHashMap<&IdentityKey, usize> = FxHashMap::default();
    for (j, key) in new.iter().enumerate() {
        new_index.entry(key).or_insert(j);
    }

    let mut slots: Vec<Option<&IdentityKey>> = old.iter().map(Option::as_ref).collect();
    let mut old_ops = vec![OldOp::Vacant; old_len];
    let mut partners: Vec<Option<usize>> = vec![None; old_len];
    let mut new_ops = Vec::with_capacity(new_len);
    let mut stats = DiffStats::default();

    let (mut i, mut j) = (0, 0);
    while i < old_len || j < new_len {
        if i >= old_len {
            new_ops.push(NewOp::Insert { anchor: None });
            stats.inserted += 1;
            j += 1;
            continue;
        }
        let Some(old_key) = slots[i] else {
            i += 1;
            continue;
        };
        if j >= new_len {
            old_ops[i] = OldOp::Remove { partner: None };
            i += 1;
            continue;
        }

        let new_key = &new[j];
        if old_key == new_key {
            if let Some(queue) = old_index.get_mut(new_key) {
                let front = queue.pop_front();
                debug_assert_eq!(front, Some(i));
            }
            new_ops.push(NewOp::Update { old: i });
            old_ops[i] = OldOp::Kept { new: j };
            stats.updated += 1;
            i += 1;
            j += 1;
            continue;
        }

        if !new_index.contains_key(old_key) {
            old_ops[i] = OldOp::Remove { partner: None };
            i += 1;
            continue;
        }

        partners[i] = Some(j);
        match old_index.get_mut(new_key).and_then(VecDeque::pop_front) {
            Some(src) => {
                new_ops.push(NewOp::Move { old: src, anchor: i });
                old_ops[src] = OldOp::Moved { new: j };
                slots[src] = None;
                stats.moved += 1;
            }
            None => {
                new_ops.push(NewOp::Insert { anchor: Some(i) });
                stats.inserted += 1;
            }
        }
        j += 1;
    }

    for (op, partner) in old_ops.iter_mut().zip(partners) {
        if let OldOp::Remove { partner: p } = op {
            *p = partner;
            stats.removed += 1;
        }
    }

    KeyedDiff {
        new_ops,
        old_ops,
        stats,
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Sorted set: members keyed by name with a floating-point score, ordered
//! by `(score, name)` and indexed by name for O(1) lookup.
//!
//! Ported from `zset/zset.cxx`: `less` (the tuple comparator), `treeAdd`,
//! `add`/`update` (no-op on unchanged score, delete-then-reinsert
//! otherwise), `pop`, `query` (smallest member `>=` a given tuple), and
//! `offset` (the rank walk, here `AvlTree::offset`).

use std::cmp::Ordering;

use crate::avltree::AvlTree;
use crate::hash::fnv::hash_bytes;
use crate::hash::ProgressiveMap;

/// A live member of a sorted set, owned by the ordering tree.
#[derive(Debug, Clone)]
pub struct ZMember {
    pub name: Vec<u8>,
    pub score: f64,
}

/// The name index's payload. Duplicates `(name, score)` out of the tree
/// node so that name lookup stays O(1) instead of an O(log n) tree
/// descent — see DESIGN.md's sorted-set entry for why this crate's
/// value-owning containers cannot simply share one allocation the way the
/// original's intrusive `ZNode` does.
struct NameIndexEntry {
    name: Vec<u8>,
    score: f64,
}

/// Tuple comparator: numeric score first, then lexicographic byte
/// comparison on `min(len)`, then length as the final tie-break. This is
/// the `min(len)` rule spec.md §9 calls out as the one genuine source
/// truth (a left-length comparison would be a bug).
fn compare_tuple(a_score: f64, a_name: &[u8], b_score: f64, b_name: &[u8]) -> Ordering {
    match a_score.partial_cmp(&b_score) {
        Some(Ordering::Equal) | None => {
            let n = a_name.len().min(b_name.len());
            match a_name[..n].cmp(&b_name[..n]) {
                Ordering::Equal => a_name.len().cmp(&b_name.len()),
                other => other,
            }
        }
        Some(other) => other,
    }
}

fn cmp_members(a: &ZMember, b: &ZMember) -> Ordering {
    compare_tuple(a.score, &a.name, b.score, &b.name)
}

pub struct SortedSet {
    tree: AvlTree<ZMember>,
    index: ProgressiveMap<NameIndexEntry>,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    pub fn new() -> Self {
        SortedSet { tree: AvlTree::new(), index: ProgressiveMap::new() }
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `add(name, score)` per spec.md §4.4: returns `true` if a new member
    /// was created, `false` if an existing member was updated (or left
    /// untouched because the score was unchanged).
    pub fn add(&mut self, name: &[u8], score: f64) -> bool {
        let code = hash_bytes(name);
        let existing_score = self.index.lookup(code, |e| e.name == name).map(|e| e.score);

        match existing_score {
            Some(old_score) => {
                if old_score == score {
                    return false;
                }
                let removed = self.tree.remove(
                    &ZMember { name: name.to_vec(), score: old_score },
                    &cmp_members,
                );
                debug_assert!(removed.is_some());
                self.tree.insert(ZMember { name: name.to_vec(), score }, &cmp_members);

                // ProgressiveMap has no in-place update; pop the stale
                // index entry and reinsert with the new score.
                self.index.pop(code, |e| e.name == name);
                self.index.insert(code, NameIndexEntry { name: name.to_vec(), score });
                false
            }
            None => {
                self.index.insert(code, NameIndexEntry { name: name.to_vec(), score });
                self.tree.insert(ZMember { name: name.to_vec(), score }, &cmp_members);
                true
            }
        }
    }

    /// O(1) (amortized) lookup by name.
    pub fn lookup(&mut self, name: &[u8]) -> Option<f64> {
        let code = hash_bytes(name);
        self.index.lookup(code, |e| e.name == name).map(|e| e.score)
    }

    /// Detach the member by name from both containers.
    pub fn pop(&mut self, name: &[u8]) -> Option<ZMember> {
        let code = hash_bytes(name);
        let entry = self.index.pop(code, |e| e.name == name)?;
        let removed = self.tree.remove(
            &ZMember { name: entry.name.clone(), score: entry.score },
            &cmp_members,
        );
        debug_assert!(removed.is_some());
        removed
    }

    /// Smallest member with `(score, name) >= (score, name)` under the
    /// tuple order.
    pub fn query(&self, score: f64, name: &[u8]) -> Option<&ZMember> {
        self.tree.ceiling(&ZMember { name: name.to_vec(), score }, &cmp_members)
    }

    /// Rank walk from `member` by `delta` positions, per spec.md's
    /// `offset`.
    pub fn offset<'a>(&'a self, member: &ZMember, delta: i64) -> Option<&'a ZMember> {
        self.tree.offset(member, delta, &cmp_members)
    }
}

//! The top-level namespace: every key lives in one `ProgressiveMap<Entry>`,
//! exclusively owning its `Entry` and, transitively, its `SortedSet` if any.
//!
//! Ported from `common/entry.hxx`/`.cxx` (`Entry`, `entryEquality`, `scan`
//! over both chain tables for `keys`).

use crate::hash::fnv::hash_bytes;
use crate::hash::ProgressiveMap;
use crate::sortedset::SortedSet;

pub enum EntryKind {
    String(Vec<u8>),
    SortedSet(SortedSet),
}

pub struct Entry {
    pub key: Vec<u8>,
    pub kind: EntryKind,
}

/// The shared, single-threaded, process-wide key namespace.
pub type Namespace = ProgressiveMap<Entry>;

pub fn key_code(key: &[u8]) -> u64 {
    hash_bytes(key)
}

/// Every key across both of the namespace's internal tables, in
/// unspecified order (spec.md's `keys` command).
pub fn all_keys(ns: &Namespace) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    ns.for_each(|entry| out.push(entry.key.clone()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_code_is_the_shared_fnv_hash() {
        assert_eq!(key_code(b"k"), hash_bytes(b"k"));
    }

    #[test]
    fn all_keys_scans_every_live_entry() {
        let mut ns: Namespace = ProgressiveMap::new();
        for k in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
            let code = key_code(&k);
            ns.insert(code, Entry { key: k.clone(), kind: EntryKind::String(vec![]) });
        }
        let mut keys = all_keys(&ns);
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }
}

//! FNV-1a-style byte hash shared by key and sorted-set member hashing.
//!
//! Grounded on `zset/zset.cxx`'s `stringHash`: seed `0x811C9DC5`, each byte
//! folded in as `hash = (hash + byte) * 0x01000193`.

const SEED: u32 = 0x811C_9DC5;
const PRIME: u32 = 0x0100_0193;

/// Hash an opaque byte string to the 64-bit code used as a hash table key
/// throughout this crate. The original mixes in 32 bits; it is widened to
/// 64 here only in representation (the mixing itself stays 32-bit, matching
/// the original's `uint32_t hash` exactly) so it can be carried alongside
/// `u64` chain codes without a second narrowing conversion at every call
/// site.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hash = SEED;
    for &byte in data {
        hash = hash.wrapping_add(byte as u32).wrapping_mul(PRIME);
    }
    hash as u64
}

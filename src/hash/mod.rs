//! Chained hash table with progressive (incremental) rehashing.
//!
//! See spec.md §4.1-4.2. [`table::HashTable`] is the single, non-migrating
//! table; [`progressive::ProgressiveMap`] is the public two-table wrapper
//! used for both the top-level key namespace and each sorted set's name
//! index.

pub mod fnv;
pub mod progressive;
pub mod table;

pub use progressive::ProgressiveMap;

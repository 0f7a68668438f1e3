//! Two-table progressive (incremental) rehashing over [`HashTable`].
//!
//! Ported from the original's `Map`/`helpResizing`/`startResizing`
//! (`map/cxx/map.cxx`): a bounded number of chain heads move from the
//! `secondary` table into `primary` on every operation, so a resize never
//! stalls the caller.

use log::debug;

use super::table::HashTable;

/// Maximum chain heads moved from `secondary` to `primary` per operation.
const RESIZING_WORK: usize = 128;
/// Trigger growth once `primary.size / capacity` reaches this ratio.
const MAX_LOAD_FACTOR: usize = 8;
/// `primary`'s initial allocation, made on the first insert.
const INITIAL_CAPACITY: usize = 4;

pub struct ProgressiveMap<T> {
    primary: HashTable<T>,
    secondary: HashTable<T>,
    migration_cursor: usize,
}

impl<T> Default for ProgressiveMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ProgressiveMap<T> {
    pub fn new() -> Self {
        ProgressiveMap {
            primary: HashTable::empty(),
            secondary: HashTable::empty(),
            migration_cursor: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.primary.size() + self.secondary.size()
    }

    fn help_resizing(&mut self) {
        let mut moved = 0;
        while moved < RESIZING_WORK && self.secondary.size() > 0 {
            if self.migration_cursor >= self.secondary.capacity() {
                // Shouldn't happen while size() > 0, but guard against it
                // rather than looping forever.
                break;
            }
            match self.secondary.detach_head_at(self.migration_cursor) {
                Some((code, value)) => {
                    self.primary.insert_head(code, value);
                    moved += 1;
                }
                None => self.migration_cursor += 1,
            }
        }
        if self.secondary.size() == 0 && self.secondary.is_allocated() {
            self.secondary.release();
            self.migration_cursor = 0;
            debug!("progressive rehash finished, secondary table released");
        }
    }

    fn start_migration(&mut self) {
        debug_assert!(!self.secondary.is_allocated());
        let new_capacity = if self.primary.is_allocated() {
            self.primary.capacity() * 2
        } else {
            INITIAL_CAPACITY
        };
        let old_primary = std::mem::replace(&mut self.primary, HashTable::empty());
        self.secondary = old_primary;
        self.primary.init(new_capacity);
        self.migration_cursor = 0;
    }

    pub fn lookup<F>(&mut self, code: u64, eq: F) -> Option<&T>
    where
        F: Fn(&T) -> bool + Copy,
    {
        self.help_resizing();
        if let Some(v) = self.primary.lookup(code, eq) {
            return Some(v);
        }
        self.secondary.lookup(code, eq)
    }

    /// Like [`lookup`](Self::lookup), but yields a mutable reference.
    pub fn lookup_mut<F>(&mut self, code: u64, eq: F) -> Option<&mut T>
    where
        F: Fn(&T) -> bool + Copy,
    {
        self.help_resizing();
        if self.primary.lookup(code, eq).is_some() {
            self.primary.lookup_mut(code, eq)
        } else {
            self.secondary.lookup_mut(code, eq)
        }
    }

    pub fn insert(&mut self, code: u64, value: T) {
        if !self.primary.is_allocated() {
            self.primary.init(INITIAL_CAPACITY);
        }
        self.primary.insert_head(code, value);

        if !self.secondary.is_allocated() {
            let load_factor = self.primary.size() / self.primary.capacity();
            if load_factor >= MAX_LOAD_FACTOR {
                self.start_migration();
            }
        }
        self.help_resizing();
    }

    pub fn pop<F>(&mut self, code: u64, eq: F) -> Option<T>
    where
        F: Fn(&T) -> bool + Copy,
    {
        self.help_resizing();
        if let Some(v) = self.primary.pop(code, eq) {
            return Some(v);
        }
        self.secondary.pop(code, eq)
    }

    /// Visit every live value across both tables, in unspecified order.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.primary.for_each(&mut f);
        self.secondary.for_each(&mut f);
    }

    #[cfg(test)]
    fn primary_capacity(&self) -> usize {
        self.primary.capacity()
    }
}

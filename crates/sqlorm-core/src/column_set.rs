//! Track which columns of a mapped object have unflushed changes.
//!
//! The dirty set of an object is indexed by the position of the column in
//! its class's field registry.

/// A compact bitset representing "column changed" for indices `0..len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSet {
    len: usize,
    bits: Box<[u64]>,
}

impl ColumnSet {
    /// Create an empty (nothing changed) set for `len` columns.
    #[must_use]
    pub fn empty(len: usize) -> Self {
        let words = len.div_ceil(64);
        Self {
            len,
            bits: vec![0u64; words].into_boxed_slice(),
        }
    }

    /// Number of columns represented by this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if no column is marked.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Mark a column index. Returns true if it was not marked before.
    ///
    /// Indices outside `0..len` are ignored.
    pub fn insert(&mut self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (word, bit) = (idx / 64, idx % 64);
        match self.bits.get_mut(word) {
            Some(w) => {
                let was_set = (*w & (1u64 << bit)) != 0;
                *w |= 1u64 << bit;
                !was_set
            }
            None => false,
        }
    }

    /// Check whether a column index is marked.
    #[must_use]
    pub fn contains(&self, idx: usize) -> bool {
        if idx >= self.len {
            return false;
        }
        let (word, bit) = (idx / 64, idx % 64);
        self.bits
            .get(word)
            .is_some_and(|w| (w & (1u64 << bit)) != 0)
    }

    /// Unmark every column.
    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    /// Marked indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|idx| self.contains(*idx))
    }
}

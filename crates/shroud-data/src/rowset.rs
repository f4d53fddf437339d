//! Row membership bitset.
//!
//! Used for the research subset consumed by presence-style models (the
//! secondary per-class counter counts subset members) and for the
//! subset projections handed to `clone_for_subset`.

use shroud_error::{Result, ShroudError};
use shroud_types::RowId;

/// A fixed-size set of row ids, backed by a word-level bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSet {
    words: Vec<u64>,
    len: usize,
    cardinality: usize,
}

impl RowSet {
    /// An empty set over `len` rows.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
            cardinality: 0,
        }
    }

    /// Build from explicit row indices, validating bounds.
    pub fn from_indices(len: usize, rows: &[RowId]) -> Result<Self> {
        let mut set = Self::new(len);
        for &row in rows {
            if row as usize >= len {
                return Err(ShroudError::input(format!(
                    "subset row {row} is out of bounds for a table of {len} rows"
                )));
            }
            set.insert(row);
        }
        Ok(set)
    }

    /// Number of rows the set ranges over (not the member count).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no row is a member.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    /// Number of member rows.
    #[inline]
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Add a row to the set.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    pub fn insert(&mut self, row: RowId) {
        assert!((row as usize) < self.len, "row {row} out of bounds");
        let word = &mut self.words[row as usize / 64];
        let bit = 1u64 << (row % 64);
        if *word & bit == 0 {
            *word |= bit;
            self.cardinality += 1;
        }
    }

    /// Membership test.
    #[inline]
    #[must_use]
    pub fn contains(&self, row: RowId) -> bool {
        (row as usize) < self.len && self.words[row as usize / 64] & (1u64 << (row % 64)) != 0
    }

    /// Iterate member rows in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = RowId> + '_ {
        (0..self.len as u32).filter(move |&r| self.contains(r))
    }
}

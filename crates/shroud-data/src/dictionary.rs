//! Per-column string interning.
//!
//! Every distinct string value of a column is assigned a dense `ValueId`
//! so the hot paths of the engine operate on integer matrices only. Id `0`
//! of every column is pre-assigned to the suppression sentinel; decoding
//! id `0` yields the configured suppression string.

use std::collections::HashMap;

use shroud_types::ValueId;
use shroud_types::limits::{DEFAULT_SUPPRESSION_STRING, SUPPRESSION_VALUE_ID};

/// One column's intern table.
#[derive(Debug, Clone)]
struct Column {
    values: Vec<String>,
    index: HashMap<String, ValueId>,
}

impl Column {
    fn new(sentinel: &str) -> Self {
        let mut index = HashMap::new();
        index.insert(sentinel.to_owned(), SUPPRESSION_VALUE_ID);
        Self {
            values: vec![sentinel.to_owned()],
            index,
        }
    }
}

/// Interns strings to dense per-column ids and back.
///
/// Ids are stable for the lifetime of the dictionary. The dictionary is
/// frozen once encoding finishes; the engine never interns on a hot path.
#[derive(Debug, Clone)]
pub struct Dictionary {
    columns: Vec<Column>,
    suppression: String,
}

impl Dictionary {
    /// Create a dictionary for `num_columns` columns using the default
    /// suppression string.
    #[must_use]
    pub fn new(num_columns: usize) -> Self {
        Self::with_suppression_string(num_columns, DEFAULT_SUPPRESSION_STRING)
    }

    /// Create a dictionary whose id `0` decodes to `suppression`.
    #[must_use]
    pub fn with_suppression_string(num_columns: usize, suppression: &str) -> Self {
        Self {
            columns: (0..num_columns).map(|_| Column::new(suppression)).collect(),
            suppression: suppression.to_owned(),
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The string decoded for suppressed values.
    #[must_use]
    pub fn suppression_string(&self) -> &str {
        &self.suppression
    }

    /// Intern `value` in `col`, returning its id. Re-interning an existing
    /// value returns the original id.
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of bounds.
    pub fn intern(&mut self, col: usize, value: &str) -> ValueId {
        let column = &mut self.columns[col];
        if let Some(&id) = column.index.get(value) {
            return id;
        }
        let id = ValueId::try_from(column.values.len()).expect("column cardinality exceeds u32");
        column.values.push(value.to_owned());
        column.index.insert(value.to_owned(), id);
        id
    }

    /// Look up the id of `value` in `col` without interning.
    #[must_use]
    pub fn get(&self, col: usize, value: &str) -> Option<ValueId> {
        self.columns.get(col)?.index.get(value).copied()
    }

    /// Decode an id back to its string. Id `0` decodes to the suppression
    /// string in every column.
    #[must_use]
    pub fn decode(&self, col: usize, id: ValueId) -> Option<&str> {
        self.columns.get(col)?.values.get(id as usize).map(String::as_str)
    }

    /// Number of distinct ids in `col`, including the sentinel.
    ///
    /// # Panics
    ///
    /// Panics if `col` is out of bounds.
    #[must_use]
    pub fn cardinality(&self, col: usize) -> usize {
        self.columns[col].values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_occupies_id_zero() {
        let dict = Dictionary::new(2);
        assert_eq!(dict.decode(0, SUPPRESSION_VALUE_ID), Some("*"));
        assert_eq!(dict.decode(1, SUPPRESSION_VALUE_ID), Some("*"));
        assert_eq!(dict.cardinality(0), 1);
    }

    #[test]
    fn intern_is_stable() {
        let mut dict = Dictionary::new(1);
        let a = dict.intern(0, "alpha");
        let b = dict.intern(0, "beta");
        let a2 = dict.intern(0, "alpha");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(dict.decode(0, a), Some("alpha"));
        assert_eq!(dict.decode(0, b), Some("beta"));
        assert_eq!(dict.cardinality(0), 3);
    }

    #[test]
    fn columns_are_independent() {
        let mut dict = Dictionary::new(2);
        let a = dict.intern(0, "x");
        let b = dict.intern(1, "x");
        assert_eq!(a, b, "each column assigns ids independently from 1");
        assert_eq!(dict.decode(0, a), Some("x"));
        assert_eq!(dict.decode(1, b), Some("x"));
    }

    #[test]
    fn custom_suppression_string() {
        let dict = Dictionary::with_suppression_string(1, "<hidden>");
        assert_eq!(dict.decode(0, 0), Some("<hidden>"));
        assert_eq!(dict.suppression_string(), "<hidden>");
    }

    #[test]
    fn unknown_lookups() {
        let dict = Dictionary::new(1);
        assert_eq!(dict.get(0, "missing"), None);
        assert_eq!(dict.decode(0, 7), None);
        assert_eq!(dict.decode(9, 0), None);
    }
}

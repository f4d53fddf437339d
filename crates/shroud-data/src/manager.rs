//! The data manager: partitions encoded columns by attribute role and
//! owns the frozen per-run structures the search engine reads.
//!
//! Identifying columns are dropped here; the engine never sees them.
//! Quasi-identifying columns carry a hierarchy and generalization bounds,
//! sensitive columns feed per-class distributions, insensitive columns
//! pass through to the output untouched.

use shroud_error::{Result, ShroudError};
use shroud_types::{AttributeRole, Level, ValueId};

use crate::dictionary::Dictionary;
use crate::hierarchy::GeneralizationHierarchy;
use crate::rowset::RowSet;
use crate::table::EncodedTable;

/// Per-column description of the input table.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub role: AttributeRole,
    /// Lower generalization bound; quasi-identifying columns only.
    /// Defaults to 0.
    pub min_level: Option<Level>,
    /// Upper generalization bound; quasi-identifying columns only.
    /// Defaults to `height - 1`.
    pub max_level: Option<Level>,
}

impl ColumnSpec {
    /// A column with default bounds.
    #[must_use]
    pub fn new(name: impl Into<String>, role: AttributeRole) -> Self {
        Self {
            name: name.into(),
            role,
            min_level: None,
            max_level: None,
        }
    }

    /// Restrict the searched generalization levels of a quasi-identifier.
    #[must_use]
    pub fn with_bounds(mut self, min_level: Level, max_level: Level) -> Self {
        self.min_level = Some(min_level);
        self.max_level = Some(max_level);
        self
    }
}

/// Owns the encoded sub-tables and hierarchy metadata for one run.
#[derive(Debug, Clone)]
pub struct DataManager {
    dictionary: Dictionary,
    qi_table: EncodedTable,
    se_table: EncodedTable,
    is_table: EncodedTable,
    qi_cols: Vec<usize>,
    se_cols: Vec<usize>,
    is_cols: Vec<usize>,
    qi_names: Vec<String>,
    se_names: Vec<String>,
    is_names: Vec<String>,
    hierarchies: Vec<GeneralizationHierarchy>,
    min_levels: Box<[Level]>,
    max_levels: Box<[Level]>,
    subset: Option<RowSet>,
    n_rows: usize,
}

impl DataManager {
    /// Partition `table` according to `specs` and validate hierarchy
    /// coverage and generalization bounds.
    ///
    /// `hierarchies` are matched to quasi-identifying columns by attribute
    /// name; each quasi-identifier must have exactly one.
    pub fn new(
        dictionary: Dictionary,
        table: &EncodedTable,
        specs: &[ColumnSpec],
        mut hierarchies: Vec<GeneralizationHierarchy>,
        subset: Option<RowSet>,
    ) -> Result<Self> {
        if specs.len() != table.num_cols() {
            return Err(ShroudError::input(format!(
                "{} column specs for a table of {} columns",
                specs.len(),
                table.num_cols()
            )));
        }
        if let Some(set) = &subset {
            if set.len() != table.num_rows() {
                return Err(ShroudError::input(format!(
                    "research subset ranges over {} rows, table has {}",
                    set.len(),
                    table.num_rows()
                )));
            }
        }

        let mut qi_cols = Vec::new();
        let mut se_cols = Vec::new();
        let mut is_cols = Vec::new();
        let mut qi_names = Vec::new();
        let mut se_names = Vec::new();
        let mut is_names = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            match spec.role {
                AttributeRole::QuasiIdentifying => {
                    qi_cols.push(i);
                    qi_names.push(spec.name.clone());
                }
                AttributeRole::Sensitive => {
                    se_cols.push(i);
                    se_names.push(spec.name.clone());
                }
                AttributeRole::Insensitive => {
                    is_cols.push(i);
                    is_names.push(spec.name.clone());
                }
                AttributeRole::Identifying => {}
            }
        }

        // Match hierarchies to quasi-identifiers by name, in column order.
        let mut ordered = Vec::with_capacity(qi_cols.len());
        for name in &qi_names {
            let pos = hierarchies
                .iter()
                .position(|h| h.attribute() == name)
                .ok_or_else(|| {
                    ShroudError::input(format!("no hierarchy for quasi-identifier '{name}'"))
                })?;
            ordered.push(hierarchies.swap_remove(pos));
        }
        if let Some(stray) = hierarchies.first() {
            return Err(ShroudError::input(format!(
                "hierarchy for '{}' does not match any quasi-identifier",
                stray.attribute()
            )));
        }

        // Hierarchies must cover every id the dictionary handed out, and
        // the generalization bounds must fit the heights.
        let mut min_levels = Vec::with_capacity(qi_cols.len());
        let mut max_levels = Vec::with_capacity(qi_cols.len());
        for (qi, (&col, hierarchy)) in qi_cols.iter().zip(&ordered).enumerate() {
            let name = &qi_names[qi];
            if dictionary.cardinality(col) > hierarchy.cardinality() {
                return Err(ShroudError::hierarchy(
                    name.clone(),
                    format!(
                        "hierarchy covers {} values but the column has {}",
                        hierarchy.cardinality(),
                        dictionary.cardinality(col)
                    ),
                ));
            }
            let top = hierarchy.height() - 1;
            let spec = &specs[col];
            let min = spec.min_level.unwrap_or(0);
            let max = spec.max_level.unwrap_or(top);
            if max > top {
                return Err(ShroudError::hierarchy(
                    name.clone(),
                    format!("maximum generalization level {max} exceeds the top level {top}"),
                ));
            }
            if min > max {
                return Err(ShroudError::hierarchy(
                    name.clone(),
                    format!("minimum generalization level {min} exceeds the maximum {max}"),
                ));
            }
            min_levels.push(min);
            max_levels.push(max);
        }

        Ok(Self {
            qi_table: table.project(&qi_cols),
            se_table: if se_cols.is_empty() {
                EncodedTable::empty(table.num_rows(), 0)
            } else {
                table.project(&se_cols)
            },
            is_table: if is_cols.is_empty() {
                EncodedTable::empty(table.num_rows(), 0)
            } else {
                table.project(&is_cols)
            },
            dictionary,
            qi_cols,
            se_cols,
            is_cols,
            qi_names,
            se_names,
            is_names,
            hierarchies: ordered,
            min_levels: min_levels.into_boxed_slice(),
            max_levels: max_levels.into_boxed_slice(),
            subset,
            n_rows: table.num_rows(),
        })
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of quasi-identifiers (the lattice dimensionality).
    #[inline]
    #[must_use]
    pub fn num_quasi_identifiers(&self) -> usize {
        self.qi_names.len()
    }

    /// Number of sensitive columns.
    #[inline]
    #[must_use]
    pub fn num_sensitive(&self) -> usize {
        self.se_names.len()
    }

    /// The quasi-identifier sub-table.
    #[inline]
    #[must_use]
    pub fn qi_table(&self) -> &EncodedTable {
        &self.qi_table
    }

    /// The sensitive sub-table (zero columns when none are sensitive).
    #[inline]
    #[must_use]
    pub fn se_table(&self) -> &EncodedTable {
        &self.se_table
    }

    /// The insensitive sub-table.
    #[inline]
    #[must_use]
    pub fn is_table(&self) -> &EncodedTable {
        &self.is_table
    }

    /// Hierarchy of quasi-identifier `qi`.
    #[inline]
    #[must_use]
    pub fn hierarchy(&self, qi: usize) -> &GeneralizationHierarchy {
        &self.hierarchies[qi]
    }

    /// All hierarchies, in quasi-identifier order.
    #[must_use]
    pub fn hierarchies(&self) -> &[GeneralizationHierarchy] {
        &self.hierarchies
    }

    /// Hierarchy heights, in quasi-identifier order.
    #[must_use]
    pub fn heights(&self) -> Vec<Level> {
        self.hierarchies.iter().map(GeneralizationHierarchy::height).collect()
    }

    /// Per-attribute lower generalization bounds.
    #[must_use]
    pub fn min_levels(&self) -> &[Level] {
        &self.min_levels
    }

    /// Per-attribute upper generalization bounds.
    #[must_use]
    pub fn max_levels(&self) -> &[Level] {
        &self.max_levels
    }

    /// Quasi-identifier names, in column order.
    #[must_use]
    pub fn qi_names(&self) -> &[String] {
        &self.qi_names
    }

    /// Sensitive attribute names, in column order.
    #[must_use]
    pub fn se_names(&self) -> &[String] {
        &self.se_names
    }

    /// Insensitive attribute names, in column order.
    #[must_use]
    pub fn is_names(&self) -> &[String] {
        &self.is_names
    }

    /// Index of a sensitive attribute by name.
    #[must_use]
    pub fn se_index(&self, name: &str) -> Option<usize> {
        self.se_names.iter().position(|n| n == name)
    }

    /// The research subset, if any model supplied one.
    #[must_use]
    pub fn subset(&self) -> Option<&RowSet> {
        self.subset.as_ref()
    }

    /// The dictionary used for encoding.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Decode a quasi-identifier value.
    #[must_use]
    pub fn decode_qi(&self, qi: usize, id: ValueId) -> Option<&str> {
        self.dictionary.decode(self.qi_cols[qi], id)
    }

    /// Decode a sensitive value.
    #[must_use]
    pub fn decode_se(&self, se: usize, id: ValueId) -> Option<&str> {
        self.dictionary.decode(self.se_cols[se], id)
    }

    /// Decode an insensitive value.
    #[must_use]
    pub fn decode_is(&self, is: usize, id: ValueId) -> Option<&str> {
        self.dictionary.decode(self.is_cols[is], id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict_and_table() -> (Dictionary, EncodedTable, Vec<ColumnSpec>) {
        // Columns: name (identifying), age (QI), illness (sensitive).
        let mut dict = Dictionary::new(3);
        let rows: Vec<Vec<ValueId>> = [
            ("alice", "25", "flu"),
            ("bob", "27", "cold"),
            ("carol", "29", "flu"),
        ]
        .iter()
        .map(|(n, a, i)| {
            vec![
                dict.intern(0, n),
                dict.intern(1, a),
                dict.intern(2, i),
            ]
        })
        .collect();
        let table = EncodedTable::from_rows(rows, 3).unwrap();
        let specs = vec![
            ColumnSpec::new("name", AttributeRole::Identifying),
            ColumnSpec::new("age", AttributeRole::QuasiIdentifying),
            ColumnSpec::new("illness", AttributeRole::Sensitive),
        ];
        (dict, table, specs)
    }

    fn age_hierarchy(dict: &mut Dictionary) -> GeneralizationHierarchy {
        let young = dict.intern(1, "<30");
        let card = dict.cardinality(1);
        let identity: Vec<ValueId> = (0..card as ValueId).collect();
        let mut l1 = vec![0; card];
        for slot in l1.iter_mut().skip(1) {
            *slot = young;
        }
        GeneralizationHierarchy::build("age", vec![identity, l1]).unwrap()
    }

    #[test]
    fn partitions_and_drops_identifying() {
        let (mut dict, table, specs) = dict_and_table();
        let h = age_hierarchy(&mut dict);
        let m = DataManager::new(dict, &table, &specs, vec![h], None).unwrap();
        assert_eq!(m.num_rows(), 3);
        assert_eq!(m.num_quasi_identifiers(), 1);
        assert_eq!(m.num_sensitive(), 1);
        assert_eq!(m.qi_table().num_cols(), 1);
        assert_eq!(m.se_table().num_cols(), 1);
        assert_eq!(m.is_table().num_cols(), 0);
        assert_eq!(m.qi_names(), &["age".to_owned()]);
        assert_eq!(m.se_index("illness"), Some(0));
        assert_eq!(m.min_levels(), &[0]);
        assert_eq!(m.max_levels(), &[1]);
    }

    #[test]
    fn missing_hierarchy_is_rejected() {
        let (dict, table, specs) = dict_and_table();
        let err = DataManager::new(dict, &table, &specs, vec![], None).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidInput { .. }));
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn stray_hierarchy_is_rejected() {
        let (mut dict, table, specs) = dict_and_table();
        let h = age_hierarchy(&mut dict);
        let stray = GeneralizationHierarchy::build("zip", vec![vec![0, 1]]).unwrap();
        let err = DataManager::new(dict, &table, &specs, vec![h, stray], None).unwrap_err();
        assert!(err.to_string().contains("zip"));
    }

    #[test]
    fn bounds_outside_height_are_rejected() {
        let (mut dict, table, mut specs) = dict_and_table();
        let h = age_hierarchy(&mut dict);
        specs[1] = ColumnSpec::new("age", AttributeRole::QuasiIdentifying).with_bounds(0, 5);
        let err = DataManager::new(dict, &table, &specs, vec![h], None).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidHierarchy { .. }));
    }

    #[test]
    fn subset_length_must_match() {
        let (mut dict, table, specs) = dict_and_table();
        let h = age_hierarchy(&mut dict);
        let subset = RowSet::new(7);
        let err = DataManager::new(dict, &table, &specs, vec![h], Some(subset)).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidInput { .. }));
    }
}

//! The input handle: raw string rows, attribute roles, and hierarchy
//! matrices, interned into the engine's integer form on demand.
//!
//! The handle is locked for the duration of an anonymization run;
//! failure paths unlock it, a successful result keeps the lock until
//! [`InputTable::release`].

use std::collections::HashSet;

use shroud_data::{ColumnSpec, Dictionary, EncodedTable, GeneralizationHierarchy};
use shroud_error::{Result, ShroudError};
use shroud_types::{AttributeRole, ValueId};

/// A value-major hierarchy definition: one row per base value, columns
/// are levels (`["25", "<30", "*"]`).
type HierarchyRows = Vec<Vec<String>>;

/// Tabular input plus attribute metadata.
#[derive(Debug)]
pub struct InputTable {
    specs: Vec<ColumnSpec>,
    dictionary: Dictionary,
    rows: Vec<Vec<ValueId>>,
    hierarchies: Vec<(String, HierarchyRows)>,
    locked: bool,
}

impl InputTable {
    /// Create an empty table with the given column definitions.
    pub fn new(specs: Vec<ColumnSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(ShroudError::input("a table needs at least one column"));
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(ShroudError::input(format!(
                    "duplicate column name '{}'",
                    spec.name
                )));
            }
        }
        let dictionary = Dictionary::new(specs.len());
        Ok(Self {
            specs,
            dictionary,
            rows: Vec::new(),
            hierarchies: Vec::new(),
            locked: false,
        })
    }

    /// Append one row of raw string values, in column order.
    pub fn add_row(&mut self, values: &[&str]) -> Result<()> {
        self.ensure_unlocked()?;
        if values.len() != self.specs.len() {
            return Err(ShroudError::input(format!(
                "row has {} values, expected {}",
                values.len(),
                self.specs.len()
            )));
        }
        let row = values
            .iter()
            .enumerate()
            .map(|(col, v)| self.dictionary.intern(col, v))
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// Attach a generalization hierarchy to a quasi-identifying column.
    ///
    /// `rows` is value-major: one row per base value, whose first entry
    /// is the base value itself and whose `l`-th entry is its level-`l`
    /// generalization.
    pub fn add_hierarchy(&mut self, attribute: &str, rows: &[&[&str]]) -> Result<()> {
        self.ensure_unlocked()?;
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == attribute)
            .ok_or_else(|| {
                ShroudError::input(format!("unknown attribute name '{attribute}'"))
            })?;
        if spec.role != AttributeRole::QuasiIdentifying {
            return Err(ShroudError::input(format!(
                "attribute '{attribute}' is {} and takes no hierarchy",
                spec.role
            )));
        }
        let owned = rows
            .iter()
            .map(|row| row.iter().map(|&s| s.to_owned()).collect())
            .collect();
        self.hierarchies.push((attribute.to_owned(), owned));
        Ok(())
    }

    /// Number of data rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.specs.len()
    }

    /// Column definitions.
    #[must_use]
    pub fn specs(&self) -> &[ColumnSpec] {
        &self.specs
    }

    /// Is the handle locked by a run or an unreleased result?
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Release the handle after consuming a result.
    pub fn release(&mut self) {
        self.locked = false;
    }

    pub(crate) fn lock(&mut self) {
        self.locked = true;
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = false;
    }

    pub(crate) fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            Err(ShroudError::input(
                "this data handle is locked; release it first",
            ))
        } else {
            Ok(())
        }
    }

    /// Intern the hierarchy matrices and materialize the encoded table.
    /// Called once per run, after the handle is locked.
    pub(crate) fn encode(&mut self) -> Result<(EncodedTable, Vec<GeneralizationHierarchy>)> {
        let table = EncodedTable::from_rows(self.rows.clone(), self.specs.len())?;

        let mut hierarchies = Vec::with_capacity(self.hierarchies.len());
        let definitions = self.hierarchies.clone();
        for (attribute, rows) in &definitions {
            hierarchies.push(self.encode_hierarchy(attribute, rows)?);
        }
        Ok((table, hierarchies))
    }

    /// Turn one value-major string matrix into a validated id matrix.
    fn encode_hierarchy(
        &mut self,
        attribute: &str,
        rows: &HierarchyRows,
    ) -> Result<GeneralizationHierarchy> {
        let col = self
            .specs
            .iter()
            .position(|s| s.name == attribute)
            .expect("attribute checked at add_hierarchy");

        let height = rows.first().map_or(0, Vec::len);
        if height == 0 {
            return Err(ShroudError::hierarchy(attribute, "hierarchy has no levels"));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != height {
                return Err(ShroudError::hierarchy(
                    attribute,
                    format!("row {i} has {} levels, expected {height}", row.len()),
                ));
            }
        }

        // Intern every term first so the matrix covers the column's
        // final cardinality.
        let id_rows: Vec<Vec<ValueId>> = rows
            .iter()
            .map(|row| row.iter().map(|v| self.dictionary.intern(col, v)).collect())
            .collect();

        // Each term's generalization path is the suffix of the rows it
        // appears in; conflicting suffixes mean a non-monotone input.
        let cardinality = self.dictionary.cardinality(col);
        let mut matrix: Vec<Vec<Option<ValueId>>> = vec![vec![None; cardinality]; height];
        for row in &id_rows {
            for (level, &term) in row.iter().enumerate() {
                for (target, &generalized) in row.iter().enumerate().skip(level) {
                    let slot = &mut matrix[target][term as usize];
                    match slot {
                        None => *slot = Some(generalized),
                        Some(existing) if *existing == generalized => {}
                        Some(existing) => {
                            return Err(ShroudError::hierarchy(
                                attribute,
                                format!(
                                    "term '{}' generalizes to both '{}' and '{}' at level {target}",
                                    self.dictionary.decode(col, term).unwrap_or("?"),
                                    self.dictionary.decode(col, *existing).unwrap_or("?"),
                                    self.dictionary.decode(col, generalized).unwrap_or("?"),
                                ),
                            ));
                        }
                    }
                }
            }
        }

        // The sentinel maps to itself everywhere; every data value must
        // be covered at every level.
        let mut complete = Vec::with_capacity(height);
        for (level, slots) in matrix.into_iter().enumerate() {
            let mut map = Vec::with_capacity(cardinality);
            for (id, slot) in slots.into_iter().enumerate() {
                if id == 0 {
                    map.push(0);
                } else if let Some(generalized) = slot {
                    map.push(generalized);
                } else {
                    return Err(ShroudError::hierarchy(
                        attribute,
                        format!(
                            "value '{}' is not covered at level {level}",
                            self.dictionary.decode(col, id as ValueId).unwrap_or("?")
                        ),
                    ));
                }
            }
            complete.push(map);
        }

        GeneralizationHierarchy::build(attribute, complete)
    }
}

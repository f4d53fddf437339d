//! Value-generalization hierarchies.
//!
//! For each quasi-identifier a stack of id-to-id maps, one per level.
//! `map(l)[v]` is the level-`l` generalization of base value `v`. Level 0
//! is the identity; the top level commonly maps every value to a single
//! id. Monotonicity is validated at build time: two values merged at
//! level `l - 1` must remain merged at level `l`, which is what makes
//! equivalence classes at coarser nodes unions of classes at finer nodes.

use std::collections::HashMap;

use shroud_error::{Result, ShroudError};
use shroud_types::limits::SUPPRESSION_VALUE_ID;
use shroud_types::{Level, ValueId};

/// One attribute's generalization hierarchy, frozen after build.
#[derive(Debug, Clone)]
pub struct GeneralizationHierarchy {
    attribute: String,
    /// `levels[l][v]` = generalization of base value `v` at level `l`.
    /// Indexed by base value id, so every level has the column's full
    /// cardinality, sentinel included.
    levels: Vec<Box<[ValueId]>>,
}

impl GeneralizationHierarchy {
    /// Build and validate a hierarchy from a level-major matrix
    /// (`matrix[level][base_value_id]`).
    ///
    /// Validation enforces: at least one level, uniform cardinality,
    /// identity at level 0, a self-mapping suppression sentinel, and the
    /// monotone-merge property.
    pub fn build(attribute: &str, matrix: Vec<Vec<ValueId>>) -> Result<Self> {
        if matrix.is_empty() {
            return Err(ShroudError::hierarchy(attribute, "hierarchy has no levels"));
        }
        let cardinality = matrix[0].len();
        if cardinality == 0 {
            return Err(ShroudError::hierarchy(attribute, "hierarchy has no values"));
        }
        for (l, level) in matrix.iter().enumerate() {
            if level.len() != cardinality {
                return Err(ShroudError::hierarchy(
                    attribute,
                    format!(
                        "level {l} has {} entries, expected {cardinality}",
                        level.len()
                    ),
                ));
            }
        }

        // Level 0 must be the identity.
        for (v, &g) in matrix[0].iter().enumerate() {
            let v = ValueId::try_from(v).expect("cardinality exceeds u32");
            if g != v {
                return Err(ShroudError::hierarchy(
                    attribute,
                    format!("level 0 must be the identity, but maps {v} to {g}"),
                ));
            }
        }

        // The sentinel generalizes to itself at every level.
        for (l, level) in matrix.iter().enumerate() {
            if level[SUPPRESSION_VALUE_ID as usize] != SUPPRESSION_VALUE_ID {
                return Err(ShroudError::hierarchy(
                    attribute,
                    format!("level {l} does not map the suppression sentinel to itself"),
                ));
            }
        }

        // Monotone merges: values equal at level l-1 stay equal at level l.
        for l in 1..matrix.len() {
            let mut lift: HashMap<ValueId, ValueId> = HashMap::new();
            for v in 0..cardinality {
                let below = matrix[l - 1][v];
                let here = matrix[l][v];
                match lift.get(&below) {
                    None => {
                        lift.insert(below, here);
                    }
                    Some(&expected) if expected == here => {}
                    Some(&expected) => {
                        return Err(ShroudError::hierarchy(
                            attribute,
                            format!(
                                "values merged into {below} at level {} split into \
                                 {expected} and {here} at level {l}",
                                l - 1
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            attribute: attribute.to_owned(),
            levels: matrix.into_iter().map(Vec::into_boxed_slice).collect(),
        })
    }

    /// Attribute this hierarchy belongs to.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Number of levels (the hierarchy height).
    #[must_use]
    pub fn height(&self) -> Level {
        Level::try_from(self.levels.len()).expect("height exceeds u32")
    }

    /// Number of base value ids covered, sentinel included.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.levels[0].len()
    }

    /// The full id map of one level.
    ///
    /// # Panics
    ///
    /// Panics if `level >= height`.
    #[inline]
    #[must_use]
    pub fn map(&self, level: Level) -> &[ValueId] {
        &self.levels[level as usize]
    }

    /// Generalize one value.
    ///
    /// # Panics
    ///
    /// Panics if `level` or `value` is out of bounds.
    #[inline]
    #[must_use]
    pub fn generalize(&self, level: Level, value: ValueId) -> ValueId {
        self.levels[level as usize][value as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Column dictionary: 0 = "*", 1..=5 base values, 6..=7 generalized terms.
    fn age_matrix() -> Vec<Vec<ValueId>> {
        vec![
            vec![0, 1, 2, 3, 4, 5, 6, 7],
            vec![0, 6, 6, 6, 7, 7, 6, 7],
            vec![0, 0, 0, 0, 0, 0, 0, 0],
        ]
    }

    #[test]
    fn builds_and_generalizes() {
        let h = GeneralizationHierarchy::build("age", age_matrix()).unwrap();
        assert_eq!(h.height(), 3);
        assert_eq!(h.cardinality(), 8);
        assert_eq!(h.generalize(0, 3), 3);
        assert_eq!(h.generalize(1, 3), 6);
        assert_eq!(h.generalize(1, 4), 7);
        assert_eq!(h.generalize(2, 4), 0);
        assert_eq!(h.attribute(), "age");
    }

    #[test]
    fn rejects_non_identity_base() {
        let mut m = age_matrix();
        m[0][2] = 1;
        let err = GeneralizationHierarchy::build("age", m).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidHierarchy { .. }));
        assert!(err.to_string().contains("identity"));
    }

    #[test]
    fn rejects_non_monotone_merge() {
        // 1 and 2 merge into 6 at level 1, then split at level 2.
        let m = vec![
            vec![0, 1, 2, 3, 4, 5, 6, 7],
            vec![0, 6, 6, 6, 7, 7, 6, 7],
            vec![0, 1, 2, 1, 0, 0, 1, 0],
        ];
        let err = GeneralizationHierarchy::build("age", m).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidHierarchy { .. }));
        assert!(err.to_string().contains("split"));
    }

    #[test]
    fn rejects_ragged_levels() {
        let m = vec![vec![0, 1, 2], vec![0, 1]];
        let err = GeneralizationHierarchy::build("zip", m).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidHierarchy { .. }));
    }

    #[test]
    fn rejects_moving_sentinel() {
        let m = vec![vec![0, 1, 2], vec![1, 1, 1]];
        let err = GeneralizationHierarchy::build("zip", m).unwrap_err();
        assert!(err.to_string().contains("sentinel"));
    }

    #[test]
    fn rejects_empty() {
        assert!(GeneralizationHierarchy::build("zip", vec![]).is_err());
        assert!(GeneralizationHierarchy::build("zip", vec![vec![]]).is_err());
    }

    #[test]
    fn single_level_identity_is_valid() {
        let h = GeneralizationHierarchy::build("id", vec![vec![0, 1, 2]]).unwrap();
        assert_eq!(h.height(), 1);
        assert_eq!(h.map(0), &[0, 1, 2]);
    }
}

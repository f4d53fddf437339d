//! Equivalence-class building.
//!
//! Partitions row ids by their generalized quasi-identifier tuple, either
//! by scanning the encoded table or by replaying an ancestor snapshot.
//! Class iteration order is first-insertion order, which is what makes
//! runs bit-reproducible, and the snapshot path preserves it because
//! snapshot records are themselves stored in insertion order.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use shroud_data::DataManager;
use shroud_error::{Result, ShroudError};
use shroud_models::{ClassSummary, GroupifyResult};
use shroud_types::{InterruptFlag, Level, Requirements, RowId, ValueId};

use crate::snapshot::Snapshot;

/// Builds groupify results for lattice nodes.
pub struct Groupify<'a> {
    manager: &'a DataManager,
    requirements: Requirements,
    interrupt: InterruptFlag,
}

impl<'a> Groupify<'a> {
    #[must_use]
    pub fn new(
        manager: &'a DataManager,
        requirements: Requirements,
        interrupt: InterruptFlag,
    ) -> Self {
        Self {
            manager,
            requirements,
            interrupt,
        }
    }

    fn num_distributions(&self) -> usize {
        if self.requirements.contains(Requirements::DISTRIBUTION) {
            self.manager.num_sensitive()
        } else {
            0
        }
    }

    fn track_subset(&self) -> bool {
        self.requirements.contains(Requirements::SECONDARY_COUNTER)
            && self.manager.subset().is_some()
    }

    /// The generalization maps active at `levels`, one per
    /// quasi-identifier.
    fn maps(&self, levels: &[Level]) -> Vec<&'a [ValueId]> {
        levels
            .iter()
            .enumerate()
            .map(|(qi, &l)| self.manager.hierarchy(qi).map(l))
            .collect()
    }

    fn transform(maps: &[&[ValueId]], row: &[ValueId]) -> Box<[ValueId]> {
        maps.iter()
            .zip(row)
            .map(|(map, &v)| map[v as usize])
            .collect()
    }

    /// Build the partition at `levels` by scanning every row.
    pub fn from_scratch(&self, levels: &[Level]) -> Result<GroupifyResult> {
        let maps = self.maps(levels);
        let qi = self.manager.qi_table();
        let num_dist = self.num_distributions();
        let track_subset = self.track_subset();

        let mut index: HashMap<Box<[ValueId]>, usize> = HashMap::new();
        let mut classes: Vec<ClassSummary> = Vec::new();

        for row in 0..qi.num_rows() as RowId {
            let key = Self::transform(&maps, qi.row(row));
            let slot = match index.entry(key) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    // A new class opens; this is the cancellation point.
                    if self.interrupt.is_raised() {
                        return Err(ShroudError::Interrupted);
                    }
                    let slot = classes.len();
                    classes.push(ClassSummary::new(entry.key().clone(), row, num_dist));
                    entry.insert(slot);
                    slot
                }
            };
            let in_subset =
                track_subset && self.manager.subset().is_some_and(|s| s.contains(row));
            let sensitive = if num_dist > 0 {
                self.manager.se_table().row(row)
            } else {
                &[]
            };
            classes[slot].record(in_subset, sensitive);
        }

        let total = u32::try_from(qi.num_rows()).expect("row count fits u32");
        Ok(GroupifyResult::new(classes, total))
    }

    /// Build the partition at `levels` by merging the classes of an
    /// ancestor snapshot. Correct because classes only ever merge along
    /// generalization: each ancestor class maps, via its representative
    /// row, to exactly one class at the coarser node.
    pub fn from_snapshot(&self, levels: &[Level], snapshot: &Snapshot) -> Result<GroupifyResult> {
        let maps = self.maps(levels);
        let qi = self.manager.qi_table();
        let num_dist = self.num_distributions();

        let mut index: HashMap<Box<[ValueId]>, usize> = HashMap::new();
        let mut classes: Vec<ClassSummary> = Vec::new();
        let mut total = 0u32;

        for record in snapshot.records() {
            if self.interrupt.is_raised() {
                return Err(ShroudError::Interrupted);
            }
            let key = Self::transform(&maps, qi.row(record.representative));
            let slot = match index.entry(key) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let slot = classes.len();
                    classes.push(ClassSummary::new(
                        entry.key().clone(),
                        record.representative,
                        num_dist,
                    ));
                    entry.insert(slot);
                    slot
                }
            };
            let distributions = snapshot.decode_distributions(&record);
            debug_assert_eq!(distributions.len(), num_dist);
            classes[slot].absorb(record.count, record.secondary_count, &distributions);
            total += record.count;
        }

        debug_assert_eq!(
            total,
            u32::try_from(qi.num_rows()).expect("row count fits u32"),
            "snapshot replay must cover every row"
        );
        Ok(GroupifyResult::new(classes, total))
    }
}

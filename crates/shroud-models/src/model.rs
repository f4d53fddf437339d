//! The built-in class-based privacy models.
//!
//! Each model carries its capability surface as data: a requirements
//! mask, monotonicity flags, and an optional induced minimal class size.
//! k-map and differential-privacy bounds are not part of the shipped
//! library; the contract accommodates them.

use std::collections::HashMap;

use shroud_data::{DataManager, RowSet};
use shroud_error::{Result, ShroudError};
use shroud_types::{Requirements, ValueId};

use crate::{ClassModel, ClassSummary, ModelContext};

/// Resolve a sensitive attribute to its column index in the sensitive
/// sub-table.
fn resolve_sensitive(manager: &DataManager, attribute: &str) -> Result<usize> {
    manager.se_index(attribute).ok_or_else(|| {
        ShroudError::config(format!(
            "sensitive attribute '{attribute}' is not defined in the input"
        ))
    })
}

/// Relative frequencies of every value of one sensitive column over the
/// whole table, indexed by value id.
fn overall_distribution(manager: &DataManager, se: usize) -> Vec<f64> {
    let table = manager.se_table();
    let mut counts: HashMap<ValueId, u32> = HashMap::new();
    let mut max_id = 0;
    for row in 0..table.num_rows() {
        let value = table.value(row as u32, se);
        *counts.entry(value).or_insert(0) += 1;
        max_id = max_id.max(value);
    }
    let n = table.num_rows() as f64;
    let mut freqs = vec![0.0; max_id as usize + 1];
    for (value, count) in counts {
        freqs[value as usize] = f64::from(count) / n;
    }
    freqs
}

// ---------------------------------------------------------------------------
// k-anonymity
// ---------------------------------------------------------------------------

/// Every equivalence class must contain at least `k` records.
#[derive(Debug, Clone)]
pub struct KAnonymity {
    k: u32,
}

impl KAnonymity {
    #[must_use]
    pub fn new(k: u32) -> Self {
        Self { k }
    }

    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }
}

impl ClassModel for KAnonymity {
    fn name(&self) -> String {
        format!("k-anonymity (k={})", self.k)
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        let n = u32::try_from(manager.num_rows()).expect("row count fits u32");
        if self.k < 1 || self.k > n {
            return Err(ShroudError::config(format!(
                "k ({}) must be positive and at most the number of rows ({n})",
                self.k
            )));
        }
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        class.count() >= self.k
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn minimal_class_size(&self) -> Option<u32> {
        Some(self.k)
    }

    fn unique_key(&self) -> Option<&'static str> {
        Some("k-anonymity")
    }

    fn clone_for_subset(&self, _subset: &RowSet) -> Box<dyn ClassModel> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Distinct l-diversity
// ---------------------------------------------------------------------------

/// Every class must contain at least `l` distinct values of the bound
/// sensitive attribute.
#[derive(Debug, Clone)]
pub struct DistinctLDiversity {
    attribute: String,
    l: u32,
    se: usize,
}

impl DistinctLDiversity {
    #[must_use]
    pub fn new(attribute: impl Into<String>, l: u32) -> Self {
        Self {
            attribute: attribute.into(),
            l,
            se: 0,
        }
    }
}

impl ClassModel for DistinctLDiversity {
    fn name(&self) -> String {
        format!("distinct-l-diversity (l={}, attribute='{}')", self.l, self.attribute)
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER | Requirements::DISTRIBUTION
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        let n = u32::try_from(manager.num_rows()).expect("row count fits u32");
        if self.l < 1 || self.l > n {
            return Err(ShroudError::config(format!(
                "l ({}) must be positive and at most the number of rows ({n})",
                self.l
            )));
        }
        self.se = resolve_sensitive(manager, &self.attribute)?;
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        class.distributions()[self.se].distinct() >= self.l as usize
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn minimal_class_size(&self) -> Option<u32> {
        Some(self.l)
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn clone_for_subset(&self, _subset: &RowSet) -> Box<dyn ClassModel> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Recursive (c,l)-diversity
// ---------------------------------------------------------------------------

/// Recursive (c,l)-diversity: with class frequencies `r_1 >= r_2 >= ..`,
/// require `r_1 < c * (r_l + r_{l+1} + .. + r_m)`.
#[derive(Debug, Clone)]
pub struct RecursiveCLDiversity {
    attribute: String,
    c: f64,
    l: u32,
    se: usize,
}

impl RecursiveCLDiversity {
    #[must_use]
    pub fn new(attribute: impl Into<String>, c: f64, l: u32) -> Self {
        Self {
            attribute: attribute.into(),
            c,
            l,
            se: 0,
        }
    }
}

impl ClassModel for RecursiveCLDiversity {
    fn name(&self) -> String {
        format!(
            "recursive-(c,l)-diversity (c={}, l={}, attribute='{}')",
            self.c, self.l, self.attribute
        )
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER | Requirements::DISTRIBUTION
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        if self.c <= 0.0 {
            return Err(ShroudError::config(format!("c ({}) must be positive", self.c)));
        }
        if self.l < 1 {
            return Err(ShroudError::config("l must be positive"));
        }
        self.se = resolve_sensitive(manager, &self.attribute)?;
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        let counts = class.distributions()[self.se].counts_descending();
        if counts.len() < self.l as usize {
            return false;
        }
        let tail: u32 = counts[self.l as usize - 1..].iter().sum();
        f64::from(counts[0]) < self.c * f64::from(tail)
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn minimal_class_size(&self) -> Option<u32> {
        Some(self.l)
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn clone_for_subset(&self, _subset: &RowSet) -> Box<dyn ClassModel> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// t-closeness (equal ground distance)
// ---------------------------------------------------------------------------

/// The distance between a class's sensitive-value distribution and the
/// overall distribution must not exceed `t`. Equal ground distance, so
/// the earth-mover distance reduces to total variation.
#[derive(Debug, Clone)]
pub struct EqualDistanceTCloseness {
    attribute: String,
    t: f64,
    se: usize,
    overall: Vec<f64>,
}

impl EqualDistanceTCloseness {
    #[must_use]
    pub fn new(attribute: impl Into<String>, t: f64) -> Self {
        Self {
            attribute: attribute.into(),
            t,
            se: 0,
            overall: Vec::new(),
        }
    }
}

impl ClassModel for EqualDistanceTCloseness {
    fn name(&self) -> String {
        format!("t-closeness (t={}, attribute='{}')", self.t, self.attribute)
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER | Requirements::DISTRIBUTION
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        if !(0.0..=1.0).contains(&self.t) {
            return Err(ShroudError::config(format!(
                "t ({}) must be in [0, 1]",
                self.t
            )));
        }
        self.se = resolve_sensitive(manager, &self.attribute)?;
        self.overall = overall_distribution(manager, self.se);
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        let histogram = &class.distributions()[self.se];
        let size = f64::from(histogram.total());
        if size == 0.0 {
            return false;
        }
        // Total variation: walk every value of the overall distribution.
        let mut distance = 0.0;
        for (value, &overall) in self.overall.iter().enumerate() {
            let observed = f64::from(histogram.frequency(value as ValueId)) / size;
            distance += (overall - observed).abs();
        }
        distance / 2.0 <= self.t
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        true
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn clone_for_subset(&self, _subset: &RowSet) -> Box<dyn ClassModel> {
        let mut clone = self.clone();
        // Overall frequencies are recomputed against the projected data.
        clone.overall = Vec::new();
        Box::new(clone)
    }
}

// ---------------------------------------------------------------------------
// Delta-disclosure privacy
// ---------------------------------------------------------------------------

/// For every sensitive value occurring in a class, the log-ratio between
/// its in-class frequency and its overall frequency must stay below `d`.
/// Not monotone with generalization: merging classes can push a ratio
/// over the threshold.
#[derive(Debug, Clone)]
pub struct DDisclosure {
    attribute: String,
    d: f64,
    se: usize,
    overall: Vec<f64>,
}

impl DDisclosure {
    #[must_use]
    pub fn new(attribute: impl Into<String>, d: f64) -> Self {
        Self {
            attribute: attribute.into(),
            d,
            se: 0,
            overall: Vec::new(),
        }
    }
}

impl ClassModel for DDisclosure {
    fn name(&self) -> String {
        format!("d-disclosure (d={}, attribute='{}')", self.d, self.attribute)
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER | Requirements::DISTRIBUTION
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        if self.d <= 0.0 {
            return Err(ShroudError::config(format!("d ({}) must be positive", self.d)));
        }
        self.se = resolve_sensitive(manager, &self.attribute)?;
        self.overall = overall_distribution(manager, self.se);
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        let histogram = &class.distributions()[self.se];
        let size = f64::from(histogram.total());
        if size == 0.0 {
            return false;
        }
        histogram.iter().all(|(value, count)| {
            let observed = f64::from(count) / size;
            let overall = self.overall[value as usize];
            overall > 0.0 && (observed / overall).ln().abs() < self.d
        })
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        false
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn sensitive_attribute(&self) -> Option<&str> {
        Some(&self.attribute)
    }

    fn clone_for_subset(&self, _subset: &RowSet) -> Box<dyn ClassModel> {
        let mut clone = self.clone();
        clone.overall = Vec::new();
        Box::new(clone)
    }
}

// ---------------------------------------------------------------------------
// d-presence
// ---------------------------------------------------------------------------

/// Bounds the fraction of research-subset members in every class:
/// `d_min <= subset_members / class_size <= d_max`.
#[derive(Debug, Clone)]
pub struct DPresence {
    d_min: f64,
    d_max: f64,
    subset: RowSet,
}

impl DPresence {
    #[must_use]
    pub fn new(d_min: f64, d_max: f64, subset: RowSet) -> Self {
        Self {
            d_min,
            d_max,
            subset,
        }
    }
}

impl ClassModel for DPresence {
    fn name(&self) -> String {
        format!("d-presence (dmin={}, dmax={})", self.d_min, self.d_max)
    }

    fn requirements(&self) -> Requirements {
        Requirements::COUNTER | Requirements::SECONDARY_COUNTER
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        if !(0.0..=1.0).contains(&self.d_min)
            || !(0.0..=1.0).contains(&self.d_max)
            || self.d_min > self.d_max
        {
            return Err(ShroudError::config(format!(
                "presence bounds ({}, {}) must satisfy 0 <= dmin <= dmax <= 1",
                self.d_min, self.d_max
            )));
        }
        if manager.subset().is_none() {
            return Err(ShroudError::config(
                "d-presence requires the research subset to be installed",
            ));
        }
        Ok(())
    }

    fn is_anonymous(&self, class: &ClassSummary) -> bool {
        let delta = f64::from(class.secondary_count()) / f64::from(class.count());
        self.d_min <= delta && delta <= self.d_max
    }

    fn is_monotonic_with_generalization(&self) -> bool {
        false
    }

    fn is_monotonic_with_suppression(&self) -> bool {
        true
    }

    fn data_subset(&self) -> Option<&RowSet> {
        Some(&self.subset)
    }

    fn unique_key(&self) -> Option<&'static str> {
        Some("d-presence")
    }

    fn clone_for_subset(&self, subset: &RowSet) -> Box<dyn ClassModel> {
        // Re-index the carried subset onto the projection's row numbering.
        let mut projected = RowSet::new(subset.cardinality());
        for (new_row, old_row) in subset.iter().enumerate() {
            if self.subset.contains(old_row) {
                projected.insert(new_row as u32);
            }
        }
        Box::new(Self {
            d_min: self.d_min,
            d_max: self.d_max,
            subset: projected,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_data::{ColumnSpec, Dictionary, EncodedTable};
    use shroud_types::AttributeRole;

    fn manager_with_sensitive(values: &[&str], subset: Option<&[u32]>) -> DataManager {
        let mut dict = Dictionary::new(2);
        let rows: Vec<Vec<ValueId>> = values
            .iter()
            .enumerate()
            .map(|(i, v)| vec![dict.intern(0, &i.to_string()), dict.intern(1, v)])
            .collect();
        let card = dict.cardinality(0);
        let identity: Vec<ValueId> = (0..card as ValueId).collect();
        let hierarchy =
            shroud_data::GeneralizationHierarchy::build("qi", vec![identity, vec![0; card]])
                .unwrap();
        let table = EncodedTable::from_rows(rows, 2).unwrap();
        let specs = vec![
            ColumnSpec::new("qi", AttributeRole::QuasiIdentifying),
            ColumnSpec::new("illness", AttributeRole::Sensitive),
        ];
        let subset = subset.map(|rows| RowSet::from_indices(values.len(), rows).unwrap());
        DataManager::new(dict, &table, &specs, vec![hierarchy], subset).unwrap()
    }

    fn class_with(values: &[ValueId], subset_members: u32) -> ClassSummary {
        let mut class = ClassSummary::new(vec![1].into_boxed_slice(), 0, 1);
        for (i, &v) in values.iter().enumerate() {
            class.record((i as u32) < subset_members, &[v]);
        }
        class
    }

    fn ctx() -> ModelContext {
        ModelContext {
            suppression_limit: 0.0,
            absolute_max_outliers: 0,
        }
    }

    #[test]
    fn k_anonymity_threshold() {
        let manager = manager_with_sensitive(&["a", "b", "c"], None);
        let mut model = KAnonymity::new(2);
        model.initialize(&manager, &ctx()).unwrap();
        assert!(model.is_anonymous(&class_with(&[1, 1], 0)));
        assert!(!model.is_anonymous(&class_with(&[1], 0)));
        assert_eq!(model.minimal_class_size(), Some(2));
        assert!(model.is_monotonic_with_generalization());
    }

    #[test]
    fn k_anonymity_validates_k() {
        let manager = manager_with_sensitive(&["a", "b"], None);
        let mut model = KAnonymity::new(5);
        assert!(model.initialize(&manager, &ctx()).is_err());
        let mut model = KAnonymity::new(0);
        assert!(model.initialize(&manager, &ctx()).is_err());
    }

    #[test]
    fn distinct_l_diversity_counts_values() {
        let manager = manager_with_sensitive(&["flu", "cold", "flu"], None);
        let mut model = DistinctLDiversity::new("illness", 2);
        model.initialize(&manager, &ctx()).unwrap();
        assert!(model.is_anonymous(&class_with(&[1, 2], 0)));
        assert!(!model.is_anonymous(&class_with(&[1, 1, 1], 0)));
        assert_eq!(model.minimal_class_size(), Some(2));
    }

    #[test]
    fn l_diversity_unknown_attribute_rejected() {
        let manager = manager_with_sensitive(&["flu"], None);
        let mut model = DistinctLDiversity::new("salary", 2);
        let err = model.initialize(&manager, &ctx()).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidConfiguration { .. }));
    }

    #[test]
    fn recursive_cl_diversity() {
        let manager = manager_with_sensitive(&["a", "a", "b", "c"], None);
        let mut model = RecursiveCLDiversity::new("illness", 3.0, 2);
        model.initialize(&manager, &ctx()).unwrap();
        // Frequencies 2,1,1 sorted desc: r1=2 < 3 * (r2 + r3) = 6.
        assert!(model.is_anonymous(&class_with(&[1, 1, 2, 3], 0)));
        // Frequencies 4,1: r1=4 >= 3 * 1.
        assert!(!model.is_anonymous(&class_with(&[1, 1, 1, 1, 2], 0)));
        // Fewer than l distinct values.
        assert!(!model.is_anonymous(&class_with(&[1, 1], 0)));
    }

    #[test]
    fn t_closeness_total_variation() {
        // Overall: half "flu", half "cold".
        let manager = manager_with_sensitive(&["flu", "cold", "flu", "cold"], None);
        let mut model = EqualDistanceTCloseness::new("illness", 0.3);
        model.initialize(&manager, &ctx()).unwrap();
        let flu = manager.dictionary().get(1, "flu").unwrap();
        let cold = manager.dictionary().get(1, "cold").unwrap();
        // Balanced class: distance 0.
        assert!(model.is_anonymous(&class_with(&[flu, cold], 0)));
        // Pure class: distance 0.5 > 0.3.
        assert!(!model.is_anonymous(&class_with(&[flu, flu], 0)));
    }

    #[test]
    fn d_disclosure_log_ratio() {
        let manager = manager_with_sensitive(&["flu", "cold", "flu", "cold"], None);
        let mut model = DDisclosure::new("illness", 0.5);
        model.initialize(&manager, &ctx()).unwrap();
        let flu = manager.dictionary().get(1, "flu").unwrap();
        let cold = manager.dictionary().get(1, "cold").unwrap();
        // Balanced class matches overall: ln(1) = 0 < 0.5.
        assert!(model.is_anonymous(&class_with(&[flu, cold], 0)));
        // Pure class: ln(1.0 / 0.5) = 0.69 >= 0.5.
        assert!(!model.is_anonymous(&class_with(&[flu, flu], 0)));
        assert!(!model.is_monotonic_with_generalization());
    }

    #[test]
    fn d_presence_bounds_subset_fraction() {
        let manager = manager_with_sensitive(&["a", "b", "c", "d"], Some(&[0, 1]));
        let subset = manager.subset().unwrap().clone();
        let mut model = DPresence::new(0.25, 0.75, subset);
        model.initialize(&manager, &ctx()).unwrap();
        // 1 of 2 members in the subset: delta = 0.5.
        assert!(model.is_anonymous(&class_with(&[1, 2], 1)));
        // 0 of 2: delta = 0 < 0.25.
        assert!(!model.is_anonymous(&class_with(&[1, 2], 0)));
        // 2 of 2: delta = 1 > 0.75.
        assert!(!model.is_anonymous(&class_with(&[1, 2], 2)));
    }

    #[test]
    fn d_presence_requires_installed_subset() {
        let manager = manager_with_sensitive(&["a", "b"], None);
        let mut model = DPresence::new(0.0, 1.0, RowSet::new(2));
        assert!(model.initialize(&manager, &ctx()).is_err());
    }

    #[test]
    fn d_presence_subset_projection() {
        let subset = RowSet::from_indices(6, &[1, 3, 5]).unwrap();
        let model = DPresence::new(0.1, 0.9, subset);
        // Project onto rows [1, 2, 3]: members 1 and 3 land at positions 0 and 2.
        let projection = RowSet::from_indices(6, &[1, 2, 3]).unwrap();
        let projected = model.clone_for_subset(&projection);
        let carried = projected.data_subset().unwrap();
        assert_eq!(carried.len(), 3);
        assert!(carried.contains(0));
        assert!(!carried.contains(1));
        assert!(carried.contains(2));
    }
}

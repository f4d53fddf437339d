//! Privacy-model and quality-model contracts, plus the built-in library.
//!
//! The engine never branches on concrete model types: each model exposes
//! its capability surface as data (a requirements bitmask, monotonicity
//! flags, an optional minimal class size) and the checker dispatches
//! through the trait objects only on the per-class verdict. The data
//! types the contracts exchange (class summaries, the groupify result)
//! live here so that models and the checker share one vocabulary.

pub mod metric;
pub mod model;
pub mod summary;

use shroud_data::{DataManager, RowSet};
use shroud_error::Result;
use shroud_types::{Level, Quality, Requirements};

pub use metric::{AecsMetric, DiscernibilityMetric, HeightMetric};
pub use model::{
    DDisclosure, DPresence, DistinctLDiversity, EqualDistanceTCloseness, KAnonymity,
    RecursiveCLDiversity,
};
pub use summary::{ClassSummary, GroupifyResult, Histogram};

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Context handed to models and metrics at initialization, next to the
/// data manager. A read-only distillation of the run configuration.
#[derive(Debug, Clone, Copy)]
pub struct ModelContext {
    /// Maximum outlier fraction, `[0, 1)`.
    pub suppression_limit: f64,
    /// `floor(suppression_limit * n_rows)`.
    pub absolute_max_outliers: u32,
}

/// A class-based privacy model: a predicate over one equivalence class.
pub trait ClassModel: std::fmt::Debug + Send {
    /// Stable display name.
    fn name(&self) -> String;

    /// What the groupify pass must collect for this model to judge a
    /// class.
    fn requirements(&self) -> Requirements;

    /// Called once before the search, after encoding.
    fn initialize(&mut self, manager: &DataManager, ctx: &ModelContext) -> Result<()>;

    /// Does this class satisfy the model?
    fn is_anonymous(&self, class: &ClassSummary) -> bool;

    /// If a node satisfies the model, does every generalization of it?
    fn is_monotonic_with_generalization(&self) -> bool;

    /// Does the model stay satisfied when offending classes are
    /// suppressed?
    fn is_monotonic_with_suppression(&self) -> bool;

    /// Minimal equivalence-class size the model induces, if any.
    fn minimal_class_size(&self) -> Option<u32> {
        None
    }

    /// Sensitive attribute this model binds to, if any. Used for
    /// configuration validation.
    fn sensitive_attribute(&self) -> Option<&str> {
        None
    }

    /// Research subset this model carries, if any. Models carrying
    /// different subsets cannot be combined.
    fn data_subset(&self) -> Option<&RowSet> {
        None
    }

    /// Kinds of which at most one instance may be configured return a
    /// stable key here; the configuration rejects duplicates.
    fn unique_key(&self) -> Option<&'static str> {
        None
    }

    /// Clone the model projected onto a row subset, for local-recoding
    /// callers.
    fn clone_for_subset(&self, subset: &RowSet) -> Box<dyn ClassModel>;
}

/// Verdict of a sample-based model over a whole groupify result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleVerdict {
    /// Does the transformation satisfy the model (given the requested
    /// suppressions are applied)?
    pub anonymous: bool,
    /// Classes the model requires suppressed, as indices into the
    /// insertion-ordered class list. Classes are suppressed whole.
    pub must_suppress: Vec<usize>,
}

impl SampleVerdict {
    /// An unconditional pass.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            anonymous: true,
            must_suppress: Vec::new(),
        }
    }

    /// An unconditional fail.
    #[must_use]
    pub const fn fail() -> Self {
        Self {
            anonymous: false,
            must_suppress: Vec::new(),
        }
    }
}

/// A sample-based privacy model: a predicate over the whole groupify
/// result rather than a single class.
pub trait SampleModel: std::fmt::Debug + Send {
    fn name(&self) -> String;

    fn requirements(&self) -> Requirements;

    fn initialize(&mut self, manager: &DataManager, ctx: &ModelContext) -> Result<()>;

    /// Judge the whole result. `remaining_budget` is the number of rows
    /// that may still be suppressed on top of the class-based outliers.
    fn evaluate(&self, result: &GroupifyResult, remaining_budget: u32) -> SampleVerdict;

    fn is_monotonic_with_generalization(&self) -> bool;

    fn is_monotonic_with_suppression(&self) -> bool;
}

/// A quality-loss metric. Lower scores are better.
pub trait QualityModel: std::fmt::Debug + Send {
    fn name(&self) -> String;

    /// Called once before the search, after encoding.
    fn initialize(&mut self, manager: &DataManager, ctx: &ModelContext) -> Result<()>;

    /// Score a transformation from its groupify result.
    fn evaluate(&self, result: &GroupifyResult, levels: &[Level]) -> Quality;

    /// A lower bound on the score of a node, computable without a
    /// groupify pass. `None` when the metric cannot bound.
    fn lower_bound(&self, levels: &[Level]) -> Option<Quality> {
        let _ = levels;
        None
    }

    /// Is the metric monotone along generalization under the given
    /// suppression limit? Monotone metrics let the search stop early.
    fn is_monotonic(&self, suppression_limit: f64) -> bool;
}

// ---------------------------------------------------------------------------
// Monotonicity of the combined configuration
// ---------------------------------------------------------------------------

/// Monotonicity of the combined privacy configuration along
/// generalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Monotonicity {
    /// Anonymity propagates to every generalization; the search may tag
    /// whole sub-lattices without checking them.
    Full,
    /// Only the minimal-class-size portion propagates.
    Partial,
    /// Nothing may be inferred.
    None,
}

/// Derive the privacy monotonicity of a model set, the way the search
/// consumes it.
///
/// Practical monotonicity overrides everything: the caller asserts
/// monotonicity and accepts the risk. Otherwise every model must be
/// monotone with generalization, and, when suppression is in play, with
/// suppression too; a non-monotone set still counts as `Partial` when
/// some model induces a minimal class size (that portion prunes soundly).
#[must_use]
pub fn privacy_monotonicity(
    class_models: &[Box<dyn ClassModel>],
    sample_models: &[Box<dyn SampleModel>],
    suppression_limit: f64,
    practical_monotonicity: bool,
) -> Monotonicity {
    if practical_monotonicity {
        return Monotonicity::Full;
    }

    let with_suppression = suppression_limit > 0.0;
    let monotone = |generalization: bool, suppression: bool| {
        generalization && (!with_suppression || suppression)
    };

    let all_monotone = class_models.iter().all(|m| {
        monotone(
            m.is_monotonic_with_generalization(),
            m.is_monotonic_with_suppression(),
        )
    }) && sample_models.iter().all(|m| {
        monotone(
            m.is_monotonic_with_generalization(),
            m.is_monotonic_with_suppression(),
        )
    });

    if all_monotone {
        Monotonicity::Full
    } else if class_models.iter().any(|m| m.minimal_class_size().is_some()) {
        Monotonicity::Partial
    } else {
        Monotonicity::None
    }
}

/// The minimal equivalence-class size induced by a model set, or `None`
/// when no model constrains class sizes.
#[must_use]
pub fn minimal_class_size(class_models: &[Box<dyn ClassModel>]) -> Option<u32> {
    class_models
        .iter()
        .filter_map(|m| m.minimal_class_size())
        .max()
}

/// The union of all model requirements, deciding the snapshot layout.
#[must_use]
pub fn combined_requirements(
    class_models: &[Box<dyn ClassModel>],
    sample_models: &[Box<dyn SampleModel>],
) -> Requirements {
    let mut requirements = Requirements::COUNTER;
    for m in class_models {
        requirements |= m.requirements();
    }
    for m in sample_models {
        requirements |= m.requirements();
    }
    requirements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(models: Vec<Box<dyn ClassModel>>) -> Vec<Box<dyn ClassModel>> {
        models
    }

    #[test]
    fn monotonicity_full_for_k_anonymity() {
        let models = boxed(vec![Box::new(KAnonymity::new(3))]);
        assert_eq!(
            privacy_monotonicity(&models, &[], 0.0, false),
            Monotonicity::Full
        );
        assert_eq!(
            privacy_monotonicity(&models, &[], 0.5, false),
            Monotonicity::Full
        );
    }

    #[test]
    fn monotonicity_partial_with_non_monotone_model_and_k() {
        let models = boxed(vec![
            Box::new(KAnonymity::new(3)),
            Box::new(DDisclosure::new("illness", 1.0)),
        ]);
        assert_eq!(
            privacy_monotonicity(&models, &[], 0.0, false),
            Monotonicity::Partial
        );
    }

    #[test]
    fn monotonicity_none_without_class_size() {
        let models = boxed(vec![Box::new(DDisclosure::new("illness", 1.0))]);
        assert_eq!(
            privacy_monotonicity(&models, &[], 0.0, false),
            Monotonicity::None
        );
    }

    #[test]
    fn practical_monotonicity_overrides() {
        let models = boxed(vec![Box::new(DDisclosure::new("illness", 1.0))]);
        assert_eq!(
            privacy_monotonicity(&models, &[], 0.3, true),
            Monotonicity::Full
        );
    }

    #[test]
    fn minimal_class_size_takes_max() {
        let models = boxed(vec![
            Box::new(KAnonymity::new(3)),
            Box::new(DistinctLDiversity::new("illness", 5)),
        ]);
        assert_eq!(minimal_class_size(&models), Some(5));
        assert_eq!(minimal_class_size(&[]), None);
    }

    #[test]
    fn combined_requirements_union() {
        let models = boxed(vec![
            Box::new(KAnonymity::new(2)),
            Box::new(DistinctLDiversity::new("illness", 2)),
        ]);
        let req = combined_requirements(&models, &[]);
        assert!(req.contains(Requirements::COUNTER));
        assert!(req.contains(Requirements::DISTRIBUTION));
        assert!(!req.contains(Requirements::SECONDARY_COUNTER));
    }
}

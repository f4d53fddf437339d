//! The run configuration: privacy models, quality model, suppression
//! policy, history sizing, and search knobs.
//!
//! Setters only record values; every range and combination rule is
//! enforced in one validation pass before any work begins, so a rejected
//! configuration leaves no state behind.

use std::collections::HashMap;

use shroud_data::RowSet;
use shroud_error::{Result, ShroudError};
use shroud_models::{ClassModel, DiscernibilityMetric, QualityModel, SampleModel};
use shroud_types::limits::{
    DEFAULT_HEURISTIC_SEARCH_THRESHOLD, DEFAULT_HEURISTIC_SEARCH_TIME_LIMIT_MS,
    DEFAULT_HISTORY_SIZE, DEFAULT_SNAPSHOT_SIZE_DATASET, DEFAULT_SNAPSHOT_SIZE_SNAPSHOT,
    DEFAULT_SUPPRESSION_STRING,
};
use shroud_types::RoleMask;

/// Configuration of one anonymization run.
#[derive(Debug)]
pub struct ShroudConfiguration {
    pub(crate) class_models: Vec<Box<dyn ClassModel>>,
    pub(crate) sample_models: Vec<Box<dyn SampleModel>>,
    pub(crate) quality_model: Box<dyn QualityModel>,
    pub(crate) suppression_limit: f64,
    pub(crate) suppression_string: String,
    pub(crate) suppressed_attribute_types: RoleMask,
    pub(crate) suppression_always_enabled: bool,
    pub(crate) practical_monotonicity: bool,
    pub(crate) attribute_weights: HashMap<String, f64>,
    pub(crate) history_size: usize,
    pub(crate) snapshot_size_dataset: f64,
    pub(crate) snapshot_size_snapshot: f64,
    pub(crate) heuristic_search_enabled: bool,
    pub(crate) heuristic_search_threshold: u64,
    pub(crate) heuristic_search_time_limit_ms: u64,
}

impl Default for ShroudConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

impl ShroudConfiguration {
    /// A configuration without tuple suppression and with the
    /// discernibility metric.
    #[must_use]
    pub fn new() -> Self {
        Self {
            class_models: Vec::new(),
            sample_models: Vec::new(),
            quality_model: Box::new(DiscernibilityMetric::new()),
            suppression_limit: 0.0,
            suppression_string: DEFAULT_SUPPRESSION_STRING.to_owned(),
            suppressed_attribute_types: RoleMask::QI_ONLY,
            suppression_always_enabled: true,
            practical_monotonicity: false,
            attribute_weights: HashMap::new(),
            history_size: DEFAULT_HISTORY_SIZE,
            snapshot_size_dataset: DEFAULT_SNAPSHOT_SIZE_DATASET,
            snapshot_size_snapshot: DEFAULT_SNAPSHOT_SIZE_SNAPSHOT,
            heuristic_search_enabled: false,
            heuristic_search_threshold: DEFAULT_HEURISTIC_SEARCH_THRESHOLD,
            heuristic_search_time_limit_ms: DEFAULT_HEURISTIC_SEARCH_TIME_LIMIT_MS,
        }
    }

    /// A configuration permitting the given outlier fraction.
    #[must_use]
    pub fn with_suppression_limit(limit: f64) -> Self {
        let mut config = Self::new();
        config.suppression_limit = limit;
        config
    }

    /// Add a class-based privacy model.
    #[must_use]
    pub fn add_model(mut self, model: impl ClassModel + 'static) -> Self {
        self.class_models.push(Box::new(model));
        self
    }

    /// Add a sample-based privacy model.
    #[must_use]
    pub fn add_sample_model(mut self, model: impl SampleModel + 'static) -> Self {
        self.sample_models.push(Box::new(model));
        self
    }

    /// Replace the quality metric.
    #[must_use]
    pub fn quality_model(mut self, metric: impl QualityModel + 'static) -> Self {
        self.quality_model = Box::new(metric);
        self
    }

    /// Maximum outlier fraction, `[0, 1)`.
    #[must_use]
    pub fn suppression_limit(mut self, limit: f64) -> Self {
        self.suppression_limit = limit;
        self
    }

    /// String written for suppressed values on output.
    #[must_use]
    pub fn suppression_string(mut self, s: impl Into<String>) -> Self {
        self.suppression_string = s.into();
        self
    }

    /// Which attribute roles are replaced in suppressed records.
    #[must_use]
    pub fn suppressed_attribute_types(mut self, mask: RoleMask) -> Self {
        self.suppressed_attribute_types = mask;
        self
    }

    /// Apply suppression to non-anonymous output too (default on).
    #[must_use]
    pub fn suppression_always_enabled(mut self, enabled: bool) -> Self {
        self.suppression_always_enabled = enabled;
        self
    }

    /// Assume monotonicity even for models that do not guarantee it.
    /// Faster, but pruning may be unsound on pathological data.
    #[must_use]
    pub fn practical_monotonicity(mut self, assume: bool) -> Self {
        self.practical_monotonicity = assume;
        self
    }

    /// Weight of one attribute in `[0, 1]` (unset attributes weigh 0.5).
    #[must_use]
    pub fn attribute_weight(mut self, attribute: impl Into<String>, weight: f64) -> Self {
        self.attribute_weights.insert(attribute.into(), weight);
        self
    }

    /// Snapshot-history capacity.
    #[must_use]
    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Snapshot admission cap relative to the dataset, `(0, 1)`.
    #[must_use]
    pub fn snapshot_size_dataset(mut self, ratio: f64) -> Self {
        self.snapshot_size_dataset = ratio;
        self
    }

    /// Snapshot admission cap relative to stored snapshots, `(0, 1)`.
    #[must_use]
    pub fn snapshot_size_snapshot(mut self, ratio: f64) -> Self {
        self.snapshot_size_snapshot = ratio;
        self
    }

    /// Allow best-effort search over oversized lattices.
    #[must_use]
    pub fn heuristic_search(mut self, enabled: bool) -> Self {
        self.heuristic_search_enabled = enabled;
        self
    }

    /// Lattice size beyond which the heuristic takes over.
    #[must_use]
    pub fn heuristic_search_threshold(mut self, nodes: u64) -> Self {
        self.heuristic_search_threshold = nodes;
        self
    }

    /// Wall-clock budget of a heuristic run, in milliseconds.
    #[must_use]
    pub fn heuristic_search_time_limit_ms(mut self, millis: u64) -> Self {
        self.heuristic_search_time_limit_ms = millis;
        self
    }

    /// Validate numeric ranges and model combination rules. Called by
    /// the anonymizer before any work; leaves no state behind.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.class_models.is_empty() && self.sample_models.is_empty() {
            return Err(ShroudError::config(
                "at least one privacy model must be specified",
            ));
        }
        if !(0.0..1.0).contains(&self.suppression_limit) {
            return Err(ShroudError::config(format!(
                "suppression limit {} must be in [0, 1)",
                self.suppression_limit
            )));
        }
        if self.history_size == 0 {
            return Err(ShroudError::config("history size must be positive"));
        }
        for (name, ratio) in [
            ("snapshot_size_dataset", self.snapshot_size_dataset),
            ("snapshot_size_snapshot", self.snapshot_size_snapshot),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(ShroudError::config(format!(
                    "{name} ({ratio}) must be in (0, 1)"
                )));
            }
        }
        if self.heuristic_search_threshold == 0 {
            return Err(ShroudError::config(
                "heuristic search threshold must be positive",
            ));
        }
        if self.heuristic_search_time_limit_ms == 0 {
            return Err(ShroudError::config(
                "heuristic search time limit must be positive",
            ));
        }
        for (attribute, &weight) in &self.attribute_weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ShroudError::config(format!(
                    "weight {weight} for attribute '{attribute}' must be in [0, 1]"
                )));
            }
        }

        // Single-instance model kinds.
        let mut seen_keys: Vec<&'static str> = Vec::new();
        for model in &self.class_models {
            if let Some(key) = model.unique_key() {
                if seen_keys.contains(&key) {
                    return Err(ShroudError::config(format!(
                        "at most one {key} model may be configured"
                    )));
                }
                seen_keys.push(key);
            }
        }

        // All research subsets must agree.
        let mut subsets = self.class_models.iter().filter_map(|m| m.data_subset());
        if let Some(first) = subsets.next() {
            if subsets.any(|s| s != first) {
                return Err(ShroudError::config(
                    "models carry different research subsets",
                ));
            }
        }
        Ok(())
    }

    /// The shared research subset, if any model carries one.
    pub(crate) fn subset(&self) -> Option<RowSet> {
        self.class_models
            .iter()
            .find_map(|m| m.data_subset())
            .cloned()
    }
}

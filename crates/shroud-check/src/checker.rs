//! Per-node evaluation: privacy verdict, suppression accounting, and
//! quality score.
//!
//! The checker owns the groupify pass and the snapshot history; the
//! search algorithm owns the lattice and hands it in read-only. Where a
//! stored snapshot of a node below the checked one exists, the partition
//! is rebuilt by merging that snapshot instead of rescanning the table.

use shroud_data::DataManager;
use shroud_error::Result;
use shroud_lattice::Lattice;
use shroud_models::{ClassModel, GroupifyResult, QualityModel, SampleModel};
use shroud_types::{InterruptFlag, NodeId, Quality, Requirements};
use tracing::trace;

use crate::groupify::Groupify;
use crate::history::SnapshotHistory;
use crate::snapshot::Snapshot;

/// The read-only, initialized view of the run configuration the checker
/// consumes. Built by the facade once validation and model
/// initialization are done.
#[derive(Debug)]
pub struct CheckerConfig {
    /// Class-based models, initialized, in evaluation order.
    pub class_models: Vec<Box<dyn ClassModel>>,
    /// Sample-based models, initialized.
    pub sample_models: Vec<Box<dyn SampleModel>>,
    /// The quality metric, initialized.
    pub metric: Box<dyn QualityModel>,
    /// Union of all model requirements.
    pub requirements: Requirements,
    /// Maximum outlier fraction, `[0, 1)`.
    pub suppression_limit: f64,
    /// `floor(suppression_limit * N)`.
    pub absolute_max_outliers: u32,
    /// Largest minimal class size induced by the models, if any; lets
    /// the checker skip model evaluation for undersized classes.
    pub minimal_class_size: Option<u32>,
    /// Apply suppression to the output of non-anonymous transformations
    /// too.
    pub suppression_always_enabled: bool,
    /// Snapshot cache capacity.
    pub history_size: usize,
    /// Snapshot admission cap relative to the dataset.
    pub snapshot_size_dataset: f64,
    /// Snapshot admission cap relative to stored snapshots below.
    pub snapshot_size_snapshot: f64,
}

/// Outcome of checking one node.
#[derive(Debug)]
pub struct NodeCheck {
    /// Does the transformation satisfy every model within the
    /// suppression budget?
    pub anonymous: bool,
    /// Score under the configured quality metric.
    pub quality: Quality,
    /// Rows in suppressed classes.
    pub outlier_count: u32,
    /// Number of equivalence classes.
    pub num_classes: usize,
    /// The partition, with suppression marks applied.
    pub result: GroupifyResult,
}

/// Evaluates lattice nodes.
pub struct NodeChecker<'a> {
    manager: &'a DataManager,
    config: CheckerConfig,
    groupify: Groupify<'a>,
    history: SnapshotHistory,
}

impl<'a> NodeChecker<'a> {
    #[must_use]
    pub fn new(manager: &'a DataManager, config: CheckerConfig, interrupt: InterruptFlag) -> Self {
        let groupify = Groupify::new(manager, config.requirements, interrupt);
        let history = SnapshotHistory::new(
            config.history_size,
            config.snapshot_size_dataset,
            config.snapshot_size_snapshot,
            manager.num_rows(),
        );
        Self {
            manager,
            config,
            groupify,
            history,
        }
    }

    /// The configuration view this checker runs under.
    #[must_use]
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The snapshot history (reset at run end by the orchestrator).
    pub fn history_mut(&mut self) -> &mut SnapshotHistory {
        &mut self.history
    }

    /// Evaluate a node: groupify, class-based models, suppression
    /// accounting, sample-based models, quality.
    pub fn check(&mut self, lattice: &Lattice, node: NodeId) -> Result<NodeCheck> {
        let levels = lattice.levels(node);

        let mut result = match self.history.closest_ancestor(lattice, node) {
            Some(snapshot) => self.groupify.from_snapshot(&levels, snapshot)?,
            None => self.groupify.from_scratch(&levels)?,
        };

        // A model needing distributions without any sensitive column is
        // inapplicable; the node cannot be judged anonymous.
        if self.config.requirements.contains(Requirements::DISTRIBUTION)
            && self.manager.num_sensitive() == 0
        {
            let quality = self.config.metric.evaluate(&result, &levels);
            return Ok(NodeCheck {
                anonymous: false,
                quality,
                outlier_count: 0,
                num_classes: result.num_classes(),
                result,
            });
        }

        // Snapshots describe the raw partition, so capture before any
        // suppression marking.
        let snapshot = Snapshot::capture(
            node,
            &result,
            self.config.requirements,
            self.manager.num_sensitive(),
        );
        self.history.put(lattice, snapshot);

        // Class-based models. Offending classes are suppressed whole;
        // classes below the induced minimal size fail without running
        // the models.
        let min_size = self.config.minimal_class_size.unwrap_or(0);
        let mut outlier_count = 0u32;
        for class in result.classes_mut() {
            let passes = class.count() >= min_size
                && self
                    .config
                    .class_models
                    .iter()
                    .all(|m| m.is_anonymous(&*class));
            if !passes {
                class.set_suppressed(true);
                outlier_count += class.count();
            }
        }

        let budget = self.config.absolute_max_outliers;
        let mut anonymous = outlier_count <= budget;

        // Sample-based models see the whole partition and may demand
        // further suppression out of the remaining budget.
        for model in &self.config.sample_models {
            let remaining = budget.saturating_sub(outlier_count);
            let verdict = model.evaluate(&result, remaining);
            for idx in verdict.must_suppress {
                let class = &mut result.classes_mut()[idx];
                if !class.is_suppressed() {
                    class.set_suppressed(true);
                    outlier_count += class.count();
                }
            }
            anonymous = anonymous && verdict.anonymous;
        }
        anonymous = anonymous && outlier_count <= budget;

        // Non-anonymous output keeps its records unless the caller asked
        // for suppression regardless.
        if !anonymous && !self.config.suppression_always_enabled {
            for class in result.classes_mut() {
                class.set_suppressed(false);
            }
        }
        result.set_outlier_count(outlier_count);

        let quality = self.config.metric.evaluate(&result, &levels);
        trace!(
            target: "shroud.check",
            node = node.get(),
            classes = result.num_classes(),
            outliers = outlier_count,
            anonymous,
            quality = quality.get(),
            "checked node"
        );

        Ok(NodeCheck {
            anonymous,
            quality,
            outlier_count,
            num_classes: result.num_classes(),
            result,
        })
    }

    /// A lower bound on the node's quality without a groupify pass, when
    /// the metric supports one.
    #[must_use]
    pub fn score(&self, lattice: &Lattice, node: NodeId) -> Option<Quality> {
        self.config.metric.lower_bound(&lattice.levels(node))
    }
}

//! The result surface: decoded output table, the chosen transformation,
//! and the annotated lattice.

use shroud_lattice::NodeState;
use shroud_types::{Level, Quality};

/// Annotation of one visited lattice node.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeAnnotation {
    /// Level vector, in quasi-identifier order.
    pub levels: Vec<Level>,
    pub state: NodeState,
    /// Achieved quality, where the node was checked.
    pub quality: Option<Quality>,
    /// Outlier count observed by the checker, where checked.
    pub outliers: u32,
}

/// Outcome of a successful anonymization run.
///
/// Holds the input lock; call [`crate::InputTable::release`] once the
/// result has been consumed.
#[derive(Debug)]
pub struct AnonymizedResult {
    pub(crate) header: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
    pub(crate) qi_names: Vec<String>,
    pub(crate) optimal_levels: Vec<Level>,
    pub(crate) quality: Quality,
    pub(crate) outlier_count: u32,
    pub(crate) checked: usize,
    pub(crate) total_nodes: u64,
    pub(crate) exhaustive: bool,
    pub(crate) annotations: Vec<NodeAnnotation>,
}

impl AnonymizedResult {
    /// Output column names, identifying columns dropped.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// The anonymized table, decoded, with suppression applied.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// The chosen generalization levels, in quasi-identifier order.
    #[must_use]
    pub fn optimal_levels(&self) -> &[Level] {
        &self.optimal_levels
    }

    /// The chosen transformation as `(attribute, level)` pairs.
    #[must_use]
    pub fn optimal_transformation(&self) -> Vec<(&str, Level)> {
        self.qi_names
            .iter()
            .map(String::as_str)
            .zip(self.optimal_levels.iter().copied())
            .collect()
    }

    /// Quality-loss score of the optimum (lower is better).
    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Suppressed rows in the output.
    #[must_use]
    pub fn outlier_count(&self) -> u32 {
        self.outlier_count
    }

    /// Nodes the checker actually evaluated.
    #[must_use]
    pub fn checked_nodes(&self) -> usize {
        self.checked
    }

    /// Size of the search space.
    #[must_use]
    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    /// `false` when the heuristic ran and optimality is best-effort.
    #[must_use]
    pub fn is_exhaustive(&self) -> bool {
        self.exhaustive
    }

    /// States and qualities of every visited node, ascending by node id.
    #[must_use]
    pub fn annotated_lattice(&self) -> &[NodeAnnotation] {
        &self.annotations
    }
}

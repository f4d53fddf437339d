//! The bounded product lattice of generalization level vectors.
//!
//! A node *is* a level vector `(l_0, .., l_{d-1})` with
//! `min_level_i <= l_i <= max_level_i`; edges connect vectors differing by
//! one level in exactly one coordinate. Node identity is the mixed-radix
//! packing of the offset vector, dense in `[0, len)`, which makes it an
//! arena index: the lattice owns all per-node lifecycle state, and
//! parent/child relationships are id-based, never owned references.
//!
//! Small lattices keep node state in a dense arena; beyond
//! [`DENSE_NODE_LIMIT`] the store switches to a sparse map so heuristic
//! runs over huge spaces only pay for the nodes they touch.

use std::collections::HashMap;

use shroud_types::{Level, LevelVector, NodeId, Quality};

/// Above this many nodes, per-node state is kept sparsely.
pub const DENSE_NODE_LIMIT: u64 = 1 << 20;

// ---------------------------------------------------------------------------
// Node lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a lattice node.
///
/// `Unvisited` moves to a `Checked*` or `Inferred*` state; the `Checked*`
/// states are terminal; an `Inferred*` node may later be force-checked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub enum NodeState {
    /// Never looked at.
    #[default]
    Unvisited,
    /// The checker evaluated the node and found it anonymous.
    CheckedAnonymous,
    /// The checker evaluated the node and found it non-anonymous.
    CheckedNonAnonymous,
    /// Anonymity inferred from a checked descendant via monotonicity.
    InferredAnonymous,
    /// Non-anonymity inferred from a checked generalization via
    /// monotonicity.
    InferredNonAnonymous,
    /// Skipped: its quality lower bound cannot beat the current optimum.
    Pruned,
}

impl NodeState {
    /// Was the node actually evaluated by the checker?
    #[inline]
    #[must_use]
    pub const fn is_checked(self) -> bool {
        matches!(self, Self::CheckedAnonymous | Self::CheckedNonAnonymous)
    }

    /// Is the node tagged anonymous (checked or inferred)?
    #[inline]
    #[must_use]
    pub const fn is_anonymous(self) -> bool {
        matches!(self, Self::CheckedAnonymous | Self::InferredAnonymous)
    }

    /// Is the node tagged non-anonymous (checked or inferred)?
    #[inline]
    #[must_use]
    pub const fn is_non_anonymous(self) -> bool {
        matches!(self, Self::CheckedNonAnonymous | Self::InferredNonAnonymous)
    }

    /// Has the node left `Unvisited`?
    #[inline]
    #[must_use]
    pub const fn is_visited(self) -> bool {
        !matches!(self, Self::Unvisited)
    }
}

/// Per-node annotations: lifecycle state, achieved quality (when checked),
/// quality lower bound (when scored), and the outlier count observed by
/// the checker (for no-solution diagnostics).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeInfo {
    pub state: NodeState,
    pub quality: Option<Quality>,
    pub lower_bound: Option<Quality>,
    pub outliers: u32,
}

// ---------------------------------------------------------------------------
// Node state storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum NodeStore {
    Dense(Vec<NodeInfo>),
    Sparse(HashMap<NodeId, NodeInfo>),
}

impl NodeStore {
    fn get(&self, id: NodeId) -> NodeInfo {
        match self {
            Self::Dense(v) => v[id.as_usize()],
            Self::Sparse(m) => m.get(&id).copied().unwrap_or_default(),
        }
    }

    fn get_mut(&mut self, id: NodeId) -> &mut NodeInfo {
        match self {
            Self::Dense(v) => &mut v[id.as_usize()],
            Self::Sparse(m) => m.entry(id).or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lattice
// ---------------------------------------------------------------------------

/// The bounded product lattice `prod [min_i, max_i]` with per-node state.
///
/// Mutation happens only through the checker and the search algorithm via
/// the `set_*` methods; everything else is read-only.
#[derive(Debug, Clone)]
pub struct Lattice {
    min_levels: Box<[Level]>,
    max_levels: Box<[Level]>,
    strides: Box<[u64]>,
    len: u64,
    nodes: NodeStore,
}

impl Lattice {
    /// Build the lattice for the given per-attribute bounds.
    ///
    /// # Panics
    ///
    /// Panics if the bounds are empty or inverted; the data manager
    /// validates them beforehand.
    #[must_use]
    pub fn new(min_levels: &[Level], max_levels: &[Level]) -> Self {
        assert!(!min_levels.is_empty(), "lattice needs at least one attribute");
        assert_eq!(min_levels.len(), max_levels.len());

        let mut strides = vec![0u64; min_levels.len()];
        let mut len = 1u64;
        // Last attribute varies fastest, matching lexicographic id order.
        for i in (0..min_levels.len()).rev() {
            assert!(min_levels[i] <= max_levels[i], "inverted bounds");
            strides[i] = len;
            let radix = u64::from(max_levels[i] - min_levels[i] + 1);
            len = len.checked_mul(radix).expect("lattice size overflows u64");
        }

        let nodes = if len <= DENSE_NODE_LIMIT {
            NodeStore::Dense(vec![NodeInfo::default(); usize::try_from(len).expect("fits")])
        } else {
            NodeStore::Sparse(HashMap::new())
        };

        Self {
            min_levels: min_levels.into(),
            max_levels: max_levels.into(),
            strides: strides.into_boxed_slice(),
            len,
            nodes,
        }
    }

    /// Total number of nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// A lattice is never empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of attributes (lattice dimensionality).
    #[inline]
    #[must_use]
    pub fn num_attributes(&self) -> usize {
        self.min_levels.len()
    }

    /// Per-attribute lower bounds.
    #[must_use]
    pub fn min_levels(&self) -> &[Level] {
        &self.min_levels
    }

    /// Per-attribute upper bounds.
    #[must_use]
    pub fn max_levels(&self) -> &[Level] {
        &self.max_levels
    }

    /// The least-generalized node.
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> NodeId {
        NodeId::ZERO
    }

    /// The most-generalized node.
    #[inline]
    #[must_use]
    pub fn top(&self) -> NodeId {
        NodeId::new(self.len - 1)
    }

    /// Pack a level vector into its node id.
    ///
    /// # Panics
    ///
    /// Panics if `levels` is out of bounds.
    #[must_use]
    pub fn id(&self, levels: &[Level]) -> NodeId {
        assert_eq!(levels.len(), self.num_attributes());
        let mut raw = 0u64;
        for (i, &l) in levels.iter().enumerate() {
            assert!(
                l >= self.min_levels[i] && l <= self.max_levels[i],
                "level {l} out of bounds for attribute {i}"
            );
            raw += u64::from(l - self.min_levels[i]) * self.strides[i];
        }
        NodeId::new(raw)
    }

    /// Unpack a node id into its level vector.
    #[must_use]
    pub fn levels(&self, id: NodeId) -> LevelVector {
        let mut raw = id.get();
        debug_assert!(raw < self.len);
        let mut out = vec![0; self.num_attributes()].into_boxed_slice();
        for i in 0..self.num_attributes() {
            let offset = raw / self.strides[i];
            raw %= self.strides[i];
            out[i] = self.min_levels[i] + Level::try_from(offset).expect("offset fits a level");
        }
        out
    }

    /// Sum of levels (the primary traversal order).
    #[must_use]
    pub fn total_level(&self, id: NodeId) -> u32 {
        self.levels(id).iter().sum()
    }

    /// Smallest total level of any node.
    #[must_use]
    pub fn min_total_level(&self) -> u32 {
        self.min_levels.iter().sum()
    }

    /// Largest total level of any node.
    #[must_use]
    pub fn max_total_level(&self) -> u32 {
        self.max_levels.iter().sum()
    }

    /// Componentwise `a <= b`: `b` generalizes (or equals) `a`, so under
    /// monotone hierarchies every class at `b` is a union of classes at
    /// `a`.
    #[must_use]
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        self.levels(a)
            .iter()
            .zip(self.levels(b).iter())
            .all(|(x, y)| x <= y)
    }

    /// Immediate generalizations: one coordinate raised by one level.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let levels = self.levels(id);
        (0..self.num_attributes()).filter_map(move |i| {
            (levels[i] < self.max_levels[i]).then(|| {
                let mut next = levels.clone();
                next[i] += 1;
                self.id(&next)
            })
        })
    }

    /// Immediate specializations: one coordinate lowered by one level.
    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let levels = self.levels(id);
        (0..self.num_attributes()).filter_map(move |i| {
            (levels[i] > self.min_levels[i]).then(|| {
                let mut next = levels.clone();
                next[i] -= 1;
                self.id(&next)
            })
        })
    }

    /// All node ids grouped by total level, ascending; each group sorted
    /// by id. Costs O(len) time and memory; the search only calls it in
    /// non-heuristic mode.
    #[must_use]
    pub fn nodes_by_total_level(&self) -> Vec<Vec<NodeId>> {
        let base = self.min_total_level();
        let span = (self.max_total_level() - base) as usize + 1;
        let mut groups: Vec<Vec<NodeId>> = vec![Vec::new(); span];
        for raw in 0..self.len {
            let id = NodeId::new(raw);
            let total = self.total_level(id);
            groups[(total - base) as usize].push(id);
        }
        groups
    }

    // --- Node state ---

    /// Current annotations of a node.
    #[inline]
    #[must_use]
    pub fn info(&self, id: NodeId) -> NodeInfo {
        self.nodes.get(id)
    }

    /// Current lifecycle state of a node.
    #[inline]
    #[must_use]
    pub fn state(&self, id: NodeId) -> NodeState {
        self.nodes.get(id).state
    }

    /// Transition a node's lifecycle state.
    ///
    /// `Checked*` states are terminal; a checked node is never demoted.
    pub fn set_state(&mut self, id: NodeId, state: NodeState) {
        let info = self.nodes.get_mut(id);
        debug_assert!(
            !info.state.is_checked() || state == info.state,
            "checked state is terminal: {:?} -> {state:?}",
            info.state
        );
        info.state = state;
    }

    /// Record the achieved quality of a checked node.
    pub fn set_quality(&mut self, id: NodeId, quality: Quality) {
        self.nodes.get_mut(id).quality = Some(quality);
    }

    /// Record a quality lower bound for an unchecked node.
    pub fn set_lower_bound(&mut self, id: NodeId, bound: Quality) {
        self.nodes.get_mut(id).lower_bound = Some(bound);
    }

    /// Record the outlier count the checker observed.
    pub fn set_outliers(&mut self, id: NodeId, outliers: u32) {
        self.nodes.get_mut(id).outliers = outliers;
    }

    /// Ids of all visited nodes, ascending (deterministic export order).
    #[must_use]
    pub fn visited_nodes(&self) -> Vec<NodeId> {
        match &self.nodes {
            NodeStore::Dense(v) => (0..self.len)
                .map(NodeId::new)
                .filter(|id| v[id.as_usize()].state.is_visited())
                .collect(),
            NodeStore::Sparse(m) => {
                let mut ids: Vec<NodeId> = m
                    .iter()
                    .filter(|(_, info)| info.state.is_visited())
                    .map(|(&id, _)| id)
                    .collect();
                ids.sort_unstable();
                ids
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice_2x3() -> Lattice {
        // Heights 2 and 3, unrestricted bounds.
        Lattice::new(&[0, 0], &[1, 2])
    }

    #[test]
    fn id_levels_roundtrip() {
        let l = lattice_2x3();
        assert_eq!(l.len(), 6);
        for raw in 0..l.len() {
            let id = NodeId::new(raw);
            let levels = l.levels(id);
            assert_eq!(l.id(&levels), id, "roundtrip for {levels:?}");
        }
        assert_eq!(&*l.levels(l.bottom()), &[0, 0]);
        assert_eq!(&*l.levels(l.top()), &[1, 2]);
    }

    #[test]
    fn restricted_bounds_offset_ids() {
        let l = Lattice::new(&[1, 1], &[2, 3]);
        assert_eq!(l.len(), 6);
        assert_eq!(&*l.levels(l.bottom()), &[1, 1]);
        assert_eq!(&*l.levels(l.top()), &[2, 3]);
        assert_eq!(l.min_total_level(), 2);
        assert_eq!(l.max_total_level(), 5);
    }

    #[test]
    fn successors_and_predecessors() {
        let l = lattice_2x3();
        let mid = l.id(&[0, 1]);
        let succ: Vec<_> = l.successors(mid).map(|id| l.levels(id)).collect();
        assert_eq!(succ.len(), 2);
        assert!(succ.iter().any(|v| &**v == [1, 1]));
        assert!(succ.iter().any(|v| &**v == [0, 2]));

        let pred: Vec<_> = l.predecessors(mid).map(|id| l.levels(id)).collect();
        assert_eq!(pred.len(), 1);
        assert_eq!(&*pred[0], &[0, 0]);

        assert_eq!(l.successors(l.top()).count(), 0);
        assert_eq!(l.predecessors(l.bottom()).count(), 0);
    }

    #[test]
    fn precedes_is_componentwise() {
        let l = lattice_2x3();
        let a = l.id(&[0, 1]);
        let b = l.id(&[1, 1]);
        let c = l.id(&[1, 0]);
        assert!(l.precedes(a, b));
        assert!(!l.precedes(b, a));
        assert!(!l.precedes(a, c));
        assert!(l.precedes(a, a));
    }

    #[test]
    fn level_order_groups_are_sorted() {
        let l = lattice_2x3();
        let groups = l.nodes_by_total_level();
        assert_eq!(groups.len(), 4); // totals 0..=3
        let total: usize = groups.iter().map(Vec::len).sum();
        assert_eq!(total as u64, l.len());
        for (i, group) in groups.iter().enumerate() {
            for &id in group {
                assert_eq!(l.total_level(id) as usize, i);
            }
            assert!(group.windows(2).all(|w| w[0] < w[1]), "group {i} sorted");
        }
    }

    #[test]
    fn state_transitions() {
        let mut l = lattice_2x3();
        let id = l.id(&[1, 0]);
        assert_eq!(l.state(id), NodeState::Unvisited);
        l.set_state(id, NodeState::InferredAnonymous);
        assert!(l.state(id).is_anonymous());
        l.set_state(id, NodeState::CheckedAnonymous);
        assert!(l.state(id).is_checked());
        l.set_quality(id, Quality::new(3.5));
        l.set_outliers(id, 2);
        let info = l.info(id);
        assert_eq!(info.quality, Some(Quality::new(3.5)));
        assert_eq!(info.outliers, 2);
        assert_eq!(l.visited_nodes(), vec![id]);
    }

    #[test]
    fn sparse_store_for_huge_lattice() {
        // 8 attributes of height 8 -> 16.7M nodes, beyond the dense limit.
        let l = Lattice::new(&[0; 8], &[7; 8]);
        assert!(l.len() > DENSE_NODE_LIMIT);
        let mut l = l;
        let id = l.id(&[1, 2, 3, 4, 5, 6, 7, 0]);
        assert_eq!(l.state(id), NodeState::Unvisited);
        l.set_state(id, NodeState::CheckedNonAnonymous);
        assert!(l.state(id).is_non_anonymous());
        assert_eq!(l.visited_nodes(), vec![id]);
    }
}

//! The FLASH sweep.
//!
//! Nodes are visited in level-sum order, refined by the strategy. Under
//! full monotonicity, each unvisited node opens a greedy ascending path
//! whose anonymity transition is located by binary search; every check
//! tags the reachable sub-lattice above an anonymous node and below a
//! non-anonymous one, so most nodes are classified without being
//! checked. Non-monotone model sets fall back to an exhaustive sweep
//! with lower-bound pruning. Search spaces beyond the configured
//! threshold switch to a best-effort greedy ascent under a wall-clock
//! limit.

use std::time::{Duration, Instant};

use shroud_check::NodeChecker;
use shroud_error::{Result, ShroudError};
use shroud_lattice::{Lattice, NodeState};
use shroud_models::Monotonicity;
use shroud_types::{InterruptFlag, LevelVector, NodeId, Quality};
use tracing::debug;

use crate::strategy::FlashStrategy;

/// Search-time knobs, distilled from the run configuration.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Monotonicity of the combined privacy configuration.
    pub monotonicity: Monotonicity,
    /// Is the quality metric monotone under the configured suppression?
    pub metric_monotonic: bool,
    /// Switch to the heuristic when the lattice exceeds the threshold.
    pub heuristic_enabled: bool,
    pub heuristic_threshold: u64,
    pub heuristic_time_limit: Duration,
    /// Cooperative cancellation, shared with the checker.
    pub interrupt: InterruptFlag,
}

/// What the traversal found.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The best anonymous node, if any.
    pub optimum: Option<NodeId>,
    /// Its quality.
    pub optimum_quality: Option<Quality>,
    /// Nodes actually evaluated by the checker.
    pub checked: usize,
    /// When no solution exists: the checked nodes closest to anonymity
    /// (smallest suppression overshoot), ascending by node id.
    pub closest: Vec<NodeId>,
    /// `false` when the heuristic ran: optimality is not guaranteed.
    pub exhaustive: bool,
}

/// How many near-miss nodes to surface in no-solution diagnostics.
const CLOSEST_DIAGNOSTICS: usize = 8;

/// Traverse the lattice and locate the optimal anonymous node.
pub fn search(
    lattice: &mut Lattice,
    checker: &mut NodeChecker<'_>,
    strategy: &FlashStrategy,
    options: &SearchOptions,
) -> Result<SearchOutcome> {
    let mut run = Run {
        lattice,
        checker,
        strategy,
        interrupt: options.interrupt.clone(),
        best: None,
        checked: 0,
    };

    let heuristic = options.heuristic_enabled && run.lattice.len() > options.heuristic_threshold;
    debug!(
        target: "shroud.flash",
        nodes = run.lattice.len(),
        monotonicity = ?options.monotonicity,
        heuristic,
        "starting traversal"
    );

    if heuristic {
        run.heuristic(options.heuristic_time_limit)?;
    } else {
        match options.monotonicity {
            Monotonicity::Full => run.flash(options.metric_monotonic)?,
            Monotonicity::Partial | Monotonicity::None => run.exhaustive()?,
        }
    }

    let outcome = run.finish(!heuristic);
    debug!(
        target: "shroud.flash",
        checked = outcome.checked,
        optimum = outcome.optimum.map(NodeId::get),
        "traversal finished"
    );
    Ok(outcome)
}

struct Best {
    node: NodeId,
    quality: Quality,
    levels: LevelVector,
}

struct Run<'r, 'm> {
    lattice: &'r mut Lattice,
    checker: &'r mut NodeChecker<'m>,
    strategy: &'r FlashStrategy,
    interrupt: InterruptFlag,
    best: Option<Best>,
    checked: usize,
}

impl Run<'_, '_> {
    // --- traversal modes ---

    /// Classic FLASH: sound only under full monotonicity.
    fn flash(&mut self, metric_monotonic: bool) -> Result<()> {
        let groups = self.lattice.nodes_by_total_level();
        for group in &groups {
            let mut nodes = group.clone();
            self.strategy.sort(self.lattice, &mut nodes);
            for &node in &nodes {
                if self.interrupt.is_raised() {
                    return Err(ShroudError::Interrupted);
                }
                if self.lattice.state(node).is_visited() {
                    continue;
                }
                let path = self.build_path(node);
                self.check_path(&path)?;
            }
        }

        // With a non-monotone metric an inferred-anonymous node may beat
        // every checked one, so their qualities must be materialized.
        if !metric_monotonic {
            for raw in 0..self.lattice.len() {
                let node = NodeId::new(raw);
                if self.lattice.state(node) == NodeState::InferredAnonymous {
                    if self.interrupt.is_raised() {
                        return Err(ShroudError::Interrupted);
                    }
                    self.check_node(node, true)?;
                }
            }
        }
        Ok(())
    }

    /// Check every node; the only sound plan when anonymity may be
    /// non-monotone. Lower-bound pruning still applies.
    fn exhaustive(&mut self) -> Result<()> {
        let groups = self.lattice.nodes_by_total_level();
        for group in &groups {
            let mut nodes = group.clone();
            self.strategy.sort(self.lattice, &mut nodes);
            for &node in &nodes {
                if self.interrupt.is_raised() {
                    return Err(ShroudError::Interrupted);
                }
                if self.lattice.state(node).is_visited() {
                    continue;
                }
                if let (Some(bound), Some(best)) =
                    (self.checker.score(self.lattice, node), &self.best)
                {
                    // A node whose bound exceeds the incumbent cannot win;
                    // equality is kept checkable for the tie-breaks.
                    if bound > best.quality {
                        self.lattice.set_lower_bound(node, bound);
                        self.lattice.set_state(node, NodeState::Pruned);
                        continue;
                    }
                }
                self.check_node(node, false)?;
            }
        }
        Ok(())
    }

    /// Best-effort greedy ascent from the bottom under a wall-clock
    /// limit. No inference, no optimality guarantee; checked results are
    /// still exact and deterministic.
    fn heuristic(&mut self, time_limit: Duration) -> Result<()> {
        let deadline = Instant::now() + time_limit;
        let mut stack = vec![self.lattice.bottom()];
        while let Some(node) = stack.pop() {
            if self.interrupt.is_raised() {
                return Err(ShroudError::Interrupted);
            }
            if Instant::now() >= deadline {
                debug!(target: "shroud.flash", "heuristic time limit reached");
                break;
            }
            if self.lattice.state(node).is_visited() {
                continue;
            }
            let anonymous = self.check_node(node, false)?;
            if !anonymous {
                let mut successors: Vec<NodeId> = self
                    .lattice
                    .successors(node)
                    .filter(|&s| !self.lattice.state(s).is_visited())
                    .collect();
                self.strategy.sort(self.lattice, &mut successors);
                // Best candidate goes on top of the stack.
                for s in successors.into_iter().rev() {
                    stack.push(s);
                }
            }
        }
        Ok(())
    }

    // --- path handling (FLASH proper) ---

    /// Greedy ascending path through unvisited nodes, from `from` toward
    /// the top, always taking the strategy-preferred generalization.
    fn build_path(&self, from: NodeId) -> Vec<NodeId> {
        let mut path = vec![from];
        let mut current = from;
        loop {
            let mut next: Option<NodeId> = None;
            for successor in self.lattice.successors(current) {
                if self.lattice.state(successor).is_visited() {
                    continue;
                }
                let preferred = next.is_none_or(|n| {
                    self.strategy.compare(self.lattice, successor, n) == std::cmp::Ordering::Less
                });
                if preferred {
                    next = Some(successor);
                }
            }
            match next {
                Some(n) => {
                    path.push(n);
                    current = n;
                }
                None => break,
            }
        }
        path
    }

    /// Binary-search the anonymity transition on an ascending path.
    /// Every probe classifies its whole sub-lattice via the tags, so the
    /// path collapses in `O(log len)` checks.
    fn check_path(&mut self, path: &[NodeId]) -> Result<()> {
        let mut low = 0usize;
        let mut high = path.len() - 1;
        while low <= high {
            let mid = low + (high - low) / 2;
            if self.classify(path[mid])? {
                if mid == 0 {
                    break;
                }
                high = mid - 1;
            } else {
                low = mid + 1;
            }
        }
        Ok(())
    }

    /// Anonymity of a node, reusing tags where present and checking
    /// otherwise (with inference).
    fn classify(&mut self, node: NodeId) -> Result<bool> {
        let state = self.lattice.state(node);
        if state.is_anonymous() {
            return Ok(true);
        }
        if state.is_non_anonymous() {
            return Ok(false);
        }
        self.check_node(node, true)
    }

    // --- checking and tagging ---

    /// Run the checker on one node, record its annotations, update the
    /// incumbent, and (when `infer` is set) propagate tags.
    fn check_node(&mut self, node: NodeId, infer: bool) -> Result<bool> {
        let check = self.checker.check(self.lattice, node)?;
        self.checked += 1;
        let state = if check.anonymous {
            NodeState::CheckedAnonymous
        } else {
            NodeState::CheckedNonAnonymous
        };
        self.lattice.set_state(node, state);
        self.lattice.set_quality(node, check.quality);
        self.lattice.set_outliers(node, check.outlier_count);

        if check.anonymous {
            self.update_best(node, check.quality);
            if infer {
                self.tag_anonymous_above(node);
            }
        } else if infer {
            self.tag_non_anonymous_below(node);
        }
        Ok(check.anonymous)
    }

    /// Every unvisited generalization of an anonymous node is anonymous.
    fn tag_anonymous_above(&mut self, node: NodeId) {
        let mut stack: Vec<NodeId> = self.lattice.successors(node).collect();
        while let Some(n) = stack.pop() {
            if self.lattice.state(n) == NodeState::Unvisited {
                self.lattice.set_state(n, NodeState::InferredAnonymous);
                stack.extend(self.lattice.successors(n));
            }
        }
    }

    /// Every unvisited specialization of a non-anonymous node is
    /// non-anonymous.
    fn tag_non_anonymous_below(&mut self, node: NodeId) {
        let mut stack: Vec<NodeId> = self.lattice.predecessors(node).collect();
        while let Some(n) = stack.pop() {
            if self.lattice.state(n) == NodeState::Unvisited {
                self.lattice.set_state(n, NodeState::InferredNonAnonymous);
                stack.extend(self.lattice.predecessors(n));
            }
        }
    }

    /// Quality ties break toward the lexicographically smaller level
    /// vector, then the smaller node id.
    fn update_best(&mut self, node: NodeId, quality: Quality) {
        let levels = self.lattice.levels(node);
        let improves = match &self.best {
            None => true,
            Some(best) => quality
                .cmp(&best.quality)
                .then_with(|| levels.cmp(&best.levels))
                .then_with(|| node.cmp(&best.node))
                .is_lt(),
        };
        if improves {
            self.best = Some(Best {
                node,
                quality,
                levels,
            });
        }
    }

    fn finish(self, exhaustive: bool) -> SearchOutcome {
        let closest = if self.best.is_some() {
            Vec::new()
        } else {
            // Checked non-anonymous nodes with the smallest outlier
            // overshoot are the most useful diagnostics.
            let mut near: Vec<(u32, NodeId)> = self
                .lattice
                .visited_nodes()
                .into_iter()
                .filter(|&id| self.lattice.state(id) == NodeState::CheckedNonAnonymous)
                .map(|id| (self.lattice.info(id).outliers, id))
                .collect();
            near.sort_unstable();
            let cutoff = near.first().map(|&(outliers, _)| outliers);
            let mut closest: Vec<NodeId> = near
                .into_iter()
                .take_while(|&(outliers, _)| Some(outliers) == cutoff)
                .map(|(_, id)| id)
                .take(CLOSEST_DIAGNOSTICS)
                .collect();
            closest.sort_unstable();
            closest
        };

        SearchOutcome {
            optimum: self.best.as_ref().map(|b| b.node),
            optimum_quality: self.best.as_ref().map(|b| b.quality),
            checked: self.checked,
            closest,
            exhaustive,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

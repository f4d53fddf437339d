//! Bounded snapshot cache.
//!
//! Keyed by node id, least-recently-used eviction, with a two-ratio
//! admission policy: a snapshot is only worth storing if it is
//! substantially smaller than the dataset and than every stored snapshot
//! below it on the same path (otherwise replaying it saves nothing).
//!
//! The recency list is a slab-backed doubly-linked list with index links
//! instead of pointers, so all operations are O(1) without unsafe code.

use std::collections::HashMap;

use shroud_lattice::Lattice;
use shroud_types::NodeId;

use crate::snapshot::Snapshot;

const NIL: u32 = u32::MAX;

#[derive(Debug)]
struct HistoryEntry {
    snapshot: Snapshot,
    prev: u32,
    next: u32,
}

/// LRU cache of snapshots with ratio-based admission.
#[derive(Debug)]
pub struct SnapshotHistory {
    capacity: usize,
    /// Admission cap in records: `floor(snapshot_size_dataset * N)`.
    max_dataset_records: usize,
    /// Admission cap relative to stored snapshots below the candidate.
    snapshot_size_snapshot: f64,
    index: HashMap<NodeId, u32>,
    slots: Vec<Option<HistoryEntry>>,
    free: Vec<u32>,
    /// Least recently used entry.
    head: u32,
    /// Most recently used entry.
    tail: u32,
}

impl SnapshotHistory {
    #[must_use]
    pub fn new(
        capacity: usize,
        snapshot_size_dataset: f64,
        snapshot_size_snapshot: f64,
        num_rows: usize,
    ) -> Self {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_dataset_records = (snapshot_size_dataset * num_rows as f64).floor() as usize;
        Self {
            capacity,
            max_dataset_records,
            snapshot_size_snapshot,
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch the snapshot of `node`, marking it most recently used.
    pub fn get(&mut self, node: NodeId) -> Option<&Snapshot> {
        let idx = *self.index.get(&node)?;
        self.move_to_tail(idx);
        self.slots[idx as usize].as_ref().map(|e| &e.snapshot)
    }

    /// Among stored snapshots of nodes `A <= node` (excluding `node`
    /// itself), the one closest to `node`: greatest total level, ties
    /// broken by smallest node id. Marks the winner most recently used.
    pub fn closest_ancestor(&mut self, lattice: &Lattice, node: NodeId) -> Option<&Snapshot> {
        let mut best: Option<(u32, NodeId)> = None;
        for &stored in self.index.keys() {
            if stored != node && lattice.precedes(stored, node) {
                let total = lattice.total_level(stored);
                let better = match best {
                    None => true,
                    Some((best_total, best_node)) => {
                        total > best_total || (total == best_total && stored < best_node)
                    }
                };
                if better {
                    best = Some((total, stored));
                }
            }
        }
        let (_, winner) = best?;
        self.get(winner)
    }

    /// Offer a snapshot for admission. Returns `true` if it was stored.
    ///
    /// Rejected when: the cache has zero capacity, the node is already
    /// cached, the snapshot exceeds the dataset-relative cap, or it is
    /// not small enough relative to some stored snapshot below it on the
    /// same path. Admission may evict the least-recently-used entry.
    pub fn put(&mut self, lattice: &Lattice, snapshot: Snapshot) -> bool {
        if self.capacity == 0 || self.index.contains_key(&snapshot.node()) {
            return false;
        }
        let records = snapshot.num_records();
        if records > self.max_dataset_records {
            return false;
        }
        #[allow(clippy::cast_precision_loss)]
        let fits_under = |ancestor_records: usize| {
            records as f64 <= self.snapshot_size_snapshot * ancestor_records as f64
        };
        for (&stored, &idx) in &self.index {
            if stored != snapshot.node() && lattice.precedes(stored, snapshot.node()) {
                let ancestor = self.slots[idx as usize]
                    .as_ref()
                    .expect("indexed slot is occupied");
                if !fits_under(ancestor.snapshot.num_records()) {
                    return false;
                }
            }
        }

        while self.index.len() >= self.capacity {
            self.evict_lru();
        }

        let node = snapshot.node();
        let idx = self.alloc(HistoryEntry {
            snapshot,
            prev: NIL,
            next: NIL,
        });
        self.push_tail(idx);
        self.index.insert(node, idx);
        true
    }

    /// Drop every stored snapshot.
    pub fn reset(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Change the capacity, evicting least-recently-used entries as
    /// needed.
    pub fn set_size(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.index.len() > self.capacity {
            self.evict_lru();
        }
    }

    // --- slab list internals ---

    fn alloc(&mut self, entry: HistoryEntry) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(entry);
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).expect("history slab overflow");
            self.slots.push(Some(entry));
            idx
        }
    }

    fn entry(&self, idx: u32) -> &HistoryEntry {
        self.slots[idx as usize].as_ref().expect("dangling slab index")
    }

    fn entry_mut(&mut self, idx: u32) -> &mut HistoryEntry {
        self.slots[idx as usize].as_mut().expect("dangling slab index")
    }

    fn unlink(&mut self, idx: u32) {
        let (prev, next) = {
            let e = self.entry(idx);
            (e.prev, e.next)
        };
        if prev == NIL {
            self.head = next;
        } else {
            self.entry_mut(prev).next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.entry_mut(next).prev = prev;
        }
    }

    fn push_tail(&mut self, idx: u32) {
        let old_tail = self.tail;
        {
            let e = self.entry_mut(idx);
            e.prev = old_tail;
            e.next = NIL;
        }
        if old_tail == NIL {
            self.head = idx;
        } else {
            self.entry_mut(old_tail).next = idx;
        }
        self.tail = idx;
    }

    fn move_to_tail(&mut self, idx: u32) {
        if self.tail == idx {
            return;
        }
        self.unlink(idx);
        self.push_tail(idx);
    }

    fn evict_lru(&mut self) {
        let idx = self.head;
        debug_assert_ne!(idx, NIL, "evict on empty history");
        self.unlink(idx);
        let entry = self.slots[idx as usize].take().expect("dangling slab index");
        self.index.remove(&entry.snapshot.node());
        self.free.push(idx);
    }
}

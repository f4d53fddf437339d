//! Compressed per-node class summaries.
//!
//! A snapshot is a flat `u32` buffer of fixed-stride records, one per
//! equivalence class, in class insertion order:
//!
//! ```text
//! [representative_row, count (, secondary_count)? (, dist_offset, dist_len)*]
//! ```
//!
//! Distribution payloads live in a shared side buffer of
//! `(value_id, count)` pairs sorted by value id; `dist_offset`/`dist_len`
//! are in pair units. The stride depends only on the configured
//! requirements, so every record of a run has the same length
//! (`snapshot_length`).
//!
//! A snapshot is sufficient to rebuild the groupify result of any
//! generalization of its node: representatives re-transform, counts and
//! distributions merge.

use shroud_models::{GroupifyResult, Histogram};
use shroud_types::{NodeId, Requirements, RowId};

/// One decoded snapshot record.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRecord {
    pub representative: RowId,
    pub count: u32,
    pub secondary_count: u32,
    /// `(offset, len)` in pairs into the distribution buffer, one per
    /// captured sensitive column.
    dist_start: usize,
    num_distributions: usize,
    record_start: usize,
}

/// Compressed groupify result of one lattice node.
#[derive(Debug, Clone)]
pub struct Snapshot {
    node: NodeId,
    stride: usize,
    has_secondary: bool,
    num_distributions: usize,
    records: Vec<u32>,
    distributions: Vec<u32>,
}

impl Snapshot {
    /// The per-record stride implied by a requirements mask.
    #[must_use]
    pub fn stride_for(requirements: Requirements, num_sensitive: usize) -> usize {
        let mut stride = 2;
        if requirements.contains(Requirements::SECONDARY_COUNTER) {
            stride += 1;
        }
        if requirements.contains(Requirements::DISTRIBUTION) {
            stride += 2 * num_sensitive;
        }
        stride
    }

    /// Capture a groupify result.
    #[must_use]
    pub fn capture(
        node: NodeId,
        result: &GroupifyResult,
        requirements: Requirements,
        num_sensitive: usize,
    ) -> Self {
        let has_secondary = requirements.contains(Requirements::SECONDARY_COUNTER);
        let num_distributions = if requirements.contains(Requirements::DISTRIBUTION) {
            num_sensitive
        } else {
            0
        };
        let stride = Self::stride_for(requirements, num_sensitive);

        let mut records = Vec::with_capacity(result.num_classes() * stride);
        let mut distributions = Vec::new();
        for class in result.classes() {
            records.push(class.representative());
            records.push(class.count());
            if has_secondary {
                records.push(class.secondary_count());
            }
            for histogram in &class.distributions()[..num_distributions] {
                let offset = distributions.len() / 2;
                for (value, count) in histogram.iter() {
                    distributions.push(value);
                    distributions.push(count);
                }
                let len = distributions.len() / 2 - offset;
                records.push(u32::try_from(offset).expect("distribution buffer fits u32"));
                records.push(u32::try_from(len).expect("distribution buffer fits u32"));
            }
        }

        Self {
            node,
            stride,
            has_secondary,
            num_distributions,
            records,
            distributions,
        }
    }

    /// The node this snapshot describes.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Record stride in `u32` slots (the `snapshot_length`).
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of records (classes).
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.records.len() / self.stride
    }

    /// Iterate records in class insertion order.
    pub fn records(&self) -> impl Iterator<Item = SnapshotRecord> + '_ {
        (0..self.num_records()).map(move |i| {
            let start = i * self.stride;
            let mut cursor = start + 2;
            let secondary_count = if self.has_secondary {
                cursor += 1;
                self.records[cursor - 1]
            } else {
                0
            };
            SnapshotRecord {
                representative: self.records[start],
                count: self.records[start + 1],
                secondary_count,
                dist_start: cursor,
                num_distributions: self.num_distributions,
                record_start: start,
            }
        })
    }

    /// Decode the distribution histograms of one record.
    #[must_use]
    pub fn decode_distributions(&self, record: &SnapshotRecord) -> Vec<Histogram> {
        debug_assert_eq!(record.record_start % self.stride, 0);
        let mut out = Vec::with_capacity(record.num_distributions);
        for d in 0..record.num_distributions {
            let offset = self.records[record.dist_start + 2 * d] as usize;
            let len = self.records[record.dist_start + 2 * d + 1] as usize;
            let mut histogram = Histogram::new();
            for pair in 0..len {
                let value = self.distributions[2 * (offset + pair)];
                let count = self.distributions[2 * (offset + pair) + 1];
                histogram.add(value, count);
            }
            out.push(histogram);
        }
        out
    }
}

//! The checking layer of the engine: partitions rows into equivalence
//! classes (groupify), caches compressed class summaries per lattice node
//! (snapshot history), and evaluates privacy models and quality metrics
//! per node (the checker).

pub mod checker;
pub mod groupify;
pub mod history;
pub mod snapshot;

pub use checker::{CheckerConfig, NodeCheck, NodeChecker};
pub use groupify::Groupify;
pub use history::SnapshotHistory;
pub use snapshot::Snapshot;

use shroud_models::GroupifyResult;
use xxhash_rust::xxh3::xxh3_64;

/// Order-insensitive fingerprint of a partition: the xxh3 hash of the
/// sorted `(key, count, secondary, distribution)` class encodings.
///
/// Two partitions of the same table are equal as class multisets iff
/// their fingerprints agree (modulo hash collisions); this is how
/// ancestor-derived and from-scratch groupify results are compared.
#[must_use]
pub fn result_fingerprint(result: &GroupifyResult) -> u64 {
    let mut encodings: Vec<Vec<u32>> = result
        .classes()
        .iter()
        .map(|class| {
            let mut enc = Vec::with_capacity(class.key().len() + 3);
            enc.extend_from_slice(class.key());
            enc.push(class.count());
            enc.push(class.secondary_count());
            for histogram in class.distributions() {
                for (value, count) in histogram.iter() {
                    enc.push(value);
                    enc.push(count);
                }
            }
            enc
        })
        .collect();
    encodings.sort_unstable();

    let mut bytes = Vec::with_capacity(encodings.iter().map(|e| 4 * e.len() + 4).sum());
    for enc in &encodings {
        bytes.extend_from_slice(&u32::try_from(enc.len()).expect("encoding fits u32").to_le_bytes());
        for &word in enc {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
    }
    xxh3_64(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shroud_models::ClassSummary;

    fn class(key: &[u32], rows: u32) -> ClassSummary {
        let mut c = ClassSummary::new(key.into(), 0, 0);
        for _ in 0..rows {
            c.record(false, &[]);
        }
        c
    }

    #[test]
    fn fingerprint_ignores_class_order() {
        let a = GroupifyResult::new(vec![class(&[1], 2), class(&[2], 3)], 5);
        let b = GroupifyResult::new(vec![class(&[2], 3), class(&[1], 2)], 5);
        assert_eq!(result_fingerprint(&a), result_fingerprint(&b));
    }

    #[test]
    fn fingerprint_distinguishes_counts() {
        let a = GroupifyResult::new(vec![class(&[1], 2), class(&[2], 3)], 5);
        let b = GroupifyResult::new(vec![class(&[1], 3), class(&[2], 2)], 5);
        assert_ne!(result_fingerprint(&a), result_fingerprint(&b));
    }
}

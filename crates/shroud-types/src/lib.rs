//! Core value types shared across the shroud anonymization engine.
//!
//! Everything here is a small, cheap, copyable value: dense ids, attribute
//! roles, the per-class requirement bitmask, and the quality newtype used
//! to rank transformations. Hot paths in the engine operate on raw `u32`
//! matrices; the newtypes live at the seams.

pub mod interrupt;
pub mod limits;

use std::fmt;

pub use interrupt::InterruptFlag;

/// Dense row index into the encoded table, `[0, N)`.
pub type RowId = u32;

/// Dense per-column value id. Id `0` is reserved for the suppression
/// sentinel in every column.
pub type ValueId = u32;

/// A generalization level within an attribute hierarchy, `[0, height)`.
pub type Level = u32;

/// A vector of per-attribute generalization levels. One entry per
/// quasi-identifier, in quasi-identifier order.
pub type LevelVector = Box<[Level]>;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Identity of a lattice node: the mixed-radix packing of its offset
/// vector. Dense in `[0, lattice.len())`, so it doubles as an arena index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The bottom node of any lattice.
    pub const ZERO: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw packed value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The packed value as an arena index.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AttributeRole
// ---------------------------------------------------------------------------

/// Role of a column in the input table.
///
/// `Identifying` columns are dropped before the engine sees the data;
/// the remaining roles select which sub-table a column is encoded into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
pub enum AttributeRole {
    /// May re-identify a record in combination with other quasi-identifiers;
    /// subject to generalization.
    #[default]
    QuasiIdentifying,
    /// Carries the sensitive payload; never generalized, feeds the
    /// per-class value distributions.
    Sensitive,
    /// Kept verbatim in the output.
    Insensitive,
    /// Directly identifying; removed from the table before encoding.
    Identifying,
}

impl AttributeRole {
    /// Bit used in [`RoleMask`].
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::QuasiIdentifying => 1,
            Self::Sensitive => 1 << 1,
            Self::Insensitive => 1 << 2,
            Self::Identifying => 1 << 3,
        }
    }
}

impl fmt::Display for AttributeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QuasiIdentifying => "quasi-identifying",
            Self::Sensitive => "sensitive",
            Self::Insensitive => "insensitive",
            Self::Identifying => "identifying",
        };
        f.write_str(s)
    }
}

/// Bitmask over [`AttributeRole`]s, used to select which roles have their
/// values replaced by the suppression string in suppressed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct RoleMask(u8);

impl RoleMask {
    /// No roles selected.
    pub const EMPTY: Self = Self(0);

    /// The default output policy: suppress quasi-identifiers only.
    pub const QI_ONLY: Self = Self(AttributeRole::QuasiIdentifying.bit());

    #[inline]
    #[must_use]
    pub const fn contains(self, role: AttributeRole) -> bool {
        self.0 & role.bit() != 0
    }

    #[inline]
    #[must_use]
    pub const fn with(self, role: AttributeRole) -> Self {
        Self(self.0 | role.bit())
    }

    #[inline]
    #[must_use]
    pub const fn without(self, role: AttributeRole) -> Self {
        Self(self.0 & !role.bit())
    }
}

impl Default for RoleMask {
    fn default() -> Self {
        Self::QI_ONLY
    }
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// What a privacy model needs the groupify pass to collect per class.
///
/// The union over all configured models decides the snapshot record layout,
/// so the checker branches on this mask rather than on model types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct Requirements(u8);

impl Requirements {
    /// Nothing beyond class membership.
    pub const NONE: Self = Self(0);
    /// A tuple counter per equivalence class.
    pub const COUNTER: Self = Self(0x1);
    /// A second counter (tuples of the research subset) per class.
    pub const SECONDARY_COUNTER: Self = Self(0x2);
    /// Sensitive-value distributions per class.
    pub const DISTRIBUTION: Self = Self(0x4);

    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Requirements {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Requirements {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Quality-loss score of a transformation. Lower is better.
///
/// Wraps a finite `f64` and provides the total order the search relies on;
/// constructors reject NaN so `Ord` is honest.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct Quality(f64);

impl Quality {
    /// The best possible score.
    pub const ZERO: Self = Self(0.0);

    /// Create a quality score.
    ///
    /// # Panics
    ///
    /// Panics if `value` is NaN. Metrics must never produce NaN; this is a
    /// programming error, not an input error.
    #[must_use]
    pub fn new(value: f64) -> Self {
        assert!(!value.is_nan(), "quality score must not be NaN");
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Eq for Quality {}

#[allow(clippy::derive_ord_xor_partial_ord)]
impl Ord for Quality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_roundtrip() {
        let id = NodeId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.as_usize(), 42);
        assert_eq!(id.to_string(), "42");
        assert!(NodeId::ZERO < id);
    }

    #[test]
    fn role_mask_default_is_qi_only() {
        let mask = RoleMask::default();
        assert!(mask.contains(AttributeRole::QuasiIdentifying));
        assert!(!mask.contains(AttributeRole::Sensitive));
        assert!(!mask.contains(AttributeRole::Insensitive));
    }

    #[test]
    fn role_mask_with_without() {
        let mask = RoleMask::EMPTY
            .with(AttributeRole::Sensitive)
            .with(AttributeRole::Insensitive);
        assert!(mask.contains(AttributeRole::Sensitive));
        assert!(mask.contains(AttributeRole::Insensitive));
        let mask = mask.without(AttributeRole::Sensitive);
        assert!(!mask.contains(AttributeRole::Sensitive));
        assert!(mask.contains(AttributeRole::Insensitive));
    }

    #[test]
    fn requirements_union_and_contains() {
        let r = Requirements::COUNTER | Requirements::DISTRIBUTION;
        assert!(r.contains(Requirements::COUNTER));
        assert!(r.contains(Requirements::DISTRIBUTION));
        assert!(!r.contains(Requirements::SECONDARY_COUNTER));
        assert!(Requirements::NONE.is_empty());
        assert!(!r.is_empty());
    }

    #[test]
    fn requirements_bitor_assign() {
        let mut r = Requirements::NONE;
        r |= Requirements::SECONDARY_COUNTER;
        assert!(r.contains(Requirements::SECONDARY_COUNTER));
    }

    #[test]
    fn quality_total_order() {
        let a = Quality::new(1.0);
        let b = Quality::new(2.0);
        assert!(a < b);
        assert_eq!(a.max(b), b);
        assert_eq!(Quality::ZERO.get(), 0.0);
    }

    #[test]
    #[should_panic(expected = "must not be NaN")]
    fn quality_rejects_nan() {
        let _ = Quality::new(f64::NAN);
    }

    #[test]
    fn role_display() {
        assert_eq!(
            AttributeRole::QuasiIdentifying.to_string(),
            "quasi-identifying"
        );
        assert_eq!(AttributeRole::Identifying.to_string(), "identifying");
    }
}

//! Primary error type for shroud operations.
//!
//! Structured variants for the failure classes the engine distinguishes:
//! configuration and input validation (surfaced before any work begins),
//! hierarchy validation, search outcomes, and cooperative cancellation.

use thiserror::Error;

/// Primary error type for the anonymization engine.
#[derive(Error, Debug)]
pub enum ShroudError {
    // === Validation ===
    /// The configuration is rejected before any work begins: numeric
    /// parameters out of range, no or too many quasi-identifiers, a model
    /// without its required sensitive attribute, conflicting research
    /// subsets, or duplicate single-instance models.
    #[error("invalid configuration: {detail}")]
    InvalidConfiguration { detail: String },

    /// A generalization hierarchy is malformed: non-monotone merges, a
    /// non-identity base level, or generalization bounds outside
    /// `[0, height - 1]`.
    #[error("invalid hierarchy for attribute '{attribute}': {detail}")]
    InvalidHierarchy { attribute: String, detail: String },

    /// The input table is unusable: unknown attribute name, locked data
    /// handle, or mismatched column counts.
    #[error("invalid input: {detail}")]
    InvalidInput { detail: String },

    // === Search outcomes ===
    /// The search completed without finding any anonymous transformation.
    /// `closest` lists the level vectors that came nearest to anonymity
    /// (smallest suppression overshoot), for diagnostics.
    #[error("no transformation satisfies the privacy models ({checked} checked)")]
    NoSolution {
        checked: usize,
        closest: Vec<Box<[u32]>>,
    },

    /// Cooperative cancellation was honored. Partial lattice state remains
    /// accessible for diagnostics.
    #[error("anonymization was interrupted")]
    Interrupted,

    /// A model combination the engine does not implement.
    #[error("unsupported: {detail}")]
    Unsupported { detail: String },
}

impl ShroudError {
    /// Create an `InvalidConfiguration` error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            detail: detail.into(),
        }
    }

    /// Create an `InvalidHierarchy` error.
    pub fn hierarchy(attribute: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidHierarchy {
            attribute: attribute.into(),
            detail: detail.into(),
        }
    }

    /// Create an `InvalidInput` error.
    pub fn input(detail: impl Into<String>) -> Self {
        Self::InvalidInput {
            detail: detail.into(),
        }
    }

    /// Create an `Unsupported` error.
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::Unsupported {
            detail: detail.into(),
        }
    }

    /// Whether this error was raised before the engine touched any state.
    /// Validation errors leave nothing behind; callers may retry with a
    /// corrected configuration.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. }
                | Self::InvalidHierarchy { .. }
                | Self::InvalidInput { .. }
                | Self::Unsupported { .. }
        )
    }
}

/// Result type alias using [`ShroudError`].
pub type Result<T> = std::result::Result<T, ShroudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = ShroudError::config("suppression limit 1.5 must be in [0, 1)");
        assert_eq!(
            err.to_string(),
            "invalid configuration: suppression limit 1.5 must be in [0, 1)"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn display_hierarchy() {
        let err = ShroudError::hierarchy("age", "values merged at level 1 split at level 2");
        assert_eq!(
            err.to_string(),
            "invalid hierarchy for attribute 'age': values merged at level 1 split at level 2"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn display_no_solution() {
        let err = ShroudError::NoSolution {
            checked: 12,
            closest: vec![vec![1, 0].into_boxed_slice()],
        };
        assert_eq!(
            err.to_string(),
            "no transformation satisfies the privacy models (12 checked)"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn interrupted_is_not_validation() {
        assert!(!ShroudError::Interrupted.is_validation());
    }

    #[test]
    fn convenience_constructors() {
        assert!(matches!(
            ShroudError::input("handle is locked"),
            ShroudError::InvalidInput { detail } if detail == "handle is locked"
        ));
        assert!(matches!(
            ShroudError::unsupported("multiple sensitive attributes"),
            ShroudError::Unsupported { .. }
        ));
    }
}

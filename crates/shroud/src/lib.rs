//! Optimal-generalization anonymization of tabular microdata.
//!
//! The engine searches the lattice of per-attribute generalization
//! levels for the transformation that satisfies every configured
//! privacy model at minimal quality loss, suppressing residual
//! offending records within the configured budget.
//!
//! ```
//! use shroud::{Anonymizer, InputTable, ShroudConfiguration};
//! use shroud::data::ColumnSpec;
//! use shroud::models::KAnonymity;
//! use shroud::types::AttributeRole;
//!
//! let mut input = InputTable::new(vec![ColumnSpec::new(
//!     "age",
//!     AttributeRole::QuasiIdentifying,
//! )])?;
//! for age in ["25", "27", "29", "31", "40"] {
//!     input.add_row(&[age])?;
//! }
//! input.add_hierarchy(
//!     "age",
//!     &[
//!         &["25", "<30"],
//!         &["27", "<30"],
//!         &["29", "<30"],
//!         &["31", ">=30"],
//!         &["40", ">=30"],
//!     ],
//! )?;
//!
//! let config = ShroudConfiguration::new().add_model(KAnonymity::new(2));
//! let result = Anonymizer::new().anonymize(&mut input, config)?;
//! assert_eq!(result.optimal_levels(), &[1]);
//! input.release();
//! # Ok::<(), shroud::ShroudError>(())
//! ```

pub mod config;
pub mod input;
pub mod result;

mod engine;

pub use config::ShroudConfiguration;
pub use engine::Anonymizer;
pub use input::InputTable;
pub use result::{AnonymizedResult, NodeAnnotation};
pub use shroud_error::{Result, ShroudError};

/// Re-export of the data layer consumed through the public API. The
/// id-level types serve callers whose tables are already encoded.
pub mod data {
    pub use shroud_data::{
        ColumnSpec, DataManager, Dictionary, EncodedTable, GeneralizationHierarchy, RowSet,
    };
}

/// Re-export of the built-in privacy models and quality metrics.
pub mod models {
    pub use shroud_models::{
        AecsMetric, ClassModel, DDisclosure, DPresence, DiscernibilityMetric,
        DistinctLDiversity, EqualDistanceTCloseness, HeightMetric, KAnonymity, QualityModel,
        RecursiveCLDiversity, SampleModel, SampleVerdict,
    };
}

/// Re-export of the shared value types.
pub mod types {
    pub use shroud_lattice::NodeState;
    pub use shroud_types::{AttributeRole, InterruptFlag, Level, Quality, RoleMask};
}

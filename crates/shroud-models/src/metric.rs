//! The built-in quality-loss metrics.
//!
//! Scores are losses: lower is better, and the search minimizes them.

use shroud_data::DataManager;
use shroud_error::Result;
use shroud_types::{Level, Quality};

use crate::{GroupifyResult, ModelContext, QualityModel};

// ---------------------------------------------------------------------------
// Height
// ---------------------------------------------------------------------------

/// Sum of generalization levels. Crude but cheap, fully monotone, and
/// bounded without a groupify pass, so it doubles as the canonical
/// lower-boundable metric.
#[derive(Debug, Clone, Default)]
pub struct HeightMetric;

impl HeightMetric {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QualityModel for HeightMetric {
    fn name(&self) -> String {
        "height".to_owned()
    }

    fn initialize(&mut self, _manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        Ok(())
    }

    fn evaluate(&self, _result: &GroupifyResult, levels: &[Level]) -> Quality {
        Quality::new(f64::from(levels.iter().sum::<Level>()))
    }

    fn lower_bound(&self, levels: &[Level]) -> Option<Quality> {
        Some(Quality::new(f64::from(levels.iter().sum::<Level>())))
    }

    fn is_monotonic(&self, _suppression_limit: f64) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Discernibility
// ---------------------------------------------------------------------------

/// Row-oriented discernibility (Bayardo & Agrawal): each record is
/// penalized by the size of its class, or by the table size when its
/// class is suppressed.
#[derive(Debug, Clone, Default)]
pub struct DiscernibilityMetric {
    rows: f64,
}

impl DiscernibilityMetric {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl QualityModel for DiscernibilityMetric {
    fn name(&self) -> String {
        "discernibility".to_owned()
    }

    fn initialize(&mut self, manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        self.rows = manager.num_rows() as f64;
        Ok(())
    }

    fn evaluate(&self, result: &GroupifyResult, _levels: &[Level]) -> Quality {
        let mut sum = 0.0;
        for class in result.classes() {
            let count = f64::from(class.count());
            if class.is_suppressed() {
                sum += count * self.rows;
            } else {
                sum += count * count;
            }
        }
        Quality::new(sum)
    }

    fn is_monotonic(&self, suppression_limit: f64) -> bool {
        // Suppression can lower the penalty of a coarser node below a
        // finer one, so monotonicity only holds without suppression.
        suppression_limit == 0.0
    }
}

// ---------------------------------------------------------------------------
// Average equivalence-class size
// ---------------------------------------------------------------------------

/// Average equivalence-class size: `N / number_of_classes`.
#[derive(Debug, Clone, Default)]
pub struct AecsMetric;

impl AecsMetric {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl QualityModel for AecsMetric {
    fn name(&self) -> String {
        "average-class-size".to_owned()
    }

    fn initialize(&mut self, _manager: &DataManager, _ctx: &ModelContext) -> Result<()> {
        Ok(())
    }

    fn evaluate(&self, result: &GroupifyResult, _levels: &[Level]) -> Quality {
        let classes = result.num_classes().max(1);
        Quality::new(f64::from(result.total_rows()) / classes as f64)
    }

    fn is_monotonic(&self, suppression_limit: f64) -> bool {
        suppression_limit == 0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

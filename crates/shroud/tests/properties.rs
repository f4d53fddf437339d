//! End-to-end properties over generated tables: determinism, the
//! suppression budget, and optimality under a monotone metric.

use proptest::prelude::*;
use shroud::data::ColumnSpec;
use shroud::models::{HeightMetric, KAnonymity};
use shroud::types::{AttributeRole, NodeState};
use shroud::{Anonymizer, InputTable, ShroudConfiguration, ShroudError};

#[derive(Debug, Clone)]
struct Scenario {
    rows: Vec<(usize, usize)>,
    groups_a: Vec<u8>,
    groups_b: Vec<u8>,
    k: u32,
    suppression: f64,
}

fn scenario() -> impl Strategy<Value = Scenario> {
    (2usize..=4, 2usize..=4)
        .prop_flat_map(|(domain_a, domain_b)| {
            (
                prop::collection::vec((0..domain_a, 0..domain_b), 2..=10),
                prop::collection::vec(0u8..2, domain_a),
                prop::collection::vec(0u8..2, domain_b),
                1u32..=3,
                prop::sample::select(vec![0.0, 0.3]),
            )
                .prop_map(|(rows, groups_a, groups_b, k, suppression)| Scenario {
                    rows,
                    groups_a,
                    groups_b,
                    k,
                    suppression,
                })
        })
}

fn build_input(s: &Scenario) -> InputTable {
    let mut input = InputTable::new(vec![
        ColumnSpec::new("a", AttributeRole::QuasiIdentifying),
        ColumnSpec::new("b", AttributeRole::QuasiIdentifying),
    ])
    .unwrap();
    let a_name = |v: usize| format!("a{v}");
    let b_name = |v: usize| format!("b{v}");
    for &(a, b) in &s.rows {
        input.add_row(&[&a_name(a), &b_name(b)]).unwrap();
    }
    let matrix = |names: Vec<String>, groups: &[u8], prefix: &str| -> Vec<Vec<String>> {
        names
            .iter()
            .enumerate()
            .map(|(v, name)| {
                vec![
                    name.clone(),
                    format!("{prefix}{}", groups[v]),
                    "*".to_owned(),
                ]
            })
            .collect()
    };
    let rows_a = matrix(
        (0..s.groups_a.len()).map(a_name).collect(),
        &s.groups_a,
        "ga",
    );
    let rows_b = matrix(
        (0..s.groups_b.len()).map(b_name).collect(),
        &s.groups_b,
        "gb",
    );
    fn as_slices(m: &[Vec<String>]) -> Vec<Vec<&str>> {
        m.iter()
            .map(|row| row.iter().map(String::as_str).collect())
            .collect()
    }
    let slices_a = as_slices(&rows_a);
    let refs_a: Vec<&[&str]> = slices_a.iter().map(Vec::as_slice).collect();
    input.add_hierarchy("a", &refs_a).unwrap();
    let slices_b = as_slices(&rows_b);
    let refs_b: Vec<&[&str]> = slices_b.iter().map(Vec::as_slice).collect();
    input.add_hierarchy("b", &refs_b).unwrap();
    input
}

fn run(s: &Scenario) -> Result<RunSummary, String> {
    let mut input = build_input(s);
    let config = ShroudConfiguration::with_suppression_limit(s.suppression)
        .add_model(KAnonymity::new(s.k))
        .quality_model(HeightMetric::new());
    match Anonymizer::new().anonymize(&mut input, config) {
        Ok(result) => Ok(RunSummary {
            levels: result.optimal_levels().to_vec(),
            quality: result.quality().get(),
            outliers: result.outlier_count(),
            rows: result.rows().to_vec(),
            checked_anonymous: result
                .annotated_lattice()
                .iter()
                .filter(|a| a.state == NodeState::CheckedAnonymous)
                .map(|a| (a.levels.clone(), a.quality.map(shroud::types::Quality::get)))
                .collect(),
        }),
        Err(ShroudError::NoSolution { .. }) => Err("no solution".to_owned()),
        // k may exceed the generated row count.
        Err(ShroudError::InvalidConfiguration { detail }) => Err(detail),
        Err(other) => panic!("unexpected failure: {other}"),
    }
}

#[derive(Debug, PartialEq)]
struct RunSummary {
    levels: Vec<u32>,
    quality: f64,
    outliers: u32,
    rows: Vec<Vec<String>>,
    checked_anonymous: Vec<(Vec<u32>, Option<f64>)>,
}

proptest! {
    /// Determinism: identical inputs and configuration produce identical
    /// results, including the annotated lattice.
    #[test]
    fn runs_are_reproducible(s in scenario()) {
        prop_assert_eq!(run(&s), run(&s));
    }

    /// The suppression budget is a hard cap on every anonymous result.
    #[test]
    fn outliers_never_exceed_the_budget(s in scenario()) {
        if let Ok(summary) = run(&s) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let budget = (s.suppression * s.rows.len() as f64).floor() as u32;
            prop_assert!(summary.outliers <= budget);
            prop_assert_eq!(summary.rows.len(), s.rows.len());
        }
    }

    /// Under a monotone metric the returned optimum is at least as good
    /// as every node the checker actually evaluated anonymous.
    #[test]
    fn optimum_beats_every_checked_anonymous_node(s in scenario()) {
        if let Ok(summary) = run(&s) {
            for (levels, quality) in &summary.checked_anonymous {
                let quality = quality.expect("checked nodes carry a quality");
                prop_assert!(
                    summary.quality <= quality,
                    "optimum {:?} ({}) beaten by {:?} ({})",
                    summary.levels, summary.quality, levels, quality
                );
            }
        }
    }

    /// The top node merges everything, so k <= N without suppression is
    /// always satisfiable.
    #[test]
    fn k_at_most_n_is_always_satisfiable(s in scenario()) {
        if s.k as usize <= s.rows.len() {
            prop_assert!(run(&s).is_ok());
        }
    }
}

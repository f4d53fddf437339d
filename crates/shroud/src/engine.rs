//! Run orchestration: validation, encoding, search, output assembly.

use std::collections::HashMap;
use std::time::Duration;

use shroud_check::{CheckerConfig, NodeChecker};
use shroud_data::DataManager;
use shroud_error::{Result, ShroudError};
use shroud_flash::{FlashStrategy, SearchOptions, search};
use shroud_lattice::Lattice;
use shroud_models::{
    ModelContext, combined_requirements, minimal_class_size, privacy_monotonicity,
};
use shroud_types::limits::{DEFAULT_ATTRIBUTE_WEIGHT, MAX_QUASI_IDENTIFIERS};
use shroud_types::{AttributeRole, InterruptFlag, ValueId};
use tracing::{info, info_span};

use crate::config::ShroudConfiguration;
use crate::input::InputTable;
use crate::result::{AnonymizedResult, NodeAnnotation};

/// Entry point for anonymization runs.
///
/// The anonymizer itself is stateless between runs; it carries only the
/// cancellation handle, which may be cloned to another thread and raised
/// to abort a run in progress.
#[derive(Debug, Default)]
pub struct Anonymizer {
    interrupt: InterruptFlag,
}

impl Anonymizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that cancels the running `anonymize` when raised.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Anonymize `input` under `config`.
    ///
    /// Validation happens before any work; a failed run unlocks the
    /// handle, a successful result keeps it locked until
    /// [`InputTable::release`].
    pub fn anonymize(
        &self,
        input: &mut InputTable,
        config: ShroudConfiguration,
    ) -> Result<AnonymizedResult> {
        if input.is_locked() {
            return Err(ShroudError::input(
                "this data handle is locked; release it first",
            ));
        }
        config.validate()?;
        Self::check_before_encoding(input, &config)?;

        self.interrupt.clear();
        input.lock();
        let outcome = self.run(input, config);
        if outcome.is_err() {
            input.unlock();
        }
        outcome
    }

    /// Pure-read validation against the un-encoded input.
    fn check_before_encoding(input: &InputTable, config: &ShroudConfiguration) -> Result<()> {
        if input.num_rows() == 0 {
            return Err(ShroudError::input("the input table has no rows"));
        }
        let qi_count = input
            .specs()
            .iter()
            .filter(|s| s.role == AttributeRole::QuasiIdentifying)
            .count();
        if qi_count == 0 {
            return Err(ShroudError::config(
                "at least one quasi-identifier must be specified",
            ));
        }
        if qi_count > MAX_QUASI_IDENTIFIERS {
            return Err(ShroudError::config(format!(
                "the curse of dimensionality strikes: too many quasi-identifiers ({qi_count})"
            )));
        }

        let sensitive: Vec<&str> = input
            .specs()
            .iter()
            .filter(|s| s.role == AttributeRole::Sensitive)
            .map(|s| s.name.as_str())
            .collect();
        let mut bound: Vec<&str> = Vec::new();
        for model in &config.class_models {
            if let Some(attribute) = model.sensitive_attribute() {
                if sensitive.is_empty() {
                    return Err(ShroudError::config(format!(
                        "model '{}' needs a sensitive attribute, but none is defined",
                        model.name()
                    )));
                }
                if !bound.contains(&attribute) {
                    bound.push(attribute);
                }
            }
        }
        if bound.len() > 1 {
            return Err(ShroudError::unsupported(
                "models over multiple sensitive attributes are not supported",
            ));
        }
        for attribute in &sensitive {
            if !bound.contains(attribute) {
                return Err(ShroudError::config(format!(
                    "no model is defined for sensitive attribute '{attribute}'"
                )));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn run(
        &self,
        input: &mut InputTable,
        config: ShroudConfiguration,
    ) -> Result<AnonymizedResult> {
        let _span = info_span!("anonymize", rows = input.num_rows()).entered();

        let (table, hierarchies) = input.encode()?;
        let subset = config.subset();
        let manager = DataManager::new(
            input.dictionary().clone(),
            &table,
            input.specs(),
            hierarchies,
            subset,
        )?;

        let ShroudConfiguration {
            mut class_models,
            mut sample_models,
            mut quality_model,
            suppression_limit,
            suppression_string,
            suppressed_attribute_types,
            suppression_always_enabled,
            practical_monotonicity: practical,
            attribute_weights,
            history_size,
            snapshot_size_dataset,
            snapshot_size_snapshot,
            heuristic_search_enabled,
            heuristic_search_threshold,
            heuristic_search_time_limit_ms,
        } = config;

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let absolute_max_outliers =
            (suppression_limit * manager.num_rows() as f64).floor() as u32;
        let ctx = ModelContext {
            suppression_limit,
            absolute_max_outliers,
        };
        for model in &mut class_models {
            model.initialize(&manager, &ctx)?;
        }
        for model in &mut sample_models {
            model.initialize(&manager, &ctx)?;
        }
        quality_model.initialize(&manager, &ctx)?;

        let monotonicity =
            privacy_monotonicity(&class_models, &sample_models, suppression_limit, practical);
        let metric_monotonic = practical || quality_model.is_monotonic(suppression_limit);
        let weights: Vec<f64> = manager
            .qi_names()
            .iter()
            .map(|name| {
                attribute_weights
                    .get(name)
                    .copied()
                    .unwrap_or(DEFAULT_ATTRIBUTE_WEIGHT)
            })
            .collect();

        let checker_config = CheckerConfig {
            requirements: combined_requirements(&class_models, &sample_models),
            minimal_class_size: minimal_class_size(&class_models),
            class_models,
            sample_models,
            metric: quality_model,
            suppression_limit,
            absolute_max_outliers,
            suppression_always_enabled,
            history_size,
            snapshot_size_dataset,
            snapshot_size_snapshot,
        };

        let mut lattice = Lattice::new(manager.min_levels(), manager.max_levels());
        let mut checker = NodeChecker::new(&manager, checker_config, self.interrupt.clone());
        let strategy = FlashStrategy::new(&weights);
        let options = SearchOptions {
            monotonicity,
            metric_monotonic,
            heuristic_enabled: heuristic_search_enabled,
            heuristic_threshold: heuristic_search_threshold,
            heuristic_time_limit: Duration::from_millis(heuristic_search_time_limit_ms),
            interrupt: self.interrupt.clone(),
        };

        let outcome = search(&mut lattice, &mut checker, &strategy, &options)?;

        let Some(optimum) = outcome.optimum else {
            checker.history_mut().reset();
            return Err(ShroudError::NoSolution {
                checked: outcome.checked,
                closest: outcome
                    .closest
                    .iter()
                    .map(|&id| lattice.levels(id))
                    .collect(),
            });
        };

        // Re-derive the optimum's partition for the output suppression
        // marks, then retire the history for good.
        let final_check = checker.check(&lattice, optimum)?;
        checker.history_mut().reset();

        let levels = lattice.levels(optimum);
        info!(
            target: "shroud.engine",
            levels = ?levels,
            quality = final_check.quality.get(),
            outliers = final_check.outlier_count,
            checked = outcome.checked,
            "optimum selected"
        );

        // Which generalized tuples belong to suppressed classes.
        let suppressed_keys: HashMap<&[ValueId], bool> = final_check
            .result
            .classes()
            .iter()
            .map(|class| (class.key(), class.is_suppressed()))
            .collect();

        let maps: Vec<&[ValueId]> = levels
            .iter()
            .enumerate()
            .map(|(qi, &l)| manager.hierarchy(qi).map(l))
            .collect();

        // Output columns keep the input order, identifying columns
        // dropped. Track each column's index inside its sub-table.
        let mut columns: Vec<(AttributeRole, usize)> = Vec::new();
        let mut header = Vec::new();
        let (mut qi_i, mut se_i, mut is_i) = (0usize, 0usize, 0usize);
        for spec in input.specs() {
            match spec.role {
                AttributeRole::QuasiIdentifying => {
                    columns.push((spec.role, qi_i));
                    qi_i += 1;
                }
                AttributeRole::Sensitive => {
                    columns.push((spec.role, se_i));
                    se_i += 1;
                }
                AttributeRole::Insensitive => {
                    columns.push((spec.role, is_i));
                    is_i += 1;
                }
                AttributeRole::Identifying => continue,
            }
            header.push(spec.name.clone());
        }

        let mut rows = Vec::with_capacity(manager.num_rows());
        for r in 0..manager.num_rows() as u32 {
            let key: Box<[ValueId]> = maps
                .iter()
                .zip(manager.qi_table().row(r))
                .map(|(map, &v)| map[v as usize])
                .collect();
            let suppressed = suppressed_keys.get(&*key).copied().unwrap_or(false);

            let mut row = Vec::with_capacity(columns.len());
            for &(role, idx) in &columns {
                if suppressed && suppressed_attribute_types.contains(role) {
                    row.push(suppression_string.clone());
                    continue;
                }
                let value = match role {
                    AttributeRole::QuasiIdentifying => manager.decode_qi(idx, key[idx]),
                    AttributeRole::Sensitive => {
                        manager.decode_se(idx, manager.se_table().value(r, idx))
                    }
                    AttributeRole::Insensitive => {
                        manager.decode_is(idx, manager.is_table().value(r, idx))
                    }
                    AttributeRole::Identifying => unreachable!("dropped above"),
                };
                row.push(value.expect("dictionary covers every encoded id").to_owned());
            }
            rows.push(row);
        }

        let annotations: Vec<NodeAnnotation> = lattice
            .visited_nodes()
            .into_iter()
            .map(|id| {
                let info = lattice.info(id);
                NodeAnnotation {
                    levels: lattice.levels(id).to_vec(),
                    state: info.state,
                    quality: info.quality,
                    outliers: info.outliers,
                }
            })
            .collect();

        Ok(AnonymizedResult {
            header,
            rows,
            qi_names: manager.qi_names().to_vec(),
            optimal_levels: levels.to_vec(),
            quality: final_check.quality,
            outlier_count: final_check.outlier_count,
            checked: outcome.checked,
            total_nodes: lattice.len(),
            exhaustive: outcome.exhaustive,
            annotations,
        })
    }
}

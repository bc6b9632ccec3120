//! Pipeline orchestration: score → aggregate → promote → warehouse.
//!
//! The scoring and sector steps read their inputs from the raw layer and
//! write their outputs back to it, so the promotion step treats derived
//! tables exactly like collected ones. Per-table failures are recorded in the
//! report and never stop sibling tables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use scorelab_core::domain::attach_yields;
use scorelab_core::table::{
    distress_events_from_frame, dividend_yields_from_frame, indicators_from_frame,
    scores_from_frame, scores_to_frame, sectors_to_frame, valuations_to_frame,
};
use scorelab_core::{
    aggregate, join_scores, score_all, value, IndicatorRecord, SectorMap, TableError,
    ValuationRecord,
};

use crate::config::PipelineConfig;
use crate::layer::{Layer, LayerError, LayerStore};
use crate::promote::{promote_table, TableState};
use crate::report::{Outcome, PipelineReport, StepReport, REPORT_FILE_NAME};
use crate::warehouse::{Warehouse, WarehouseError};

pub const STEP_SCORE: &str = "score";
pub const STEP_AGGREGATE: &str = "aggregate";
pub const STEP_PROMOTE: &str = "promote";
pub const STEP_WAREHOUSE: &str = "warehouse";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input table '{table}' not found in raw layer")]
    MissingInput { table: String },

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

pub struct Pipeline {
    config: PipelineConfig,
    raw: LayerStore,
    trusted: LayerStore,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let raw = LayerStore::new(Layer::Raw, &config.layers.raw);
        let trusted = LayerStore::new(Layer::Trusted, &config.layers.trusted);
        Self {
            config,
            raw,
            trusted,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn raw(&self) -> &LayerStore {
        &self.raw
    }

    pub fn trusted(&self) -> &LayerStore {
        &self.trusted
    }

    /// Where the run report is saved: next to the warehouse file.
    pub fn report_path(&self) -> PathBuf {
        self.config
            .layers
            .warehouse
            .parent()
            .map(|dir| dir.join(REPORT_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(REPORT_FILE_NAME))
    }

    /// A fresh report stamped with the current time and partition.
    pub fn new_report(&self) -> PipelineReport {
        PipelineReport::new(Local::now().naive_local(), self.config.current_partition())
    }

    /// Run every step and return the report. The report is not saved.
    pub fn run(&self) -> PipelineReport {
        let mut report = self.new_report();
        info!(
            partition = report.current_partition,
            raw = %self.raw.root().display(),
            trusted = %self.trusted.root().display(),
            "pipeline started"
        );

        self.run_step(&mut report, STEP_SCORE, |_| self.score_assets());
        let scored = report.steps.last().is_some_and(|s| s.outcome.is_done());
        if scored {
            self.run_step(&mut report, STEP_AGGREGATE, |_| self.aggregate_sectors());
        } else {
            report.steps.push(StepReport {
                step: STEP_AGGREGATE.into(),
                elapsed_ms: 0,
                outcome: Outcome::Skipped {
                    reason: "score step did not complete".into(),
                },
            });
        }
        self.run_step(&mut report, STEP_PROMOTE, |r| self.promote_tables(r));
        self.run_step(&mut report, STEP_WAREHOUSE, |r| self.load_warehouse(r));

        if report.is_success() {
            info!("pipeline finished");
        } else {
            error!(failed = ?report.failed_tables(), "pipeline finished with failures");
        }
        report
    }

    /// Save a report to [`Pipeline::report_path`].
    pub fn save_report(&self, report: &PipelineReport) -> anyhow::Result<PathBuf> {
        let path = self.report_path();
        report.save(&path)?;
        Ok(path)
    }

    fn run_step(
        &self,
        report: &mut PipelineReport,
        step: &str,
        f: impl FnOnce(&mut PipelineReport) -> Result<usize, PipelineError>,
    ) {
        let start = Instant::now();
        let outcome = match f(report) {
            Ok(rows) => Outcome::Done { rows },
            Err(e @ PipelineError::MissingInput { .. }) => {
                warn!(step, "{e}, skipping");
                Outcome::Skipped {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!(step, error = %e, "step failed");
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        report.steps.push(StepReport {
            step: step.to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            outcome,
        });
    }

    /// Score every asset in the raw indicator table; write `scores` and
    /// `valuation` to raw. Returns the number of scored assets.
    pub fn score_assets(&self) -> Result<usize, PipelineError> {
        let tables = &self.config.tables;
        let indicators = self.read_indicators()?;

        let scores = score_all(&indicators);
        let valuations: Vec<ValuationRecord> = indicators.iter().map(value).collect();

        self.raw.write(&tables.scores, &mut scores_to_frame(&scores)?)?;
        self.raw
            .write(&tables.valuation, &mut valuations_to_frame(&valuations)?)?;

        info!(assets = scores.len(), "scored assets");
        Ok(scores.len())
    }

    /// Aggregate scores into the sector ranking; write `sector_scores` to raw.
    /// Returns the number of sub-sectors.
    pub fn aggregate_sectors(&self) -> Result<usize, PipelineError> {
        let tables = &self.config.tables;
        let indicators = self.read_indicators()?;
        let scores_df = self
            .raw
            .read_optional(&tables.scores)?
            .ok_or_else(|| PipelineError::MissingInput {
                table: tables.scores.clone(),
            })?;
        let scores = scores_from_frame(&scores_df)?;

        let events = match self.raw.read_optional(&tables.distress_events)? {
            Some(df) => distress_events_from_frame(&df)?,
            None => {
                debug!(table = %tables.distress_events, "no distress events, penalty disabled");
                Vec::new()
            }
        };

        let assets = join_scores(&indicators, &scores);
        let sector_map = SectorMap::from_indicators(&indicators);
        let records = aggregate(&assets, &sector_map, &events, &self.config.thresholds());

        self.raw
            .write(&tables.sector_scores, &mut sectors_to_frame(&records)?)?;

        info!(
            subsectors = records.len(),
            events = events.len(),
            "aggregated sectors"
        );
        Ok(records.len())
    }

    /// Promote every expected table plus anything else present in raw.
    /// Returns the total rows written to trusted.
    ///
    /// Outputs of a score or aggregate step recorded in `report` without
    /// completing are not promoted: the raw copy is left over from an
    /// earlier run.
    pub fn promote_tables(&self, report: &mut PipelineReport) -> Result<usize, PipelineError> {
        let mut tables = self.config.expected_tables();
        for table in self.raw.tables()? {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        let withheld = self.withheld_outputs(report);

        let partition = report.current_partition;
        let loaded_at = report.started_at;
        let mut total = 0;
        for table in &tables {
            let strategy = self.config.strategy_for(table);
            let entry = report.table_mut(table, &strategy);

            if let Some(reason) = withheld.get(table.as_str()) {
                warn!(table = %table, "{reason}, skipping");
                entry.trusted = Some(Outcome::Skipped {
                    reason: reason.clone(),
                });
                continue;
            }
            if !self.raw.contains(table) {
                warn!(table = %table, "table not found in raw layer, skipping");
                entry.trusted = Some(Outcome::Skipped {
                    reason: "not found in raw layer".into(),
                });
                continue;
            }
            entry.state = Some(TableState::RawReady);

            match promote_table(&self.raw, &self.trusted, table, &strategy, partition, loaded_at) {
                Ok(promotion) => {
                    total += promotion.rows;
                    entry.state = Some(TableState::TrustedMerged);
                    entry.trusted = Some(Outcome::Done {
                        rows: promotion.rows,
                    });
                }
                Err(e) => {
                    error!(table = %table, error = %e, "promotion failed");
                    entry.trusted = Some(Outcome::Failed {
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(total)
    }

    /// Load every trusted table into the warehouse, fully replacing each.
    /// Returns the total rows loaded.
    pub fn load_warehouse(&self, report: &mut PipelineReport) -> Result<usize, PipelineError> {
        let mut warehouse = Warehouse::open(&self.config.layers.warehouse)?;
        let mut total = 0;

        for table in self.trusted.tables()? {
            let strategy = self.config.strategy_for(&table);
            let loaded = self
                .trusted
                .read(&table)
                .map_err(PipelineError::from)
                .and_then(|df| Ok(warehouse.load_table(&table, &df)?));

            let entry = report.table_mut(&table, &strategy);
            match loaded {
                Ok(rows) => {
                    total += rows;
                    entry.state = Some(TableState::WarehouseLoaded);
                    entry.warehouse = Some(Outcome::Done { rows });
                }
                Err(e) => {
                    error!(table = %table, error = %e, "warehouse load failed");
                    entry.warehouse = Some(Outcome::Failed {
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(total)
    }

    /// Derived tables whose producing step ran in this report but did not finish.
    fn withheld_outputs(&self, report: &PipelineReport) -> HashMap<String, String> {
        let tables = &self.config.tables;
        let mut withheld = HashMap::new();
        for step in report.steps.iter().filter(|s| !s.outcome.is_done()) {
            let outputs = match step.step.as_str() {
                STEP_SCORE => vec![&tables.scores, &tables.valuation],
                STEP_AGGREGATE => vec![&tables.sector_scores],
                _ => continue,
            };
            for table in outputs {
                withheld.insert(
                    table.clone(),
                    format!("{} step did not complete this run", step.step),
                );
            }
        }
        withheld
    }

    fn read_indicators(&self) -> Result<Vec<IndicatorRecord>, PipelineError> {
        let tables = &self.config.tables;
        let df = self
            .raw
            .read_optional(&tables.indicators)?
            .ok_or_else(|| PipelineError::MissingInput {
                table: tables.indicators.clone(),
            })?;
        let mut rows = indicators_from_frame(&df, &self.config.classifier())?;

        match self.raw.read_optional(&tables.dividend_yield)? {
            Some(dy) => attach_yields(&mut rows, &dividend_yields_from_frame(&dy)?),
            None => debug!(table = %tables.dividend_yield, "no dividend-yield table"),
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn report_lives_next_to_warehouse() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::rooted_at(dir.path()));
        assert_eq!(
            pipeline.report_path(),
            dir.path().join("warehouse").join(REPORT_FILE_NAME)
        );
    }

    #[test]
    fn empty_raw_layer_skips_without_failing() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::rooted_at(dir.path()));
        let report = pipeline.run();

        assert!(report.is_success());
        let score = report.steps.iter().find(|s| s.step == STEP_SCORE).unwrap();
        assert!(matches!(score.outcome, Outcome::Skipped { .. }));
        assert!(report
            .tables
            .iter()
            .all(|t| matches!(t.trusted, Some(Outcome::Skipped { .. }))));
    }
}

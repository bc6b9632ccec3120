//! Per-run report: what each step and each table did.
//!
//! The report is written as `pipeline_report.json` next to the warehouse and
//! printed as a summary by the CLI. A run succeeds only if no step and no
//! table failed; skipped items are warnings, not failures.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::promote::{LoadStrategy, TableState};

pub const REPORT_FILE_NAME: &str = "pipeline_report.json";

/// What happened to one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Done { rows: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done { .. })
    }

    fn label(&self) -> String {
        match self {
            Outcome::Done { rows } => format!("ok ({rows} rows)"),
            Outcome::Skipped { reason } => format!("skipped: {reason}"),
            Outcome::Failed { error } => format!("FAILED: {error}"),
        }
    }
}

/// One pipeline stage (score, aggregate, promote, warehouse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: String,
    pub elapsed_ms: u64,
    pub outcome: Outcome,
}

/// Journey of one table through the layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub strategy: LoadStrategy,
    /// Furthest layer reached, `None` if the table never reached raw.
    pub state: Option<TableState>,
    pub trusted: Option<Outcome>,
    pub warehouse: Option<Outcome>,
}

impl TableReport {
    pub fn new(table: impl Into<String>, strategy: LoadStrategy) -> Self {
        Self {
            table: table.into(),
            strategy,
            state: None,
            trusted: None,
            warehouse: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.trusted.as_ref().is_some_and(Outcome::is_failed)
            || self.warehouse.as_ref().is_some_and(Outcome::is_failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub started_at: NaiveDateTime,
    pub current_partition: i32,
    pub steps: Vec<StepReport>,
    pub tables: Vec<TableReport>,
}

impl PipelineReport {
    pub fn new(started_at: NaiveDateTime, current_partition: i32) -> Self {
        Self {
            started_at,
            current_partition,
            steps: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_failed())
            && !self.tables.iter().any(TableReport::is_failed)
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub(crate) fn table_mut(&mut self, name: &str, strategy: &LoadStrategy) -> &mut TableReport {
        let idx = match self.tables.iter().position(|t| t.table == name) {
            Some(idx) => idx,
            None => {
                self.tables.push(TableReport::new(name, strategy.clone()));
                self.tables.len() - 1
            }
        };
        &mut self.tables[idx]
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.is_failed())
            .map(|t| t.table.as_str())
            .collect()
    }

    /// Human-readable summary, one line per step and table.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Run started {} (partition {})",
            self.started_at, self.current_partition
        )];
        for step in &self.steps {
            lines.push(format!(
                "  step {:<10} {:>6} ms  {}",
                step.step,
                step.elapsed_ms,
                step.outcome.label()
            ));
        }
        for table in &self.tables {
            let show = |o: &Option<Outcome>| o.as_ref().map_or("-".to_string(), Outcome::label);
            lines.push(format!(
                "  table {:<24} {:<20} trusted: {}  warehouse: {}",
                table.table,
                table.strategy.to_string(),
                show(&table.trusted),
                show(&table.warehouse)
            ));
        }
        lines.push(if self.is_success() {
            "Result: success".to_string()
        } else {
            format!("Result: FAILED ({})", self.failed_tables().join(", "))
        });
        lines
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize pipeline report")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write report {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report {}", path.display()))?;
        serde_json::from_str(&json).context("failed to parse pipeline report")
    }
}

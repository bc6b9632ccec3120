//! Pipeline configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! The config is built once per run and passed to each component.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scorelab_core::{SectorClassifier, SectorThresholds};

use crate::promote::LoadStrategy;

/// Errors loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub layers: LayerPaths,
    pub tables: TableNames,
    pub scoring: ScoringConfig,
    pub sector: SectorConfig,
    /// Tables that accumulate history by partition. Everything else is full-replace.
    pub incremental: Vec<IncrementalTable>,
    /// Override for the current partition (year). Defaults to the current calendar year.
    pub current_partition: Option<i32>,
}

/// Locations of the three storage layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayerPaths {
    pub raw: PathBuf,
    pub trusted: PathBuf,
    /// SQLite file holding one table per trusted table.
    pub warehouse: PathBuf,
}

impl Default for LayerPaths {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("data/raw"),
            trusted: PathBuf::from("data/trusted"),
            warehouse: PathBuf::from("data/warehouse/scorelab.db"),
        }
    }
}

/// Table names (file base names) the core reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableNames {
    pub indicators: String,
    pub dividend_yield: String,
    pub distress_events: String,
    pub valuation: String,
    pub scores: String,
    pub sector_scores: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            indicators: "indicadores".into(),
            dividend_yield: "dividend_yield".into(),
            distress_events: "recuperacao_judicial".into(),
            valuation: "valuation".into(),
            scores: "scores".into(),
            sector_scores: "sector_scores".into(),
        }
    }
}

impl TableNames {
    pub fn all(&self) -> [&str; 6] {
        [
            &self.indicators,
            &self.dividend_yield,
            &self.distress_events,
            &self.valuation,
            &self.scores,
            &self.sector_scores,
        ]
    }
}

/// Scoring-engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Case-insensitive substrings marking a sector label as financial.
    pub financial_keywords: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            financial_keywords: vec!["financ".into()],
        }
    }
}

/// Sector-aggregator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectorConfig {
    pub high_quality_threshold: f64,
    pub low_quality_threshold: f64,
}

impl Default for SectorConfig {
    fn default() -> Self {
        let t = SectorThresholds::default();
        Self {
            high_quality_threshold: t.high_quality,
            low_quality_threshold: t.low_quality,
        }
    }
}

/// A table merged incrementally on a time partition key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncrementalTable {
    pub table: String,
    pub partition_key: String,
}

impl PipelineConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// A default config rooted at `base` (`base/raw`, `base/trusted`,
    /// `base/warehouse/scorelab.db`).
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            layers: LayerPaths {
                raw: base.join("raw"),
                trusted: base.join("trusted"),
                warehouse: base.join("warehouse").join("scorelab.db"),
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layers.raw == self.layers.trusted {
            return Err(ConfigError::Invalid(
                "raw and trusted layers must be different directories".into(),
            ));
        }
        if self.sector.low_quality_threshold > self.sector.high_quality_threshold {
            return Err(ConfigError::Invalid(format!(
                "low_quality_threshold ({}) exceeds high_quality_threshold ({})",
                self.sector.low_quality_threshold, self.sector.high_quality_threshold
            )));
        }
        let mut seen = HashSet::new();
        for inc in &self.incremental {
            if inc.table.trim().is_empty() || inc.partition_key.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "incremental tables need both `table` and `partition_key`".into(),
                ));
            }
            if !seen.insert(inc.table.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "incremental table '{}' listed twice",
                    inc.table
                )));
            }
        }
        Ok(())
    }

    /// Load strategy for a table: incremental if configured, else full replace.
    pub fn strategy_for(&self, table: &str) -> LoadStrategy {
        self.incremental
            .iter()
            .find(|inc| inc.table == table)
            .map(|inc| LoadStrategy::Incremental {
                partition_key: inc.partition_key.clone(),
            })
            .unwrap_or(LoadStrategy::FullReplace)
    }

    /// The partition replaced by this run.
    pub fn current_partition(&self) -> i32 {
        self.current_partition
            .unwrap_or_else(|| chrono::Local::now().year())
    }

    pub fn classifier(&self) -> SectorClassifier {
        SectorClassifier::new(&self.scoring.financial_keywords)
    }

    pub fn thresholds(&self) -> SectorThresholds {
        SectorThresholds {
            high_quality: self.sector.high_quality_threshold,
            low_quality: self.sector.low_quality_threshold,
        }
    }

    /// Every table the pipeline expects to promote, in promotion order.
    pub fn expected_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.all().iter().map(|s| s.to_string()).collect();
        for inc in &self.incremental {
            if !names.contains(&inc.table) {
                names.push(inc.table.clone());
            }
        }
        names
    }
}

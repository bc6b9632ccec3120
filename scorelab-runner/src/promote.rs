//! Raw → trusted promotion.
//!
//! Each table is promoted with one of two strategies:
//! - **Full replace**: the raw table overwrites the trusted one and every row
//!   is stamped with the load time in `data_carga`.
//! - **Incremental**: the current partition is replaced from raw while every
//!   older partition already in trusted is kept. No timestamp is added, so
//!   re-running the same load leaves the trusted file unchanged.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::layer::{file_hash, LayerError, LayerStore, TableMeta};
use crate::partition::{distinct_partitions, merge_partitions};

/// Column added to full-replace tables on promotion.
pub const LOAD_TIMESTAMP_COLUMN: &str = "data_carga";

const LOAD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a table moves from raw to trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadStrategy {
    FullReplace,
    Incremental { partition_key: String },
}

impl LoadStrategy {
    pub fn is_incremental(&self) -> bool {
        matches!(self, LoadStrategy::Incremental { .. })
    }
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStrategy::FullReplace => write!(f, "full_replace"),
            LoadStrategy::Incremental { partition_key } => {
                write!(f, "incremental({partition_key})")
            }
        }
    }
}

/// Furthest layer a table reached in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    RawReady,
    TrustedMerged,
    WarehouseLoaded,
}

/// Result of promoting one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub table: String,
    pub strategy: LoadStrategy,
    pub rows: usize,
    pub partitions: Vec<i32>,
    pub path: PathBuf,
}

/// Promote `table` from `raw` into `trusted`.
///
/// Returns [`LayerError::NotFound`] when the raw layer has no such table; the
/// trusted copy is left untouched in that case.
pub fn promote_table(
    raw: &LayerStore,
    trusted: &LayerStore,
    table: &str,
    strategy: &LoadStrategy,
    current_partition: i32,
    loaded_at: NaiveDateTime,
) -> Result<Promotion, LayerError> {
    let fresh = raw.read(table)?;
    debug!(table, rows = fresh.height(), %strategy, "read raw table");

    let (mut promoted, partitions) = match strategy {
        LoadStrategy::FullReplace => (stamp_load_time(fresh, loaded_at)?, Vec::new()),
        LoadStrategy::Incremental { partition_key } => {
            let existing = trusted.read_optional(table)?;
            let merged = merge_partitions(existing.as_ref(), &fresh, partition_key, current_partition)?;
            let partitions = distinct_partitions(&merged, partition_key)?;
            (merged, partitions)
        }
    };

    let path = trusted.write(table, &mut promoted)?;
    let meta = TableMeta {
        table: table.to_string(),
        strategy: strategy.clone(),
        rows: promoted.height(),
        partitions: partitions.clone(),
        data_hash: file_hash(&path)?,
        promoted_at: loaded_at,
    };
    trusted.write_meta(&meta)?;

    info!(
        table,
        rows = promoted.height(),
        partitions = ?partitions,
        %strategy,
        "promoted to trusted"
    );

    Ok(Promotion {
        table: table.to_string(),
        strategy: strategy.clone(),
        rows: promoted.height(),
        partitions,
        path,
    })
}

fn stamp_load_time(mut df: DataFrame, loaded_at: NaiveDateTime) -> PolarsResult<DataFrame> {
    let stamp = loaded_at.format(LOAD_TIMESTAMP_FORMAT).to_string();
    let column = Column::new(LOAD_TIMESTAMP_COLUMN.into(), vec![stamp; df.height()]);
    df.with_column(column)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> (LayerStore, LayerStore) {
        (
            LayerStore::new(Layer::Raw, dir.path().join("raw")),
            LayerStore::new(Layer::Trusted, dir.path().join("trusted")),
        )
    }

    fn loaded_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn full_replace_stamps_every_row() {
        let dir = TempDir::new().unwrap();
        let (raw, trusted) = stores(&dir);
        let mut df = DataFrame::new(vec![Column::new("ticker".into(), vec!["PETR4", "VALE3"])]).unwrap();
        raw.write("indicadores", &mut df).unwrap();

        let promotion = promote_table(
            &raw,
            &trusted,
            "indicadores",
            &LoadStrategy::FullReplace,
            2024,
            loaded_at(),
        )
        .unwrap();
        assert_eq!(promotion.rows, 2);

        let out = trusted.read("indicadores").unwrap();
        let stamps: Vec<Option<&str>> = out
            .column(LOAD_TIMESTAMP_COLUMN)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(stamps, vec![Some("2024-05-17 09:30:00"); 2]);

        let meta = trusted.read_meta("indicadores").unwrap();
        assert_eq!(meta.rows, 2);
        assert_eq!(meta.strategy, LoadStrategy::FullReplace);
        assert_eq!(meta.data_hash, file_hash(&promotion.path).unwrap());
    }

    #[test]
    fn missing_raw_table_leaves_trusted_alone() {
        let dir = TempDir::new().unwrap();
        let (raw, trusted) = stores(&dir);
        let mut previous = DataFrame::new(vec![Column::new("x".into(), vec![1i64])]).unwrap();
        trusted.write("scores", &mut previous).unwrap();

        let err = promote_table(
            &raw,
            &trusted,
            "scores",
            &LoadStrategy::FullReplace,
            2024,
            loaded_at(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(trusted.read("scores").unwrap().height(), 1);
    }

    #[test]
    fn incremental_without_key_fails() {
        let dir = TempDir::new().unwrap();
        let (raw, trusted) = stores(&dir);
        let mut df = DataFrame::new(vec![Column::new("valor".into(), vec![1.0])]).unwrap();
        raw.write("dividendos_ano", &mut df).unwrap();

        let strategy = LoadStrategy::Incremental {
            partition_key: "ano".into(),
        };
        let err = promote_table(&raw, &trusted, "dividendos_ano", &strategy, 2024, loaded_at());
        assert!(matches!(err, Err(LayerError::Partition(_))));
        assert!(!trusted.contains("dividendos_ano"));
    }

    #[test]
    fn strategy_serializes_tagged() {
        let json = serde_json::to_string(&LoadStrategy::Incremental {
            partition_key: "ano".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"incremental","partition_key":"ano"}"#);
        assert_eq!(LoadStrategy::FullReplace.to_string(), "full_replace");
    }
}

//! File-backed storage layers.
//!
//! Layout: `{root}/{table}.parquet` (raw tables may also arrive as
//! `{table}.csv`). Table identity is the file's base name.
//!
//! Features:
//! - Atomic writes (write to `.tmp`, rename into place)
//! - Metadata sidecar per trusted table (`{table}.meta.json`)
//! - Status listing with row counts

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scorelab_core::TableError;

use crate::partition::PartitionError;
use crate::promote::LoadStrategy;

/// Which stage of the pipeline a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Raw,
    Trusted,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Raw => write!(f, "raw"),
            Layer::Trusted => write!(f, "trusted"),
        }
    }
}

/// Errors reading or writing a layer table.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("table '{table}' not found in {layer} layer")]
    NotFound { layer: Layer, table: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("metadata error: {0}")]
    Meta(String),

    #[error("partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("table decode error: {0}")]
    Table(#[from] TableError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

impl LayerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LayerError::NotFound { .. })
    }
}

/// Metadata sidecar written next to each trusted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub table: String,
    pub strategy: LoadStrategy,
    pub rows: usize,
    /// Partitions present after the load (incremental tables only).
    pub partitions: Vec<i32>,
    /// BLAKE3 hash of the written Parquet file.
    pub data_hash: String,
    pub promoted_at: NaiveDateTime,
}

/// Status of one table in a layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableStatus {
    pub table: String,
    pub path: PathBuf,
    pub rows: Option<usize>,
    pub meta: Option<TableMeta>,
}

/// One layer directory.
#[derive(Debug, Clone)]
pub struct LayerStore {
    layer: Layer,
    root: PathBuf,
}

impl LayerStore {
    pub fn new(layer: Layer, root: impl Into<PathBuf>) -> Self {
        Self {
            layer,
            root: root.into(),
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Root directory of the layer.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical Parquet path for a table: `{root}/{table}.parquet`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.parquet"))
    }

    fn csv_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.csv"))
    }

    /// Path to the metadata sidecar: `{root}/{table}.meta.json`
    pub fn meta_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.meta.json"))
    }

    /// The file currently backing a table, Parquet first.
    pub fn locate(&self, table: &str) -> Option<PathBuf> {
        [self.table_path(table), self.csv_path(table)]
            .into_iter()
            .find(|p| p.is_file())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.locate(table).is_some()
    }

    /// Read a table into memory.
    pub fn read(&self, table: &str) -> Result<DataFrame, LayerError> {
        let path = self.locate(table).ok_or_else(|| LayerError::NotFound {
            layer: self.layer,
            table: table.to_string(),
        })?;
        read_file(&path)
    }

    /// Read a table, or `None` if the layer has no such table.
    pub fn read_optional(&self, table: &str) -> Result<Option<DataFrame>, LayerError> {
        match self.read(table) {
            Ok(df) => Ok(Some(df)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a table as Parquet, atomically replacing any previous version.
    ///
    /// A CSV file for the same table is removed so the Parquet file is the
    /// only source afterwards.
    pub fn write(&self, table: &str, df: &mut DataFrame) -> Result<PathBuf, LayerError> {
        fs::create_dir_all(&self.root).map_err(|source| LayerError::Io {
            path: self.root.clone(),
            source,
        })?;

        let path = self.table_path(table);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(df, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            LayerError::Io {
                path: path.clone(),
                source,
            }
        })?;

        let csv = self.csv_path(table);
        if csv.is_file() {
            fs::remove_file(&csv).map_err(|source| LayerError::Io { path: csv, source })?;
        }
        Ok(path)
    }

    /// Table names present in the layer, sorted.
    pub fn tables(&self) -> Result<Vec<String>, LayerError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|source| LayerError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LayerError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            // Skip sidecars, temp files and anything that is not a table
            let is_table = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("parquet") | Some("csv")
            );
            if !is_table || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Write the metadata sidecar for a table.
    pub fn write_meta(&self, meta: &TableMeta) -> Result<(), LayerError> {
        let json = serde_json::to_string_pretty(meta)
            .map_err(|e| LayerError::Meta(format!("serialize: {e}")))?;
        let path = self.meta_path(&meta.table);
        fs::write(&path, json).map_err(|source| LayerError::Io { path, source })
    }

    /// Read the metadata sidecar, if present and valid.
    pub fn read_meta(&self, table: &str) -> Option<TableMeta> {
        let content = fs::read_to_string(self.meta_path(table)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Row counts and sidecar info for every table in the layer.
    pub fn status(&self) -> Result<Vec<TableStatus>, LayerError> {
        Ok(self
            .tables()?
            .into_iter()
            .map(|table| {
                let path = self.locate(&table).unwrap_or_else(|| self.table_path(&table));
                let rows = read_file(&path).ok().map(|df| df.height());
                let meta = self.read_meta(&table);
                TableStatus {
                    table,
                    path,
                    rows,
                    meta,
                }
            })
            .collect())
    }
}

/// BLAKE3 hash of a file's bytes.
pub fn file_hash(path: &Path) -> Result<String, LayerError> {
    let bytes = fs::read(path).map_err(|source| LayerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ── Parquet / CSV I/O helpers ───────────────────────────────────────

fn read_file(path: &Path) -> Result<DataFrame, LayerError> {
    let read_err = |reason: String| LayerError::Read {
        path: path.to_path_buf(),
        reason,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| read_err(e.to_string())),
        _ => {
            let file = fs::File::open(path).map_err(|e| read_err(format!("open: {e}")))?;
            ParquetReader::new(file)
                .finish()
                .map_err(|e| read_err(e.to_string()))
        }
    }
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), LayerError> {
    let write_err = |reason: String| LayerError::Write {
        path: path.to_path_buf(),
        reason,
    };
    let file = fs::File::create(path).map_err(|e| write_err(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| write_err(format!("write parquet: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        DataFrame::new(vec![
            Column::new("ticker".into(), vec!["PETR4", "VALE3"]),
            Column::new("score_total".into(), vec![120.0, 80.5]),
        ])
        .unwrap()
    }

    #[test]
    fn write_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayerStore::new(Layer::Trusted, dir.path());

        let path = store.write("scores", &mut sample()).unwrap();
        assert_eq!(path, dir.path().join("scores.parquet"));
        assert!(!dir.path().join("scores.parquet.tmp").exists());

        let loaded = store.read("scores").unwrap();
        assert!(loaded.equals(&sample()));
    }

    #[test]
    fn missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayerStore::new(Layer::Raw, dir.path());
        let err = store.read("nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.read_optional("nope").unwrap().is_none());
    }

    #[test]
    fn reads_csv_tables() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("indicadores.csv"),
            "ticker,roe\nPETR4,18.5\nVALE3,\n",
        )
        .unwrap();
        let store = LayerStore::new(Layer::Raw, dir.path());
        let df = store.read("indicadores").unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(store.tables().unwrap(), vec!["indicadores".to_string()]);
    }

    #[test]
    fn parquet_write_supersedes_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("scores.csv"), "ticker\nX\n").unwrap();
        let store = LayerStore::new(Layer::Raw, dir.path());
        store.write("scores", &mut sample()).unwrap();
        assert!(!dir.path().join("scores.csv").exists());
        assert_eq!(store.read("scores").unwrap().height(), 2);
    }

    #[test]
    fn listing_skips_sidecars_and_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayerStore::new(Layer::Trusted, dir.path());
        store.write("a", &mut sample()).unwrap();
        store.write("b", &mut sample()).unwrap();
        fs::write(dir.path().join("a.meta.json"), "{}").unwrap();
        fs::write(dir.path().join("c.parquet.tmp"), "junk").unwrap();

        assert_eq!(store.tables().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayerStore::new(Layer::Raw, dir.path().join("absent"));
        assert!(store.tables().unwrap().is_empty());
    }

    #[test]
    fn meta_roundtrip_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayerStore::new(Layer::Trusted, dir.path());
        let path = store.write("scores", &mut sample()).unwrap();
        let meta = TableMeta {
            table: "scores".into(),
            strategy: LoadStrategy::FullReplace,
            rows: 2,
            partitions: vec![],
            data_hash: file_hash(&path).unwrap(),
            promoted_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        };
        store.write_meta(&meta).unwrap();
        assert_eq!(store.read_meta("scores"), Some(meta));

        let status = store.status().unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].rows, Some(2));
        assert!(status[0].meta.is_some());
    }
}

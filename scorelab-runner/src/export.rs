//! CSV export of layer tables for spreadsheets and external tools.
//!
//! Nulls are written as empty fields; every other value uses its plain
//! text rendering.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::info;

use crate::cells::frame_rows;
use crate::layer::LayerStore;

/// Render a frame as CSV with a header row.
pub fn export_table_csv(df: &DataFrame) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(df.get_columns().iter().map(|c| c.name().as_str()))?;
    for row in frame_rows(df).context("failed to convert table to rows")? {
        wtr.write_record(row.iter().map(|cell| cell.render()))?;
    }

    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Export the named tables from `store` into `out_dir` as `{table}.csv`.
///
/// Tables missing from the store are reported by name and otherwise skipped.
pub fn export_tables(
    store: &LayerStore,
    tables: &[&str],
    out_dir: &Path,
) -> Result<(Vec<PathBuf>, Vec<String>)> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut written = Vec::new();
    let mut missing = Vec::new();
    for &table in tables {
        let Some(df) = store.read_optional(table)? else {
            missing.push(table.to_string());
            continue;
        };
        let path = out_dir.join(format!("{table}.csv"));
        std::fs::write(&path, export_table_csv(&df)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(table, rows = df.height(), path = %path.display(), "exported CSV");
        written.push(path);
    }
    Ok((written, missing))
}

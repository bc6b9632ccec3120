//! Partition-aware merge primitive for tables that accumulate history.
//!
//! A merge keeps every partition strictly older than the current one from the
//! existing table and replaces the current partition with the fresh rows:
//!
//! ```text
//! merged = filter(existing, year < current) ∪ filter(fresh, year == current)
//! ```
//!
//! The union is by column name, not position. Rows whose key is null or
//! unparseable belong to no partition and are dropped. The primitive is
//! schema-independent; the only requirement is the partition key column.

use chrono::{DateTime, Datelike, NaiveDate};
use polars::prelude::*;
use thiserror::Error;

use scorelab_core::table::columns::parse_date;

/// Errors extracting partitions or merging frames.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("partition key column '{0}' not found")]
    MissingKey(String),

    #[error("partition key '{key}' has unsupported type {dtype}")]
    UnsupportedKey { key: String, dtype: String },

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// The partition (calendar year) of every row.
///
/// Accepts integer/float year columns, `Date`, `Datetime`, and text dates
/// (`YYYY-MM-DD…`, `DD/MM/YYYY`) or plain year text.
pub fn partition_years(df: &DataFrame, key: &str) -> Result<Vec<Option<i32>>, PartitionError> {
    let column = df
        .column(key)
        .map_err(|_| PartitionError::MissingKey(key.to_string()))?;

    match column.dtype() {
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|d| d.and_then(epoch_days_year))
                .collect())
        }
        DataType::Datetime(unit, _) => {
            let unit = *unit;
            let raw = column.cast(&DataType::Int64)?;
            Ok(raw
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|v| timestamp_year(v, unit)))
                .collect())
        }
        DataType::String => Ok(column
            .str()?
            .into_iter()
            .map(|v| v.and_then(text_year))
            .collect()),
        dtype if dtype.is_integer() || dtype.is_float() => {
            let years = column.cast(&DataType::Int64)?;
            Ok(years
                .i64()?
                .into_iter()
                .map(|v| v.and_then(|y| i32::try_from(y).ok()))
                .collect())
        }
        other => Err(PartitionError::UnsupportedKey {
            key: key.to_string(),
            dtype: other.to_string(),
        }),
    }
}

/// Rows whose partition satisfies `keep`.
pub fn filter_partitions(
    df: &DataFrame,
    key: &str,
    keep: impl Fn(i32) -> bool,
) -> Result<DataFrame, PartitionError> {
    let flags: Vec<bool> = partition_years(df, key)?
        .into_iter()
        .map(|y| y.is_some_and(&keep))
        .collect();
    let mask = BooleanChunked::from_slice(PlSmallStr::from_static("partition"), &flags);
    Ok(df.filter(&mask)?)
}

/// Distinct partitions present, ascending.
pub fn distinct_partitions(df: &DataFrame, key: &str) -> Result<Vec<i32>, PartitionError> {
    let mut years: Vec<i32> = partition_years(df, key)?.into_iter().flatten().collect();
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

/// Merge fresh rows for the `current` partition into the existing history.
pub fn merge_partitions(
    existing: Option<&DataFrame>,
    fresh: &DataFrame,
    key: &str,
    current: i32,
) -> Result<DataFrame, PartitionError> {
    let current_rows = filter_partitions(fresh, key, |y| y == current)?;
    let history = match existing {
        Some(df) => filter_partitions(df, key, |y| y < current)?,
        None => DataFrame::empty(),
    };
    Ok(union_by_name(&history, &current_rows)?)
}

/// Stack `newer` under `older`, matching columns by name.
///
/// Column order follows `older`, with columns only present in `newer`
/// appended. A column missing on one side is filled with nulls. When the two
/// sides disagree on type, the common type is the first of newer, older or
/// `Float64` that both sides round-trip through unchanged, otherwise text.
/// Older rows are never truncated to fit the newer type.
pub fn union_by_name(older: &DataFrame, newer: &DataFrame) -> PolarsResult<DataFrame> {
    if older.width() == 0 {
        return Ok(newer.clone());
    }
    if newer.width() == 0 {
        return Ok(older.clone());
    }

    let mut names: Vec<PlSmallStr> = older.get_columns().iter().map(|c| c.name().clone()).collect();
    for column in newer.get_columns() {
        if !names.contains(column.name()) {
            names.push(column.name().clone());
        }
    }

    let mut old_columns = Vec::with_capacity(names.len());
    let mut new_columns = Vec::with_capacity(names.len());
    for name in &names {
        let old = older.column(name.as_str()).ok();
        let new = newer.column(name.as_str()).ok();
        let dtype = target_dtype(old, new);
        old_columns.push(conform(old, name, older.height(), &dtype)?);
        new_columns.push(conform(new, name, newer.height(), &dtype)?);
    }

    DataFrame::new(old_columns)?.vstack(&DataFrame::new(new_columns)?)
}

fn target_dtype(old: Option<&Column>, new: Option<&Column>) -> DataType {
    match (old, new) {
        (Some(o), Some(n)) => {
            let (od, nd) = (o.dtype(), n.dtype());
            if od == nd || *od == DataType::Null {
                nd.clone()
            } else if *nd == DataType::Null {
                od.clone()
            } else if casts_losslessly(o, nd) {
                nd.clone()
            } else if casts_losslessly(n, od) {
                od.clone()
            } else if casts_losslessly(o, &DataType::Float64)
                && casts_losslessly(n, &DataType::Float64)
            {
                DataType::Float64
            } else {
                DataType::String
            }
        }
        (Some(c), None) | (None, Some(c)) => c.dtype().clone(),
        (None, None) => DataType::Null,
    }
}

/// True when casting to `dtype` and back reproduces every value and null.
fn casts_losslessly(column: &Column, dtype: &DataType) -> bool {
    let series = column.as_materialized_series();
    let Ok(cast) = series.cast(dtype) else {
        return false;
    };
    if cast.null_count() != series.null_count() {
        return false;
    }
    cast.cast(series.dtype())
        .is_ok_and(|back| back.equals_missing(series))
}

fn conform(
    column: Option<&Column>,
    name: &PlSmallStr,
    height: usize,
    dtype: &DataType,
) -> PolarsResult<Column> {
    match column {
        None => Ok(Column::from(Series::full_null(name.clone(), height, dtype))),
        Some(c) if c.dtype() == dtype => Ok(c.clone()),
        Some(c) => c.cast(dtype),
    }
}

fn epoch_days_year(days: i32) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    epoch
        .checked_add_signed(chrono::Duration::days(i64::from(days)))
        .map(|d| d.year())
}

fn timestamp_year(value: i64, unit: TimeUnit) -> Option<i32> {
    let dt = match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value)?,
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value)?,
        TimeUnit::Nanoseconds => DateTime::from_timestamp_nanos(value),
    };
    Some(dt.year())
}

fn text_year(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Some(date) = parse_date(text) {
        return Some(date.year());
    }
    if text.len() == 4 {
        return text.parse().ok();
    }
    None
}

//! Column-wise conversion of frames into plain scalar cells.
//!
//! Sinks that are not Arrow-aware (SQLite, CSV) see every column as one of
//! three kinds: integers, reals or text. Booleans become integers; dates,
//! timestamps and anything else become text.

use polars::prelude::*;

/// Storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Integer,
    Real,
    Text,
}

impl CellKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_integer() || *dtype == DataType::Boolean {
            CellKind::Integer
        } else if dtype.is_float() {
            CellKind::Real
        } else {
            CellKind::Text
        }
    }

    /// SQLite column type.
    pub fn sql_type(self) -> &'static str {
        match self {
            CellKind::Integer => "INTEGER",
            CellKind::Real => "REAL",
            CellKind::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Cell {
    /// Text rendering; nulls are empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Real(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// All values of a column, in row order.
pub fn column_cells(column: &Column) -> PolarsResult<Vec<Cell>> {
    let cells = match CellKind::of(column.dtype()) {
        CellKind::Integer => column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, Cell::Int))
            .collect(),
        CellKind::Real => column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(x) if x.is_finite() => Cell::Real(x),
                _ => Cell::Null,
            })
            .collect(),
        CellKind::Text => column
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map_or(Cell::Null, |s| Cell::Text(s.to_string())))
            .collect(),
    };
    Ok(cells)
}

/// Row-major cells of a whole frame.
pub fn frame_rows(df: &DataFrame) -> PolarsResult<Vec<Vec<Cell>>> {
    let columns: Vec<Vec<Cell>> = df
        .get_columns()
        .iter()
        .map(column_cells)
        .collect::<PolarsResult<_>>()?;

    let mut rows = vec![Vec::with_capacity(columns.len()); df.height()];
    for column in columns {
        for (row, cell) in rows.iter_mut().zip(column) {
            row.push(cell);
        }
    }
    Ok(rows)
}

//! SQLite warehouse: the analytical sink fed from the trusted layer.
//!
//! Every load fully replaces the target table, so the warehouse always
//! mirrors the current trusted state. A load runs in one transaction and a
//! failure leaves the previous table in place.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use thiserror::Error;
use tracing::info;

use crate::cells::{frame_rows, Cell, CellKind};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("failed to create warehouse directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("table '{0}' has no columns")]
    EmptySchema(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

pub struct Warehouse {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Warehouse {
    /// Open (or create) the warehouse database file.
    pub fn open(path: &Path) -> Result<Self, WarehouseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| WarehouseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace `table` with the contents of `df`. Returns rows written.
    pub fn load_table(&mut self, table: &str, df: &DataFrame) -> Result<usize, WarehouseError> {
        if df.width() == 0 {
            return Err(WarehouseError::EmptySchema(table.to_string()));
        }

        let columns: Vec<(String, CellKind)> = df
            .get_columns()
            .iter()
            .map(|c| (quote_ident(c.name().as_str()), CellKind::of(c.dtype())))
            .collect();
        let rows = frame_rows(df)?;

        let create = format!(
            "CREATE TABLE {} ({})",
            quote_ident(table),
            columns
                .iter()
                .map(|(name, kind)| format!("{name} {}", kind.sql_type()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
        tx.execute(&create, [])?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in &rows {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;

        info!(table, rows = rows.len(), "loaded into warehouse");
        Ok(rows.len())
    }

    /// User tables in the warehouse, sorted.
    pub fn table_names(&self) -> Result<Vec<String>, WarehouseError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn row_count(&self, table: &str) -> Result<usize, WarehouseError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Column names of a table, in declaration order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>, WarehouseError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(table)))?;
        Ok(stmt.column_names().into_iter().map(str::to_string).collect())
    }
}

fn to_sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Int(v) => Value::Integer(*v),
        Cell::Real(v) => Value::Real(*v),
        Cell::Text(s) => Value::Text(s.clone()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

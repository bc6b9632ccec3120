//! ScoreLab Runner: layered storage, promotion, warehouse loading and orchestration.
//!
//! This crate builds on `scorelab-core` to provide:
//! - Raw and trusted layer stores with atomic Parquet writes
//! - Full-replace and partition-aware incremental promotion
//! - SQLite warehouse loading from the trusted layer
//! - Pipeline orchestration with a per-table run report
//! - CSV export of layer tables

pub mod cells;
pub mod config;
pub mod export;
pub mod layer;
pub mod partition;
pub mod pipeline;
pub mod promote;
pub mod report;
pub mod warehouse;

pub use config::{ConfigError, IncrementalTable, PipelineConfig};
pub use export::{export_table_csv, export_tables};
pub use layer::{Layer, LayerError, LayerStore, TableMeta, TableStatus};
pub use partition::{merge_partitions, union_by_name, PartitionError};
pub use pipeline::{Pipeline, PipelineError};
pub use promote::{promote_table, LoadStrategy, Promotion, TableState, LOAD_TIMESTAMP_COLUMN};
pub use report::{Outcome, PipelineReport, StepReport, TableReport};
pub use warehouse::{Warehouse, WarehouseError};

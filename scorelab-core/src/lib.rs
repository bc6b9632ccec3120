//! ScoreLab Core: domain records, scoring engine, valuation, sector aggregation.
//!
//! This crate is pure in-memory transformation:
//! - Domain records (indicators, dividend yields, distress events)
//! - Point-based scoring engine with a floor-clamped composite total
//! - Graham/Bazin valuation helpers
//! - Sub-sector aggregation and sector roll-up
//! - Conversion between records and Polars DataFrames
//!
//! It performs no file or network I/O; the runner crate owns the layers.

pub mod domain;
pub mod scoring;
pub mod sector;
pub mod table;
pub mod valuation;

pub use domain::{
    normalize_ticker, CycleStatus, DistressEvent, DividendYield, IndicatorRecord, SectorClass,
    SectorClassifier,
};
pub use scoring::{score, score_all, ScoreRecord};
pub use sector::{
    aggregate, join_scores, Classification, ScoredAsset, SectorAggregateRecord, SectorMap,
    SectorThresholds,
};
pub use table::TableError;
pub use valuation::{value, ValuationRecord};

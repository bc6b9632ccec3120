//! Domain records shared by the scoring engine, the aggregator and the table codecs.

pub mod distress;
pub mod record;
pub mod ticker;

pub use distress::DistressEvent;
pub use record::{
    attach_yields, CycleStatus, DividendYield, IndicatorRecord, SectorClass, SectorClassifier,
};
pub use ticker::normalize_ticker;

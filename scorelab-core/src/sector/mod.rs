//! Sector aggregation: per-asset scores → sub-sector composites → sector score.
//!
//! A sub-sector is identified by its (sector, sub-sector) label pair, so the
//! same sub-sector label under two sectors forms two groups.
//!
//! The roll-up is a strict two-level mean:
//! - a sub-sector's statistics are means over its member assets
//! - a sector's `pontuacao_setor` is the plain mean of its sub-sectors'
//!   `pontuacao_final`, not weighted by member count
//!
//! The distress penalty is normalized by the largest open-event count seen
//! among the sub-sectors of the same run, so one sub-sector's penalty depends
//! on the others.

pub mod bands;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::record::finite;
use crate::domain::{DistressEvent, IndicatorRecord};
use crate::scoring::ScoreRecord;
use crate::valuation;

/// Sector label used for sub-sectors whose members carry no sector.
pub const UNCLASSIFIED_SECTOR: &str = "Unclassified";

/// Quality thresholds on `score_total`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorThresholds {
    /// Members strictly above this count as high quality.
    pub high_quality: f64,
    /// Members strictly below this count as low quality.
    pub low_quality: f64,
}

impl Default for SectorThresholds {
    fn default() -> Self {
        Self {
            high_quality: 100.0,
            low_quality: 40.0,
        }
    }
}

/// Sector / sub-sector classification of one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub sector: Option<String>,
    pub subsector: Option<String>,
}

/// Ticker → classification lookup.
#[derive(Debug, Clone, Default)]
pub struct SectorMap {
    entries: HashMap<String, Classification>,
}

impl SectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from the labels carried on indicator rows.
    pub fn from_indicators(rows: &[IndicatorRecord]) -> Self {
        let mut map = Self::new();
        for row in rows {
            map.insert(
                row.ticker.clone(),
                Classification {
                    sector: row.sector.clone(),
                    subsector: row.subsector.clone(),
                },
            );
        }
        map
    }

    pub fn insert(&mut self, ticker: String, classification: Classification) {
        self.entries.insert(ticker, classification);
    }

    pub fn get(&self, ticker: &str) -> Option<&Classification> {
        self.entries.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An asset's indicators together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAsset {
    pub indicator: IndicatorRecord,
    pub score: ScoreRecord,
}

/// Pair indicator rows with score rows by ticker. Rows without a partner are dropped.
pub fn join_scores(indicators: &[IndicatorRecord], scores: &[ScoreRecord]) -> Vec<ScoredAsset> {
    let by_ticker: HashMap<&str, &ScoreRecord> =
        scores.iter().map(|s| (s.ticker.as_str(), s)).collect();
    indicators
        .iter()
        .filter_map(|ind| {
            by_ticker.get(ind.ticker.as_str()).map(|s| ScoredAsset {
                indicator: ind.clone(),
                score: (*s).clone(),
            })
        })
        .collect()
}

/// Aggregated statistics and points for one sub-sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAggregateRecord {
    pub sector: String,
    pub subsector: String,
    pub members: usize,

    pub mean_roe: Option<f64>,
    pub mean_beta: Option<f64>,
    pub mean_payout: Option<f64>,
    pub mean_dy_5y: Option<f64>,
    pub mean_margin_of_safety: Option<f64>,
    pub mean_score: f64,
    pub high_quality_count: usize,
    pub low_quality_count: usize,
    pub open_distress_events: usize,

    pub dy_pts: f64,
    pub roe_pts: f64,
    pub beta_pts: f64,
    pub payout_pts: f64,
    pub high_quality_pts: f64,
    pub margin_pts: f64,
    pub low_quality_pts: f64,
    pub distress_pts: f64,

    pub pontuacao_final: f64,
    pub pontuacao_setor: f64,
}

impl SectorAggregateRecord {
    /// Sum of the bonus-side sub-scores (each may itself be negative).
    pub fn bonus_points(&self) -> f64 {
        self.dy_pts
            + self.roe_pts
            + self.beta_pts
            + self.payout_pts
            + self.high_quality_pts
            + self.margin_pts
    }

    /// Sum of the penalty-side sub-scores.
    pub fn penalty_points(&self) -> f64 {
        self.low_quality_pts + self.distress_pts
    }
}

/// Aggregate scored assets into sub-sector records, sorted by sector score
/// then sub-sector score, both descending.
pub fn aggregate(
    scored_assets: &[ScoredAsset],
    sector_map: &SectorMap,
    distress_events: &[DistressEvent],
    thresholds: &SectorThresholds,
) -> Vec<SectorAggregateRecord> {
    // (sector, subsector) → members
    let mut groups: BTreeMap<(String, String), Vec<&ScoredAsset>> = BTreeMap::new();
    for asset in scored_assets {
        let Some(class) = sector_map.get(&asset.indicator.ticker) else {
            continue;
        };
        let Some(subsector) = class.subsector.as_deref().map(str::trim) else {
            continue;
        };
        if subsector.is_empty() {
            continue;
        }
        let sector = class
            .sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNCLASSIFIED_SECTOR);
        groups
            .entry((sector.to_string(), subsector.to_string()))
            .or_default()
            .push(asset);
    }

    let open_counts = open_events_by_label(distress_events);
    let max_open = groups
        .keys()
        .map(|(_, sub)| open_counts.get(sub.as_str()).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);

    let mut records: Vec<SectorAggregateRecord> = groups
        .into_iter()
        .map(|((sector, subsector), members)| {
            let open = open_counts.get(subsector.as_str()).copied().unwrap_or(0);
            summarize(sector, subsector, &members, open, max_open, thresholds)
        })
        .collect();

    roll_up(&mut records);
    sort_ranking(&mut records);
    records
}

fn open_events_by_label(events: &[DistressEvent]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for event in events.iter().filter(|e| e.is_open()) {
        if let Some(label) = event.sector_label.as_deref() {
            *counts.entry(label.trim()).or_insert(0) += 1;
        }
    }
    counts
}

fn summarize(
    sector: String,
    subsector: String,
    members: &[&ScoredAsset],
    open_events: usize,
    max_open_events: usize,
    thresholds: &SectorThresholds,
) -> SectorAggregateRecord {
    let mean_roe = mean(members.iter().map(|a| a.indicator.roe));
    let mean_beta = mean(members.iter().map(|a| a.indicator.beta));
    let mean_payout = mean(members.iter().map(|a| a.indicator.payout));
    let mean_dy_5y = mean(members.iter().map(|a| a.indicator.dy_5y));
    let mean_margin_of_safety = mean(members.iter().map(|a| {
        let ind = &a.indicator;
        Some(valuation::margin_of_safety(
            ind.price,
            ind.eps,
            ind.book_value_per_share,
        ))
    }));
    let mean_score = mean(members.iter().map(|a| Some(a.score.score_total))).unwrap_or(0.0);

    let high_quality_count = members
        .iter()
        .filter(|a| a.score.score_total > thresholds.high_quality)
        .count();
    let low_quality_count = members
        .iter()
        .filter(|a| a.score.score_total < thresholds.low_quality)
        .count();

    let mut record = SectorAggregateRecord {
        sector,
        subsector,
        members: members.len(),
        mean_roe,
        mean_beta,
        mean_payout,
        mean_dy_5y,
        mean_margin_of_safety,
        mean_score,
        high_quality_count,
        low_quality_count,
        open_distress_events: open_events,
        dy_pts: bands::dividend_yield(mean_dy_5y),
        roe_pts: bands::return_on_equity(mean_roe),
        beta_pts: bands::beta(mean_beta),
        payout_pts: bands::payout(mean_payout),
        high_quality_pts: bands::high_quality_count(high_quality_count),
        margin_pts: bands::margin_of_safety(mean_margin_of_safety),
        low_quality_pts: bands::low_quality_count(low_quality_count),
        distress_pts: bands::distress(open_events, max_open_events),
        pontuacao_final: 0.0,
        pontuacao_setor: 0.0,
    };
    record.pontuacao_final =
        (record.bonus_points() + record.mean_score) + record.penalty_points();
    record
}

/// Set each record's `pontuacao_setor` to the mean `pontuacao_final` of its sector.
pub fn roll_up(records: &mut [SectorAggregateRecord]) {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for r in records.iter() {
        let entry = sums.entry(r.sector.clone()).or_insert((0.0, 0));
        entry.0 += r.pontuacao_final;
        entry.1 += 1;
    }
    for r in records.iter_mut() {
        if let Some((sum, n)) = sums.get(&r.sector) {
            r.pontuacao_setor = sum / *n as f64;
        }
    }
}

fn sort_ranking(records: &mut [SectorAggregateRecord]) {
    records.sort_by(|a, b| {
        b.pontuacao_setor
            .total_cmp(&a.pontuacao_setor)
            .then_with(|| b.pontuacao_final.total_cmp(&a.pontuacao_final))
            .then_with(|| a.sector.cmp(&b.sector))
            .then_with(|| a.subsector.cmp(&b.subsector))
    });
}

/// Mean of the finite values; `None` when there are none.
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .filter_map(finite)
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

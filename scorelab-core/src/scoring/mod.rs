//! Scoring engine: indicator row → per-criterion points and a composite total.
//!
//! `score` is pure. Criteria are evaluated independently and summed; the sum
//! is floored at zero with no ceiling. Missing inputs contribute nothing.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::domain::IndicatorRecord;

/// Points awarded to one asset, one field per criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub ticker: String,
    pub dy_12m_pts: f64,
    pub dy_5y_pts: f64,
    pub payout_pts: f64,
    pub roe_pts: f64,
    pub pl_pts: f64,
    pub pvp_pts: f64,
    pub debt_mktcap_pts: f64,
    pub debt_ebitda_pts: f64,
    pub growth_pts: f64,
    pub sentiment_pts: f64,
    pub score_total: f64,
}

impl ScoreRecord {
    /// Column names in table order.
    pub const COLUMNS: [&'static str; 12] = [
        "ticker",
        "dy_12m_pts",
        "dy_5y_pts",
        "payout_pts",
        "roe_pts",
        "pl_pts",
        "pvp_pts",
        "debt_mktcap_pts",
        "debt_ebitda_pts",
        "growth_pts",
        "sentiment_pts",
        "score_total",
    ];

    /// The per-criterion points in column order (excluding ticker and total).
    pub fn criteria(&self) -> [f64; 10] {
        [
            self.dy_12m_pts,
            self.dy_5y_pts,
            self.payout_pts,
            self.roe_pts,
            self.pl_pts,
            self.pvp_pts,
            self.debt_mktcap_pts,
            self.debt_ebitda_pts,
            self.growth_pts,
            self.sentiment_pts,
        ]
    }
}

/// Score one asset.
pub fn score(row: &IndicatorRecord) -> ScoreRecord {
    let class = row.sector_class;

    let mut record = ScoreRecord {
        ticker: row.ticker.clone(),
        dy_12m_pts: rules::dividend_yield_12m(row.dy_12m),
        dy_5y_pts: rules::dividend_yield_5y(row.dy_5y),
        payout_pts: rules::payout(row.payout),
        roe_pts: rules::return_on_equity(row.roe, class),
        pl_pts: rules::price_to_earnings(row.pe_ratio),
        pvp_pts: rules::price_to_book(row.pb_ratio),
        debt_mktcap_pts: rules::debt_to_market_cap(row.debt_to_market_cap(), class),
        debt_ebitda_pts: rules::debt_to_ebitda(row.effective_debt_to_ebitda(), class),
        growth_pts: rules::growth_5y(row.growth_5y),
        sentiment_pts: rules::sentiment(row.sentiment),
        score_total: 0.0,
    };

    let sum: f64 = record.criteria().iter().sum();
    record.score_total = sum.max(0.0);
    record
}

/// Score every row, preserving input order.
pub fn score_all(rows: &[IndicatorRecord]) -> Vec<ScoreRecord> {
    rows.iter().map(score).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SectorClass;

    fn reference_row() -> IndicatorRecord {
        IndicatorRecord {
            ticker: "TEST3".into(),
            sector: Some("Utilidade Pública".into()),
            subsector: Some("Energia Elétrica".into()),
            dy_12m: Some(6.0),
            dy_5y: Some(9.0),
            payout: Some(45.0),
            roe: Some(14.0),
            pe_ratio: Some(10.0),
            pb_ratio: Some(0.5),
            total_debt: Some(30.0),
            market_cap: Some(100.0),
            debt_to_ebitda: Some(0.8),
            growth_5y: Some(20.0),
            sentiment: Some(80.0),
            ..IndicatorRecord::default()
        }
    }

    #[test]
    fn reference_row_scores_146() {
        let s = score(&reference_row());
        assert_eq!(s.dy_12m_pts, 20.0);
        assert_eq!(s.dy_5y_pts, 25.0);
        assert_eq!(s.payout_pts, 10.0);
        assert_eq!(s.roe_pts, 15.0);
        assert_eq!(s.pl_pts, 15.0);
        assert_eq!(s.pvp_pts, 20.0);
        assert_eq!(s.debt_mktcap_pts, 10.0);
        assert_eq!(s.debt_ebitda_pts, 10.0);
        assert_eq!(s.growth_pts, 15.0);
        assert!((s.sentiment_pts - 6.0).abs() < 1e-12);
        assert!((s.score_total - 146.0).abs() < 1e-9);
    }

    #[test]
    fn all_missing_scores_zero() {
        let s = score(&IndicatorRecord::new("EMPTY3"));
        assert_eq!(s.score_total, 0.0);
        assert!(s.criteria().iter().all(|p| *p == 0.0));
    }

    #[test]
    fn negative_sum_is_floored() {
        let row = IndicatorRecord {
            ticker: "BAD3".into(),
            dy_12m: Some(1.0),
            payout: Some(95.0),
            pe_ratio: Some(40.0),
            pb_ratio: Some(6.0),
            growth_5y: Some(-10.0),
            sentiment: Some(0.0),
            ..IndicatorRecord::default()
        };
        let s = score(&row);
        assert!(s.criteria().iter().sum::<f64>() < 0.0);
        assert_eq!(s.score_total, 0.0);
    }

    #[test]
    fn financial_row_skips_debt_and_uses_bank_roe_scale() {
        let mut row = reference_row();
        row.sector_class = SectorClass::Financial;
        row.roe = Some(16.0);
        let s = score(&row);
        assert_eq!(s.roe_pts, 25.0);
        assert_eq!(s.debt_mktcap_pts, 0.0);
        assert_eq!(s.debt_ebitda_pts, 0.0);
    }

    #[test]
    fn score_all_keeps_order() {
        let rows = vec![IndicatorRecord::new("B"), IndicatorRecord::new("A")];
        let scores = score_all(&rows);
        assert_eq!(scores[0].ticker, "B");
        assert_eq!(scores[1].ticker, "A");
    }
}

//! Per-asset indicator records and sector classification.

use serde::{Deserialize, Serialize};

/// Sector classification resolved once at ingestion.
///
/// The financial branch changes the ROE scale and disables the debt criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorClass {
    Financial,
    #[default]
    General,
}

impl SectorClass {
    pub fn is_financial(self) -> bool {
        matches!(self, SectorClass::Financial)
    }
}

/// Resolves a sector label to a [`SectorClass`] by case-insensitive substring match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorClassifier {
    keywords: Vec<String>,
}

impl SectorClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn classify(&self, sector_label: Option<&str>) -> SectorClass {
        let Some(label) = sector_label else {
            return SectorClass::General;
        };
        let label = label.to_lowercase();
        if self.keywords.iter().any(|k| label.contains(k.as_str())) {
            SectorClass::Financial
        } else {
            SectorClass::General
        }
    }
}

impl Default for SectorClassifier {
    fn default() -> Self {
        Self::new(["financ"])
    }
}

/// Market-cycle status tag published by the collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Buy,
    Hold,
    Sell,
}

impl CycleStatus {
    /// Parse the free-text tag; unknown labels are `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.is_empty() {
            return None;
        }
        if label.contains("venda") || label.contains("sell") {
            Some(CycleStatus::Sell)
        } else if label.contains("compra") || label.contains("buy") {
            Some(CycleStatus::Buy)
        } else if label.contains("manter")
            || label.contains("hold")
            || label.contains("neutr")
        {
            Some(CycleStatus::Hold)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CycleStatus::Buy => "buy",
            CycleStatus::Hold => "hold",
            CycleStatus::Sell => "sell",
        }
    }
}

/// One asset's fundamentals for a single pipeline run.
///
/// Every numeric field is optional: `None` means "no signal" and must never be
/// read as zero. Percentages are expressed in percent units (`6.0` is 6%).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub ticker: String,
    pub sector: Option<String>,
    pub subsector: Option<String>,
    pub sector_class: SectorClass,

    pub price: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub payout: Option<f64>,
    pub total_debt: Option<f64>,
    pub ebitda: Option<f64>,
    pub debt_to_ebitda: Option<f64>,
    pub beta: Option<f64>,
    pub current_ratio: Option<f64>,
    pub avg_daily_liquidity: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub growth_5y: Option<f64>,
    pub market_cap: Option<f64>,
    /// Analyst sentiment gauge, 0–100.
    pub sentiment: Option<f64>,
    pub cycle: Option<CycleStatus>,
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,

    /// Trailing 12-month dividend yield (joined from the dividend-yield table).
    pub dy_12m: Option<f64>,
    /// 5-year average dividend yield (joined from the dividend-yield table).
    pub dy_5y: Option<f64>,
}

impl IndicatorRecord {
    /// A record with only the ticker set.
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Self::default()
        }
    }

    /// Total debt over market capitalization.
    ///
    /// Defined only for a positive market cap and non-negative debt.
    pub fn debt_to_market_cap(&self) -> Option<f64> {
        let debt = finite(self.total_debt)?;
        let cap = finite(self.market_cap)?;
        if cap <= 0.0 || debt < 0.0 {
            return None;
        }
        Some(debt / cap)
    }

    /// Debt over EBITDA: the reported ratio when present, else derived from
    /// total debt and a positive EBITDA.
    pub fn effective_debt_to_ebitda(&self) -> Option<f64> {
        if let Some(ratio) = finite(self.debt_to_ebitda) {
            return Some(ratio);
        }
        let debt = finite(self.total_debt)?;
        let ebitda = finite(self.ebitda)?;
        if ebitda <= 0.0 {
            return None;
        }
        Some(debt / ebitda)
    }

    /// Fill dividend-yield fields from the joined yield record.
    ///
    /// Yields already present on the indicator row take precedence.
    pub fn attach_yield(&mut self, dy: &DividendYield) {
        if finite(self.dy_12m).is_none() {
            self.dy_12m = finite(dy.dy_12m);
        }
        if finite(self.dy_5y).is_none() {
            self.dy_5y = finite(dy.dy_5y);
        }
    }
}

/// Dividend yields for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendYield {
    pub ticker: String,
    pub dy_12m: Option<f64>,
    pub dy_5y: Option<f64>,
}

/// Join dividend yields onto indicator rows by normalized ticker. When a
/// ticker has several yield rows the first one is used.
pub fn attach_yields(records: &mut [IndicatorRecord], yields: &[DividendYield]) {
    let mut by_ticker = std::collections::HashMap::new();
    for dy in yields {
        by_ticker.entry(dy.ticker.as_str()).or_insert(dy);
    }
    for record in records.iter_mut() {
        if let Some(dy) = by_ticker.get(record.ticker.as_str()) {
            record.attach_yield(dy);
        }
    }
}

/// Drop NaN and infinities: a present but non-finite value is "no signal".
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_matches_case_insensitive_substring() {
        let c = SectorClassifier::default();
        assert_eq!(c.classify(Some("Financeiro")), SectorClass::Financial);
        assert_eq!(c.classify(Some("FINANCIAL SERVICES")), SectorClass::Financial);
        assert_eq!(c.classify(Some("Energia Elétrica")), SectorClass::General);
        assert_eq!(c.classify(None), SectorClass::General);
    }

    #[test]
    fn classifier_ignores_blank_keywords() {
        let c = SectorClassifier::new(["", "  ", "Banco"]);
        assert_eq!(c.keywords(), &["banco".to_string()]);
        assert_eq!(c.classify(Some("Bancos")), SectorClass::Financial);
        assert_eq!(c.classify(Some("Saúde")), SectorClass::General);
    }

    #[test]
    fn cycle_status_parse() {
        assert_eq!(CycleStatus::parse("Compra"), Some(CycleStatus::Buy));
        assert_eq!(CycleStatus::parse("strong_buy"), Some(CycleStatus::Buy));
        assert_eq!(CycleStatus::parse("Manter"), Some(CycleStatus::Hold));
        assert_eq!(CycleStatus::parse("Venda"), Some(CycleStatus::Sell));
        assert_eq!(CycleStatus::parse("???"), None);
        assert_eq!(CycleStatus::parse(""), None);
    }

    #[test]
    fn debt_to_market_cap_requires_positive_cap() {
        let mut r = IndicatorRecord::new("AAAA3");
        r.total_debt = Some(30.0);
        r.market_cap = Some(100.0);
        assert_eq!(r.debt_to_market_cap(), Some(0.3));

        r.market_cap = Some(0.0);
        assert_eq!(r.debt_to_market_cap(), None);

        r.market_cap = Some(100.0);
        r.total_debt = Some(f64::NAN);
        assert_eq!(r.debt_to_market_cap(), None);
    }

    #[test]
    fn debt_to_ebitda_prefers_reported_ratio() {
        let mut r = IndicatorRecord::new("AAAA3");
        r.total_debt = Some(100.0);
        r.ebitda = Some(50.0);
        assert_eq!(r.effective_debt_to_ebitda(), Some(2.0));

        r.debt_to_ebitda = Some(0.8);
        assert_eq!(r.effective_debt_to_ebitda(), Some(0.8));

        r.debt_to_ebitda = None;
        r.ebitda = Some(-10.0);
        assert_eq!(r.effective_debt_to_ebitda(), None);
    }

    #[test]
    fn attach_yields_joins_by_ticker_without_overwriting() {
        let mut records = vec![IndicatorRecord::new("AAAA3"), IndicatorRecord::new("BBBB4")];
        records[1].dy_12m = Some(1.0);
        let yields = vec![
            DividendYield {
                ticker: "AAAA3".into(),
                dy_12m: Some(6.0),
                dy_5y: Some(9.0),
            },
            DividendYield {
                ticker: "BBBB4".into(),
                dy_12m: Some(7.0),
                dy_5y: Some(f64::NAN),
            },
        ];

        attach_yields(&mut records, &yields);

        assert_eq!(records[0].dy_12m, Some(6.0));
        assert_eq!(records[0].dy_5y, Some(9.0));
        assert_eq!(records[1].dy_12m, Some(1.0));
        assert_eq!(records[1].dy_5y, None);
    }

    #[test]
    fn duplicate_yield_rows_keep_the_first() {
        let mut records = vec![IndicatorRecord::new("TAEE11")];
        let row = |dy_12m: f64| DividendYield {
            ticker: "TAEE11".into(),
            dy_12m: Some(dy_12m),
            dy_5y: Some(dy_12m),
        };
        let yields = vec![row(6.0), row(12.0)];

        attach_yields(&mut records, &yields);

        assert_eq!(records[0].dy_12m, Some(6.0));
        assert_eq!(records[0].dy_5y, Some(6.0));
    }
}

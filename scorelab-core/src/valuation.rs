//! Intrinsic-value estimates: Graham value, margin of safety, Bazin ceiling price.

use serde::{Deserialize, Serialize};

use crate::domain::record::finite;
use crate::domain::{CycleStatus, IndicatorRecord};

/// Graham's constant: 15 (max P/L) × 1.5 (max P/VP).
const GRAHAM_FACTOR: f64 = 22.5;

/// Bazin's required yield (6%).
const BAZIN_REQUIRED_YIELD: f64 = 0.06;

/// Derived valuation figures for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub ticker: String,
    pub price: Option<f64>,
    pub graham_value: Option<f64>,
    /// Percent gap between Graham value and price; 0 when not computable.
    pub margin_of_safety: f64,
    pub bazin_ceiling: Option<f64>,
    pub cycle: Option<CycleStatus>,
}

/// √(22.5 · EPS · BVPS), defined only when both are positive.
pub fn graham_value(eps: Option<f64>, bvps: Option<f64>) -> Option<f64> {
    let eps = finite(eps)?;
    let bvps = finite(bvps)?;
    if eps <= 0.0 || bvps <= 0.0 {
        return None;
    }
    Some((GRAHAM_FACTOR * eps * bvps).sqrt())
}

/// (Graham value − price) / price in percent.
///
/// Returns `0.0` whenever EPS, book value or price is missing or non-positive.
pub fn margin_of_safety(price: Option<f64>, eps: Option<f64>, bvps: Option<f64>) -> f64 {
    let Some(intrinsic) = graham_value(eps, bvps) else {
        return 0.0;
    };
    match finite(price) {
        Some(p) if p > 0.0 => (intrinsic - p) / p * 100.0,
        _ => 0.0,
    }
}

/// Average dividend per share implied by the 5-year yield, over the 6% hurdle.
pub fn bazin_ceiling(price: Option<f64>, dy_5y: Option<f64>) -> Option<f64> {
    let price = finite(price).filter(|p| *p > 0.0)?;
    let dy = finite(dy_5y).filter(|d| *d > 0.0)?;
    let dividend_per_share = price * dy / 100.0;
    Some(dividend_per_share / BAZIN_REQUIRED_YIELD)
}

/// Compute the valuation record for one asset.
pub fn value(row: &IndicatorRecord) -> ValuationRecord {
    ValuationRecord {
        ticker: row.ticker.clone(),
        price: finite(row.price),
        graham_value: graham_value(row.eps, row.book_value_per_share),
        margin_of_safety: margin_of_safety(row.price, row.eps, row.book_value_per_share),
        bazin_ceiling: bazin_ceiling(row.price, row.dy_5y),
        cycle: row.cycle,
    }
}

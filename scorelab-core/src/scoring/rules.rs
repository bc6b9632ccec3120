//! Point rules, one function per criterion.
//!
//! Each rule takes the raw optional value and returns the points it
//! contributes. A missing or non-finite input always yields `0.0`.

use crate::domain::record::finite;
use crate::domain::SectorClass;

/// Trailing 12-month dividend yield (%).
pub fn dividend_yield_12m(dy: Option<f64>) -> f64 {
    match finite(dy) {
        Some(v) if v > 5.0 => 20.0,
        Some(v) if v > 3.5 => 15.0,
        Some(v) if v > 2.0 => 10.0,
        Some(v) if v > 0.0 && v < 2.0 => -5.0,
        _ => 0.0,
    }
}

/// 5-year average dividend yield (%).
pub fn dividend_yield_5y(dy: Option<f64>) -> f64 {
    match finite(dy) {
        Some(v) if v > 8.0 => 25.0,
        Some(v) if v > 6.0 => 20.0,
        Some(v) if v > 4.0 => 10.0,
        _ => 0.0,
    }
}

/// Payout ratio (%).
pub fn payout(payout: Option<f64>) -> f64 {
    match finite(payout) {
        Some(v) if (30.0..=60.0).contains(&v) => 10.0,
        Some(v) if v > 60.0 && v <= 80.0 => 5.0,
        Some(v) if (v > 0.0 && v < 20.0) || v > 80.0 => -5.0,
        _ => 0.0,
    }
}

/// Return on equity (%). Financials use the more generous scale.
pub fn return_on_equity(roe: Option<f64>, class: SectorClass) -> f64 {
    let Some(v) = finite(roe) else {
        return 0.0;
    };
    if class.is_financial() {
        if v > 15.0 {
            25.0
        } else if v > 12.0 {
            20.0
        } else if v > 8.0 {
            10.0
        } else {
            0.0
        }
    } else if v > 12.0 {
        15.0
    } else if v > 8.0 {
        5.0
    } else {
        0.0
    }
}

/// Price / earnings. Non-positive ratios carry no signal.
pub fn price_to_earnings(pe: Option<f64>) -> f64 {
    match finite(pe) {
        Some(v) if v <= 0.0 => 0.0,
        Some(v) if v < 12.0 => 15.0,
        Some(v) if v < 18.0 => 10.0,
        Some(v) if v > 25.0 => -5.0,
        _ => 0.0,
    }
}

/// Price / book value. Non-positive ratios carry no signal.
pub fn price_to_book(pb: Option<f64>) -> f64 {
    match finite(pb) {
        Some(v) if v <= 0.0 => 0.0,
        Some(v) if v < 0.66 => 20.0,
        Some(v) if v < 1.5 => 10.0,
        Some(v) if v < 2.5 => 5.0,
        Some(v) if v > 4.0 => -5.0,
        _ => 0.0,
    }
}

/// Total debt / market cap. Not scored for financials.
pub fn debt_to_market_cap(ratio: Option<f64>, class: SectorClass) -> f64 {
    if class.is_financial() {
        return 0.0;
    }
    match finite(ratio) {
        Some(v) if v < 0.0 => 0.0,
        Some(v) if v < 0.5 => 10.0,
        Some(v) if v < 1.0 => 5.0,
        Some(v) if v > 2.0 => -5.0,
        _ => 0.0,
    }
}

/// Debt / EBITDA. Not scored for financials; non-positive ratios carry no signal.
pub fn debt_to_ebitda(ratio: Option<f64>, class: SectorClass) -> f64 {
    if class.is_financial() {
        return 0.0;
    }
    match finite(ratio) {
        Some(v) if v <= 0.0 => 0.0,
        Some(v) if v < 1.0 => 10.0,
        Some(v) if v < 2.0 => 5.0,
        Some(v) if v > 6.0 => -5.0,
        _ => 0.0,
    }
}

/// 5-year price growth (%).
pub fn growth_5y(growth: Option<f64>) -> f64 {
    match finite(growth) {
        Some(v) if v > 15.0 => 15.0,
        Some(v) if v > 10.0 => 10.0,
        Some(v) if v > 5.0 => 5.0,
        Some(v) if v < 0.0 => -5.0,
        _ => 0.0,
    }
}

/// Sentiment gauge (0–100), piecewise linear around 50:
/// +10 at 100, 0 at 50, −5 at 0.
pub fn sentiment(gauge: Option<f64>) -> f64 {
    let Some(g) = finite(gauge) else {
        return 0.0;
    };
    let g = g.clamp(0.0, 100.0);
    if g >= 50.0 {
        (g - 50.0) / 50.0 * 10.0
    } else {
        (g - 50.0) / 50.0 * 5.0
    }
}

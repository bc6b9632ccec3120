//! Threshold tables converting sub-sector aggregates into points.
//!
//! Every function takes an optional mean; `None` (no member had the field)
//! maps to a neutral `0.0`.

/// Weight of the distress penalty for the sub-sector with the most open events.
pub const DISTRESS_PENALTY_WEIGHT: f64 = 80.0;

/// Mean 5-year dividend yield (%).
pub fn dividend_yield(mean: Option<f64>) -> f64 {
    match mean {
        Some(v) if v >= 10.0 => 150.0,
        Some(v) if v >= 8.0 => 120.0,
        Some(v) if v >= 6.0 => 90.0,
        Some(v) if v >= 4.0 => 50.0,
        Some(v) if v >= 2.0 => 10.0,
        Some(v) if v >= 1.0 => -30.0,
        Some(_) => -90.0,
        None => 0.0,
    }
}

/// Mean ROE (%).
pub fn return_on_equity(mean: Option<f64>) -> f64 {
    match mean {
        Some(v) if v > 25.0 => 75.0,
        Some(v) if v > 20.0 => 55.0,
        Some(v) if v > 15.0 => 35.0,
        Some(v) if v > 10.0 => 15.0,
        _ => 0.0,
    }
}

/// Mean beta.
pub fn beta(mean: Option<f64>) -> f64 {
    match mean {
        Some(v) if v < 0.8 => 35.0,
        Some(v) if v <= 1.0 => 20.0,
        Some(v) if v <= 1.2 => 10.0,
        Some(v) if v <= 1.5 => 0.0,
        Some(_) => -20.0,
        None => 0.0,
    }
}

/// Mean payout (%).
pub fn payout(mean: Option<f64>) -> f64 {
    match mean {
        Some(v) if (30.0..=60.0).contains(&v) => 35.0,
        Some(v) if v > 60.0 && v <= 80.0 => 15.0,
        Some(v) if (20.0..30.0).contains(&v) => 10.0,
        _ => 0.0,
    }
}

/// Bonus for members above the high-quality threshold.
pub fn high_quality_count(count: usize) -> f64 {
    match count {
        c if c >= 5 => 40.0,
        c if c >= 3 => 25.0,
        c if c >= 1 => 10.0,
        _ => 0.0,
    }
}

/// Penalty for members below the low-quality threshold.
pub fn low_quality_count(count: usize) -> f64 {
    match count {
        c if c >= 5 => -40.0,
        c if c >= 3 => -25.0,
        c if c >= 1 => -10.0,
        _ => 0.0,
    }
}

/// Mean margin of safety (%).
pub fn margin_of_safety(mean: Option<f64>) -> f64 {
    match mean {
        Some(v) if v > 150.0 => 55.0,
        Some(v) if v > 100.0 => 40.0,
        Some(v) if v > 75.0 => 25.0,
        Some(v) if v >= 50.0 => 10.0,
        _ => 0.0,
    }
}

/// Distress penalty relative to the run's busiest sub-sector.
pub fn distress(count: usize, max_count: usize) -> f64 {
    if max_count == 0 || count == 0 {
        return 0.0;
    }
    -(count as f64 / max_count as f64) * DISTRESS_PENALTY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dividend_yield_extremes() {
        assert_eq!(dividend_yield(Some(12.0)), 150.0);
        assert_eq!(dividend_yield(Some(10.0)), 150.0);
        assert_eq!(dividend_yield(Some(7.0)), 90.0);
        assert_eq!(dividend_yield(Some(1.5)), -30.0);
        assert_eq!(dividend_yield(Some(0.5)), -90.0);
        assert_eq!(dividend_yield(None), 0.0);
    }

    #[test]
    fn roe_and_beta() {
        assert_eq!(return_on_equity(Some(30.0)), 75.0);
        assert_eq!(return_on_equity(Some(10.0)), 0.0);
        assert_eq!(beta(Some(0.5)), 35.0);
        assert_eq!(beta(Some(1.6)), -20.0);
        assert_eq!(beta(None), 0.0);
    }

    #[test]
    fn payout_band() {
        assert_eq!(payout(Some(45.0)), 35.0);
        assert_eq!(payout(Some(70.0)), 15.0);
        assert_eq!(payout(Some(25.0)), 10.0);
        assert_eq!(payout(Some(90.0)), 0.0);
    }

    #[test]
    fn quality_counts() {
        assert_eq!(high_quality_count(0), 0.0);
        assert_eq!(high_quality_count(2), 10.0);
        assert_eq!(high_quality_count(7), 40.0);
        assert_eq!(low_quality_count(3), -25.0);
    }

    #[test]
    fn margin_band() {
        assert_eq!(margin_of_safety(Some(200.0)), 55.0);
        assert_eq!(margin_of_safety(Some(50.0)), 10.0);
        assert_eq!(margin_of_safety(Some(49.9)), 0.0);
    }

    #[test]
    fn distress_is_relative_to_max() {
        assert_eq!(distress(4, 4), -80.0);
        assert_eq!(distress(2, 4), -40.0);
        assert_eq!(distress(0, 4), 0.0);
        assert_eq!(distress(0, 0), 0.0);
    }
}

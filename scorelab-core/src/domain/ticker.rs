//! Ticker normalization.
//!
//! Every table is joined on the normalized ticker: trimmed, upper-case, with
//! any exchange suffix (`PETR4.SA`, `VALE3.BVMF`) removed.

/// Normalize a raw ticker symbol into the join key used across all tables.
///
/// Returns `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let base = match trimmed.split_once('.') {
        Some((head, _suffix)) => head,
        None => trimmed,
    };
    let base = base.trim();
    if base.is_empty() {
        return None;
    }
    Some(base.to_uppercase())
}

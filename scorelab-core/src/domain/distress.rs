//! Corporate-distress events (judicial recovery filings).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One distress filing. The sector label is matched verbatim against sub-sector names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressEvent {
    pub company: String,
    pub sector_label: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub bankruptcy_date: Option<NaiveDate>,
}

impl DistressEvent {
    /// Still unresolved: neither exited nor converted into bankruptcy.
    pub fn is_open(&self) -> bool {
        self.exit_date.is_none() && self.bankruptcy_date.is_none()
    }
}

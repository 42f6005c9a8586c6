//! Message of the day entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A chat's message of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotdEntry {
    pub msg: String,

    /// Day the message was last set
    pub date: NaiveDate,
}

impl MotdEntry {
    /// Whether the message was set on `today`.
    pub fn is_fresh(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

//! Counter keys for cross-process daily accounting.
//!
//! Keys are derived purely from `(service_id, UTC date, kind)` so every
//! process computes the same remote key without coordinating.

use std::fmt;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ServiceId;

/// What a counter counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    /// Notifications sent today
    Count,
}

impl CounterKind {
    /// Key suffix for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Count => "count",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of a per-service daily counter in the distributed counter store.
///
/// Rendered as `"{service_id}-{YYYY-MM-DD}-{kind}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    /// Service being counted
    pub service_id: ServiceId,
    /// UTC calendar date
    pub date: NaiveDate,
    /// Counter kind
    pub kind: CounterKind,
}

impl CounterKey {
    /// Creates a counter key.
    pub fn new(service_id: ServiceId, date: NaiveDate, kind: CounterKind) -> Self {
        Self {
            service_id,
            date,
            kind,
        }
    }

    /// Key of today's (UTC) send count for `service_id`.
    pub fn daily_count(service_id: ServiceId) -> Self {
        Self::new(service_id, Utc::now().date_naive(), CounterKind::Count)
    }

    /// Renders the key as sent to the store.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.service_id,
            self.date.format("%Y-%m-%d"),
            self.kind
        )
    }
}

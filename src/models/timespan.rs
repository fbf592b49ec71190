use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A half-open interval `[start, end)`. Construction enforces `start < end`,
/// so every `TimeSpan` in the system is a valid interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AppError> {
        if start >= end {
            return Err(AppError::Validation(
                "end_at must be after start_at".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of RFC 3339 timestamps into a span.
    pub fn parse(start: &str, end: &str) -> Result<Self, AppError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    /// Strict half-open overlap. Spans that merely touch at a boundary
    /// (`self.end == other.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Inclusive at start, exclusive at end: a span ending exactly at `t`
    /// does not contain it.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Parse an RFC 3339 instant, normalized to whole seconds. Storage holds
/// second granularity, so sub-second digits are dropped here before any
/// interval validation or overlap math sees them.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc).trunc_subsecs(0))
        .map_err(|_| AppError::Validation(format!("invalid timestamp: {s}")))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resource::ResourceType;
use super::timespan::TimeSpan;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn span(&self) -> TimeSpan {
        // start_at < end_at is enforced on every write path
        TimeSpan {
            start: self.start_at,
            end: self.end_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "confirmed" => BookingStatus::Confirmed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }
}

/// Fired over the broadcast channel after a successful create/update/cancel.
/// Best-effort: no subscriber, no retry, and loss never touches stored state.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub kind: &'static str,
    pub booking: Booking,
}

impl BookingEvent {
    pub const CREATED: &'static str = "booking:created";
    pub const UPDATED: &'static str = "booking:updated";
    pub const CANCELLED: &'static str = "booking:cancelled";
}

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{Booking, ResourceStatus};

/// Resource ids with a blocking booking whose interval contains `now`.
/// Inclusive at start, exclusive at end: a booking ending exactly at `now`
/// does not occupy. Callers pass in the blocking-booking snapshot for one
/// resource kind; this never touches storage.
pub fn occupied_resource_ids(bookings: &[Booking], now: DateTime<Utc>) -> HashSet<&str> {
    bookings
        .iter()
        .filter(|b| b.span().contains(now))
        .map(|b| b.resource_id.as_str())
        .collect()
}

/// A resource counts as occupied only while administratively available.
/// Maintenance/disabled resources report `false`; their status field is the
/// visible unavailability signal, so no double-reporting.
pub fn occupied_now(status: ResourceStatus, resource_id: &str, occupied: &HashSet<&str>) -> bool {
    status == ResourceStatus::Available && occupied.contains(resource_id)
}

use chrono::{SubsecRound, Utc};
use rusqlite::Connection;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, ConflictDetails};
use crate::models::{Booking, BookingEvent, BookingStatus, ResourceType, TimeSpan, User};

/// Statuses that participate in overlap checks. The policy lives here alone:
/// a pending booking blocks a proposal just like a confirmed one, and a
/// cancelled one never does.
pub const BLOCK_STATUSES: &[BookingStatus] = &[BookingStatus::Pending, BookingStatus::Confirmed];

/// A validated proposal for a new booking. The span is well-formed by
/// construction; everything else is checked against the store on commit.
#[derive(Debug)]
pub struct NewBooking {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub span: TimeSpan,
    pub status: BookingStatus,
}

/// Partial update to an existing booking. Absent fields keep their current
/// value; start/end are recombined and re-validated as a pair.
#[derive(Debug, Default)]
pub struct BookingChange {
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<String>,
    pub start_at: Option<chrono::DateTime<Utc>>,
    pub end_at: Option<chrono::DateTime<Utc>>,
    pub status: Option<BookingStatus>,
}

impl BookingChange {
    fn is_empty(&self) -> bool {
        self.resource_type.is_none()
            && self.resource_id.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.status.is_none()
    }
}

fn ensure_resource_available(
    conn: &Connection,
    resource_type: ResourceType,
    resource_id: &str,
) -> Result<(), AppError> {
    let (kind, status) = match resource_type {
        ResourceType::Room => {
            let Some(room) = queries::get_room(conn, resource_id)? else {
                return Err(AppError::NotFound("room"));
            };
            ("room", room.status)
        }
        ResourceType::Equipment => {
            let Some(item) = queries::get_equipment(conn, resource_id)? else {
                return Err(AppError::NotFound("equipment"));
            };
            ("equipment", item.status)
        }
    };

    if status != crate::models::ResourceStatus::Available {
        return Err(AppError::ResourceUnavailable {
            kind,
            status: status.as_str().to_string(),
        });
    }
    Ok(())
}

/// First blocking booking on the resource that overlaps the candidate span.
/// One match is enough to reject, so which one is reported does not matter.
fn find_conflict(
    conn: &Connection,
    resource_type: ResourceType,
    resource_id: &str,
    span: TimeSpan,
    exclude: Option<&str>,
) -> Result<Option<ConflictDetails>, AppError> {
    let blocking = queries::find_blocking(conn, resource_type, resource_id, exclude, BLOCK_STATUSES)?;
    Ok(blocking
        .into_iter()
        .find(|b| b.span().overlaps(&span))
        .map(|b| ConflictDetails {
            id: b.id,
            start_at: b.start_at,
            end_at: b.end_at,
            status: b.status.as_str().to_string(),
        }))
}

/// Validate a proposal and commit it as one step. The caller holds the
/// connection lock for the duration, so no concurrent proposal can land
/// between the conflict check and the insert.
pub fn create(
    conn: &Connection,
    actor: &User,
    new: NewBooking,
    events: &broadcast::Sender<BookingEvent>,
) -> Result<Booking, AppError> {
    ensure_resource_available(conn, new.resource_type, &new.resource_id)?;

    if let Some(conflict) = find_conflict(conn, new.resource_type, &new.resource_id, new.span, None)?
    {
        return Err(AppError::Conflict(conflict));
    }

    // Same granularity as stored instants, so the response matches storage
    let now = Utc::now().trunc_subsecs(0);
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: actor.id.clone(),
        resource_type: new.resource_type,
        resource_id: new.resource_id,
        start_at: new.span.start,
        end_at: new.span.end,
        status: new.status,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(conn, &booking)?;

    let _ = events.send(BookingEvent {
        kind: BookingEvent::CREATED,
        booking: booking.clone(),
    });
    Ok(booking)
}

/// Apply a partial update, re-running the conflict check against the
/// proposed placement with the booking itself excluded. Like `create`, runs
/// entirely under the caller's connection lock.
pub fn update(
    conn: &Connection,
    actor: &User,
    id: &str,
    change: BookingChange,
    events: &broadcast::Sender<BookingEvent>,
) -> Result<Booking, AppError> {
    if change.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    let Some(existing) = queries::get_booking(conn, id)? else {
        return Err(AppError::NotFound("booking"));
    };

    if existing.user_id != actor.id && !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    if change.status.is_some() && !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    if existing.status == BookingStatus::Cancelled {
        // Terminal state; cancellation preserves history and nothing leaves it.
        return Err(AppError::Validation("booking is cancelled".to_string()));
    }

    let span = TimeSpan::new(
        change.start_at.unwrap_or(existing.start_at),
        change.end_at.unwrap_or(existing.end_at),
    )?;
    let resource_type = change.resource_type.unwrap_or(existing.resource_type);
    let resource_id = change
        .resource_id
        .unwrap_or_else(|| existing.resource_id.clone());
    let status = change.status.unwrap_or(existing.status);

    // Cancelling removes a blocking interval; that can never create an
    // overlap, so only non-cancel targets are re-validated.
    if status != BookingStatus::Cancelled {
        ensure_resource_available(conn, resource_type, &resource_id)?;
        if let Some(conflict) = find_conflict(conn, resource_type, &resource_id, span, Some(id))? {
            return Err(AppError::Conflict(conflict));
        }
    }

    let updated = Booking {
        resource_type,
        resource_id,
        start_at: span.start,
        end_at: span.end,
        status,
        updated_at: Utc::now().trunc_subsecs(0),
        ..existing
    };
    queries::update_booking(conn, &updated)?;

    let kind = if updated.status == BookingStatus::Cancelled {
        BookingEvent::CANCELLED
    } else {
        BookingEvent::UPDATED
    };
    let _ = events.send(BookingEvent {
        kind,
        booking: updated.clone(),
    });
    Ok(updated)
}

/// Owner- or admin-driven cancellation. Idempotent: cancelling an already
/// cancelled booking is a no-op and emits nothing.
pub fn cancel(
    conn: &Connection,
    actor: &User,
    id: &str,
    events: &broadcast::Sender<BookingEvent>,
) -> Result<Booking, AppError> {
    let Some(existing) = queries::get_booking(conn, id)? else {
        return Err(AppError::NotFound("booking"));
    };

    if existing.user_id != actor.id && !actor.is_admin() {
        return Err(AppError::Forbidden);
    }
    if existing.status == BookingStatus::Cancelled {
        return Ok(existing);
    }

    let cancelled = Booking {
        status: BookingStatus::Cancelled,
        updated_at: Utc::now().trunc_subsecs(0),
        ..existing
    };
    queries::update_booking(conn, &cancelled)?;

    let _ = events.send(BookingEvent {
        kind: BookingEvent::CANCELLED,
        booking: cancelled.clone(),
    });
    Ok(cancelled)
}

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::timespan::parse_instant;
use crate::models::{BookingStatus, ResourceType, TimeSpan};
use crate::services::{auth, scheduler};
use crate::state::AppState;

fn parse_status(s: &str) -> Result<BookingStatus, AppError> {
    match s {
        "pending" => Ok(BookingStatus::Pending),
        "confirmed" => Ok(BookingStatus::Confirmed),
        "cancelled" => Ok(BookingStatus::Cancelled),
        other => Err(AppError::Validation(format!("unknown status: {other}"))),
    }
}

fn parse_resource_type(s: &str) -> Result<ResourceType, AppError> {
    ResourceType::parse(s)
        .ok_or_else(|| AppError::Validation(format!("unknown resource type: {s}")))
}

// GET /api/bookings and GET /api/bookings/my
#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub resource_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn build_filter(query: &ListQuery) -> Result<queries::BookingFilter, AppError> {
    Ok(queries::BookingFilter {
        user_id: None,
        status: query.status.as_deref().map(parse_status).transpose()?,
        resource_type: query
            .resource_type
            .as_deref()
            .map(parse_resource_type)
            .transpose()?,
        from: query.from.as_deref().map(parse_instant).transpose()?,
        to: query.to.as_deref().map(parse_instant).transpose()?,
    })
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    let mut filter = build_filter(&query)?;

    let data: Vec<serde_json::Value> = if user.is_admin() {
        filter.user_id = query.user_id.clone();
        queries::list_bookings(&db, &filter)?
            .into_iter()
            .map(|(booking, owner)| {
                let mut value = serde_json::to_value(&booking).unwrap_or_default();
                value["user"] = serde_json::to_value(&owner).unwrap_or_default();
                value
            })
            .collect()
    } else {
        queries::list_bookings_for_user(&db, &user.id, &filter)?
            .into_iter()
            .map(|b| serde_json::to_value(&b).unwrap_or_default())
            .collect()
    };

    Ok(Json(serde_json::json!({ "bookings": data })))
}

pub async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    let filter = build_filter(&query)?;

    let bookings = queries::list_bookings_for_user(&db, &user.id, &filter)?;
    Ok(Json(serde_json::json!({ "bookings": bookings })))
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub start_at: String,
    pub end_at: String,
    pub status: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let resource_type = parse_resource_type(&body.resource_type)?;
    let span = TimeSpan::parse(&body.start_at, &body.end_at)?;
    if body.resource_id.is_empty() {
        return Err(AppError::Validation("resource_id is required".to_string()));
    }

    // Lock held from authentication through commit: the conflict check and
    // the insert happen as one indivisible step.
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;

    // Non-admins always get the default status
    let status = match body.status.as_deref().filter(|_| user.is_admin()) {
        Some(s) => match parse_status(s)? {
            BookingStatus::Cancelled => {
                return Err(AppError::Validation(
                    "cannot create a cancelled booking".to_string(),
                ))
            }
            other => other,
        },
        None => BookingStatus::Confirmed,
    };

    let booking = scheduler::create(
        &db,
        &user,
        scheduler::NewBooking {
            resource_type,
            resource_id: body.resource_id,
            span,
            status,
        },
        &state.events_tx,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "booking": booking })),
    ))
}

// PATCH /api/bookings/:id
#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub status: Option<String>,
}

pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let change = scheduler::BookingChange {
        resource_type: body
            .resource_type
            .as_deref()
            .map(parse_resource_type)
            .transpose()?,
        resource_id: body.resource_id,
        start_at: body.start_at.as_deref().map(parse_instant).transpose()?,
        end_at: body.end_at.as_deref().map(parse_instant).transpose()?,
        status: body.status.as_deref().map(parse_status).transpose()?,
    };

    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;

    let booking = scheduler::update(&db, &user, &id, change, &state.events_tx)?;
    Ok(Json(serde_json::json!({ "booking": booking })))
}

// DELETE /api/bookings/:id — cancellation, never removal
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;

    scheduler::cancel(&db, &user, &id, &state.events_tx)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

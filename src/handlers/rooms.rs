use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ResourceStatus, ResourceType, Room};
use crate::services::{auth, availability, scheduler};
use crate::state::AppState;

fn room_dto(room: &Room, occupied_now: bool) -> serde_json::Value {
    let mut value = serde_json::to_value(room).unwrap_or_default();
    value["occupied_now"] = occupied_now.into();
    value
}

// GET /api/rooms
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    auth::authenticate(&db, &headers)?;

    let now = Utc::now();
    let rooms = queries::list_rooms(&db)?;
    let blocking = queries::find_blocking_for_type(&db, ResourceType::Room, scheduler::BLOCK_STATUSES)?;
    let occupied = availability::occupied_resource_ids(&blocking, now);

    let data: Vec<serde_json::Value> = rooms
        .iter()
        .map(|r| room_dto(r, availability::occupied_now(r.status, &r.id, &occupied)))
        .collect();

    Ok(Json(serde_json::json!({ "rooms": data })))
}

// POST /api/rooms
#[derive(Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub capacity: i64,
    pub location: String,
    pub status: Option<ResourceStatus>,
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.len() < 2 || name.len() > 120 {
        return Err(AppError::Validation(
            "name must be 2-120 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_capacity(capacity: i64) -> Result<(), AppError> {
    if !(1..=1000).contains(&capacity) {
        return Err(AppError::Validation(
            "capacity must be between 1 and 1000".to_string(),
        ));
    }
    Ok(())
}

fn validate_location(location: &str) -> Result<(), AppError> {
    if location.len() < 2 || location.len() > 200 {
        return Err(AppError::Validation(
            "location must be 2-200 characters".to_string(),
        ));
    }
    Ok(())
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    let name = body.name.trim().to_string();
    let location = body.location.trim().to_string();
    validate_name(&name)?;
    validate_capacity(body.capacity)?;
    validate_location(&location)?;

    let room = Room {
        id: Uuid::new_v4().to_string(),
        name,
        capacity: body.capacity,
        location,
        status: body.status.unwrap_or(ResourceStatus::Available),
    };
    queries::create_room(&db, &room)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "room": room_dto(&room, false) })),
    ))
}

// PATCH /api/rooms/:id
#[derive(Deserialize)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub location: Option<String>,
    pub status: Option<ResourceStatus>,
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoomRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    if let Some(name) = &body.name {
        validate_name(name.trim())?;
    }
    if let Some(capacity) = body.capacity {
        validate_capacity(capacity)?;
    }
    if let Some(location) = &body.location {
        validate_location(location.trim())?;
    }

    let patch = queries::RoomPatch {
        name: body.name.map(|n| n.trim().to_string()),
        capacity: body.capacity,
        location: body.location.map(|l| l.trim().to_string()),
        status: body.status,
    };
    if patch.name.is_none()
        && patch.capacity.is_none()
        && patch.location.is_none()
        && patch.status.is_none()
    {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    if queries::get_room(&db, &id)?.is_none() {
        return Err(AppError::NotFound("room"));
    }
    queries::update_room(&db, &id, &patch)?;

    let room = queries::get_room(&db, &id)?.ok_or(AppError::NotFound("room"))?;
    Ok(Json(serde_json::json!({ "room": room_dto(&room, false) })))
}

// DELETE /api/rooms/:id
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    if !queries::delete_room(&db, &id)? {
        return Err(AppError::NotFound("room"));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

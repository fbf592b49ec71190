use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Equipment, ResourceStatus, ResourceType};
use crate::services::{auth, availability, scheduler};
use crate::state::AppState;

fn equipment_dto(item: &Equipment, occupied_now: bool) -> serde_json::Value {
    let mut value = serde_json::to_value(item).unwrap_or_default();
    value["occupied_now"] = occupied_now.into();
    value
}

fn validate_text(field: &'static str, value: &str) -> Result<(), AppError> {
    if value.len() < 2 || value.len() > 120 {
        return Err(AppError::Validation(format!(
            "{field} must be 2-120 characters"
        )));
    }
    Ok(())
}

// GET /api/equipment
pub async fn list_equipment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    auth::authenticate(&db, &headers)?;

    let now = Utc::now();
    let items = queries::list_equipment(&db)?;
    let blocking =
        queries::find_blocking_for_type(&db, ResourceType::Equipment, scheduler::BLOCK_STATUSES)?;
    let occupied = availability::occupied_resource_ids(&blocking, now);

    let data: Vec<serde_json::Value> = items
        .iter()
        .map(|e| equipment_dto(e, availability::occupied_now(e.status, &e.id, &occupied)))
        .collect();

    Ok(Json(serde_json::json!({ "equipment": data })))
}

// POST /api/equipment
#[derive(Deserialize)]
pub struct CreateEquipmentRequest {
    pub name: String,
    pub category: String,
    pub status: Option<ResourceStatus>,
}

pub async fn create_equipment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateEquipmentRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    let name = body.name.trim().to_string();
    let category = body.category.trim().to_string();
    validate_text("name", &name)?;
    validate_text("category", &category)?;

    let item = Equipment {
        id: Uuid::new_v4().to_string(),
        name,
        category,
        status: body.status.unwrap_or(ResourceStatus::Available),
    };
    queries::create_equipment(&db, &item)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "equipment": equipment_dto(&item, false) })),
    ))
}

// PATCH /api/equipment/:id
#[derive(Deserialize)]
pub struct UpdateEquipmentRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<ResourceStatus>,
}

pub async fn update_equipment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateEquipmentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    if let Some(name) = &body.name {
        validate_text("name", name.trim())?;
    }
    if let Some(category) = &body.category {
        validate_text("category", category.trim())?;
    }

    let patch = queries::EquipmentPatch {
        name: body.name.map(|n| n.trim().to_string()),
        category: body.category.map(|c| c.trim().to_string()),
        status: body.status,
    };
    if patch.name.is_none() && patch.category.is_none() && patch.status.is_none() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }

    if queries::get_equipment(&db, &id)?.is_none() {
        return Err(AppError::NotFound("equipment"));
    }
    queries::update_equipment(&db, &id, &patch)?;

    let item = queries::get_equipment(&db, &id)?.ok_or(AppError::NotFound("equipment"))?;
    Ok(Json(
        serde_json::json!({ "equipment": equipment_dto(&item, false) }),
    ))
}

// DELETE /api/equipment/:id
pub async fn delete_equipment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    auth::require_admin(&user)?;

    if !queries::delete_equipment(&db, &id)? {
        return Err(AppError::NotFound("equipment"));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

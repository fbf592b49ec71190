use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Role, User};
use crate::services::auth;
use crate::state::AppState;

fn user_dto(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
    })
}

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let name = body.name.trim().to_string();
    let email = body.email.trim().to_lowercase();

    if name.len() < 2 || name.len() > 80 {
        return Err(AppError::Validation(
            "name must be 2-80 characters".to_string(),
        ));
    }
    if !email.contains('@') || email.len() > 200 {
        return Err(AppError::Validation("invalid email".to_string()));
    }
    if body.password.len() < 6 || body.password.len() > 200 {
        return Err(AppError::Validation(
            "password must be 6-200 characters".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();

    if queries::get_user_by_email(&db, &email)?.is_some() {
        return Err(AppError::EmailInUse);
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        password_hash: auth::hash_password(&body.password)?,
        role: Role::User,
        created_at: Utc::now().naive_utc(),
    };
    queries::create_user(&db, &user)?;
    let token = auth::create_session(&db, &user.id, state.config.session_ttl_days)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "user": user_dto(&user), "token": token })),
    ))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = body.email.trim().to_lowercase();
    let db = state.db.lock().unwrap();

    // Same rejection whether the email or the password is wrong
    let user = queries::get_user_by_email(&db, &email)?.ok_or(AppError::Unauthorized)?;
    if !auth::verify_password(&body.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let token = auth::create_session(&db, &user.id, state.config.session_ttl_days)?;
    Ok(Json(
        serde_json::json!({ "user": user_dto(&user), "token": token }),
    ))
}

// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(token) = auth::bearer_token(&headers) {
        let db = state.db.lock().unwrap();
        queries::delete_session(&db, token)?;
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let user = auth::authenticate(&db, &headers)?;
    Ok(Json(serde_json::json!({ "user": user_dto(&user) })))
}

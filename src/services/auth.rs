use axum::http::HeaderMap;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha1::Sha1;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;

type HmacSha1 = Hmac<Sha1>;

/// Salted HMAC-SHA1 digest, stored as `salt$hash`.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest(&salt, password)?;
    Ok(format!("{salt}${digest}"))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    match digest(salt, password) {
        Ok(actual) => actual == expected,
        Err(_) => false,
    }
}

fn digest(salt: &str, password: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha1::new_from_slice(salt.as_bytes())?;
    mac.update(password.as_bytes());
    let result = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD.encode(result))
}

/// Mint an opaque session token valid for `ttl_days`.
pub fn create_session(conn: &Connection, user_id: &str, ttl_days: i64) -> anyhow::Result<String> {
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::days(ttl_days);
    queries::create_session(conn, &token, user_id, expires_at)?;
    Ok(token)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Resolve the request's bearer token to a user, or 401.
pub fn authenticate(conn: &Connection, headers: &HeaderMap) -> Result<User, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    authenticate_token(conn, token)
}

pub fn authenticate_token(conn: &Connection, token: &str) -> Result<User, AppError> {
    queries::get_session_user(conn, token)?.ok_or(AppError::Unauthorized)
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::json;
use tokio::sync::broadcast;
use tower::ServiceExt;

use studyspace::config::AppConfig;
use studyspace::db::{self, queries};
use studyspace::handlers;
use studyspace::models::{Booking, BookingStatus, Equipment, ResourceStatus, ResourceType, Room};
use studyspace::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 4000,
        database_url: ":memory:".to_string(),
        client_origin: "http://localhost:5173".to_string(),
        session_ttl_days: 7,
        auto_seed: false,
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    let (events_tx, _) = broadcast::channel(64);
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        events_tx,
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/rooms", get(handlers::rooms::list_rooms))
        .route("/api/rooms", post(handlers::rooms::create_room))
        .route("/api/rooms/:id", patch(handlers::rooms::update_room))
        .route("/api/rooms/:id", delete(handlers::rooms::delete_room))
        .route("/api/equipment", get(handlers::equipment::list_equipment))
        .route("/api/equipment", post(handlers::equipment::create_equipment))
        .route(
            "/api/equipment/:id",
            patch(handlers::equipment::update_equipment),
        )
        .route(
            "/api/equipment/:id",
            delete(handlers::equipment::delete_equipment),
        )
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/my", get(handlers::bookings::list_my_bookings))
        .route(
            "/api/bookings/:id",
            patch(handlers::bookings::update_booking),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::cancel_booking),
        )
        .with_state(state)
}

async fn request(
    state: &Arc<AppState>,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let app = test_app(state.clone());
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(v) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn register_user(state: &Arc<AppState>, name: &str, email: &str) -> String {
    let (status, json) = request(
        state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": name, "email": email, "password": "Secret123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {json}");
    json["token"].as_str().unwrap().to_string()
}

async fn register_admin(state: &Arc<AppState>, email: &str) -> String {
    let token = register_user(state, "Admin", email).await;
    {
        let db = state.db.lock().unwrap();
        db.execute(
            "UPDATE users SET role = 'admin' WHERE email = ?1",
            [email],
        )
        .unwrap();
    }
    token
}

fn insert_room(state: &Arc<AppState>, id: &str, status: ResourceStatus) {
    let db = state.db.lock().unwrap();
    queries::create_room(
        &db,
        &Room {
            id: id.to_string(),
            name: format!("Room {id}"),
            capacity: 8,
            location: "Building A".to_string(),
            status,
        },
    )
    .unwrap();
}

fn insert_equipment(state: &Arc<AppState>, id: &str, status: ResourceStatus) {
    let db = state.db.lock().unwrap();
    queries::create_equipment(
        &db,
        &Equipment {
            id: id.to_string(),
            name: format!("Equipment {id}"),
            category: "Projector".to_string(),
            status,
        },
    )
    .unwrap();
}

fn booking_body(resource_id: &str, start: &str, end: &str) -> serde_json::Value {
    json!({
        "resource_type": "room",
        "resource_id": resource_id,
        "start_at": start,
        "end_at": end,
    })
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = request(&state, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
}

// ── Auth ──

#[tokio::test]
async fn test_register_login_me_flow() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;

    let (status, json) = request(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["name"], "Alice");
    assert_eq!(json["user"]["role"], "user");

    // Duplicate email
    let (status, _) = request(
        &state,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({"name": "Alice 2", "email": "alice@example.com", "password": "Secret123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Login
    let (status, json) = request(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "Secret123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["token"].is_string());

    // Wrong password
    let (status, _) = request(
        &state,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_requires_token() {
    let state = test_state();
    let (status, _) = request(&state, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(&state, "GET", "/api/auth/me", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;

    let (status, _) = request(&state, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&state, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation() {
    let state = test_state();
    for body in [
        json!({"name": "A", "email": "a@example.com", "password": "Secret123!"}),
        json!({"name": "Alice", "email": "not-an-email", "password": "Secret123!"}),
        json!({"name": "Alice", "email": "a@example.com", "password": "short"}),
    ] {
        let (status, _) = request(&state, "POST", "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// ── Resource management ──

#[tokio::test]
async fn test_room_crud_requires_admin() {
    let state = test_state();
    let user_token = register_user(&state, "Alice", "alice@example.com").await;
    let admin_token = register_admin(&state, "admin@example.com").await;

    let room = json!({"name": "Sala A1", "capacity": 8, "location": "Building A"});

    let (status, _) = request(&state, "POST", "/api/rooms", Some(&user_token), Some(room.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) =
        request(&state, "POST", "/api/rooms", Some(&admin_token), Some(room)).await;
    assert_eq!(status, StatusCode::CREATED);
    let room_id = json["room"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["room"]["status"], "available");
    assert_eq!(json["room"]["occupied_now"], false);

    // Anyone signed in can list
    let (status, json) = request(&state, "GET", "/api/rooms", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rooms"].as_array().unwrap().len(), 1);

    // Patch to maintenance
    let (status, json) = request(
        &state,
        "PATCH",
        &format!("/api/rooms/{room_id}"),
        Some(&admin_token),
        Some(json!({"status": "maintenance"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["room"]["status"], "maintenance");

    // Delete
    let (status, _) = request(
        &state,
        "DELETE",
        &format!("/api/rooms/{room_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &state,
        "DELETE",
        &format!("/api/rooms/{room_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_room_field_validation() {
    let state = test_state();
    let admin_token = register_admin(&state, "admin@example.com").await;

    for body in [
        json!({"name": "X", "capacity": 8, "location": "Building A"}),
        json!({"name": "Sala A1", "capacity": 0, "location": "Building A"}),
        json!({"name": "Sala A1", "capacity": 8, "location": "B"}),
    ] {
        let (status, _) =
            request(&state, "POST", "/api/rooms", Some(&admin_token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_equipment_crud() {
    let state = test_state();
    let admin_token = register_admin(&state, "admin@example.com").await;

    let (status, json) = request(
        &state,
        "POST",
        "/api/equipment",
        Some(&admin_token),
        Some(json!({"name": "Projetor Epson", "category": "Projetor", "status": "disabled"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json["equipment"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["equipment"]["status"], "disabled");

    let (status, json) = request(
        &state,
        "PATCH",
        &format!("/api/equipment/{id}"),
        Some(&admin_token),
        Some(json!({"status": "available", "category": "Video"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["equipment"]["status"], "available");
    assert_eq!(json["equipment"]["category"], "Video");
}

// ── Booking lifecycle (the core) ──

#[tokio::test]
async fn test_booking_conflict_scenario() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    // Booking 1: [10:00, 11:00) succeeds
    let (status, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_id = json["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(json["booking"]["status"], "confirmed");

    // Booking 2: [10:30, 10:45) is strictly contained, rejected with the blocker
    let (status, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:30:00Z", "2024-01-01T10:45:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["conflict"]["id"], first_id.as_str());

    // Booking 3: [11:00, 12:00) merely touches, succeeds
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T11:00:00Z", "2024-01-01T12:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Cancel booking 1
    let (status, _) = request(
        &state,
        "DELETE",
        &format!("/api/bookings/{first_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Booking 4: the freed interval is bookable again
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T10:30:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_rejects_invalid_input() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    // Unparseable instant
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "yesterday", "2024-01-01T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // end before start
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T11:00:00Z", "2024-01-01T10:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown resource
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("nope", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_subsecond_input_normalized_to_storage_granularity() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    // Shorter than the storage granularity: empty once truncated, rejected
    // up front rather than persisted as a zero-width interval
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body(
            "room-x",
            "2024-01-01T10:00:00.200Z",
            "2024-01-01T10:00:00.800Z",
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Fractional digits on a real interval are dropped, and the response
    // reports the same instants the store holds
    let (status, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body(
            "room-x",
            "2024-01-01T10:00:00.500Z",
            "2024-01-01T11:00:00.999Z",
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["booking"]["start_at"], "2024-01-01T10:00:00Z");
    assert_eq!(json["booking"]["end_at"], "2024-01-01T11:00:00Z");

    // The truncated interval really blocks: the whole-second equivalent
    // conflicts instead of slipping past the overlap scan
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body(
            "room-x",
            "2024-01-01T10:00:00Z",
            "2024-01-01T11:00:00Z",
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_maintenance_room_rejects_every_proposal() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-m", ResourceStatus::Maintenance);

    let (status, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-m", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("maintenance"),
        "error should name the status, got: {json}"
    );
}

#[tokio::test]
async fn test_disabled_equipment_rejects_proposals() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_equipment(&state, "eq-d", ResourceStatus::Disabled);

    let (status, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(json!({
            "resource_type": "equipment",
            "resource_id": "eq-d",
            "start_at": "2024-01-01T10:00:00Z",
            "end_at": "2024-01-01T11:00:00Z",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("disabled"));
}

#[tokio::test]
async fn test_update_excludes_own_interval_but_not_others() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    let (_, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    // Shift against itself: fine
    let (status, json) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&token),
        Some(json!({"start_at": "2024-01-01T10:15:00Z", "end_at": "2024-01-01T11:15:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["start_at"], "2024-01-01T10:15:00Z");

    // A second booking, then try to move it onto the first
    let (_, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T12:00:00Z", "2024-01-01T13:00:00Z")),
    )
    .await;
    let second_id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, json) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{second_id}"),
        Some(&token),
        Some(json!({"start_at": "2024-01-01T10:30:00Z", "end_at": "2024-01-01T11:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["conflict"]["id"], id.as_str());
}

#[tokio::test]
async fn test_booking_authorization() {
    let state = test_state();
    let alice = register_user(&state, "Alice", "alice@example.com").await;
    let bob = register_user(&state, "Bob", "bob@example.com").await;
    let admin = register_admin(&state, "admin@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    let (_, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&alice),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    // A stranger may neither modify nor cancel
    let (status, _) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&bob),
        Some(json!({"start_at": "2024-01-01T09:00:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &state,
        "DELETE",
        &format!("/api/bookings/{id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner may not set status
    let (status, _) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&alice),
        Some(json!({"status": "pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The admin may
    let (status, json) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&admin),
        Some(json!({"status": "pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "pending");

    // Pending still blocks other users
    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&bob),
        Some(booking_body("room-x", "2024-01-01T10:30:00Z", "2024-01-01T11:30:00Z")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_is_idempotent_and_terminal() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    let admin = register_admin(&state, "admin@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    let (_, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, _) = request(
            &state,
            "DELETE",
            &format!("/api/bookings/{id}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Not even an admin can resurrect it
    let (status, _) = request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&admin),
        Some(json!({"status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Listing ──

#[tokio::test]
async fn test_booking_listing_scopes() {
    let state = test_state();
    let alice = register_user(&state, "Alice", "alice@example.com").await;
    let bob = register_user(&state, "Bob", "bob@example.com").await;
    let admin = register_admin(&state, "admin@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);
    insert_room(&state, "room-y", ResourceStatus::Available);

    request(
        &state,
        "POST",
        "/api/bookings",
        Some(&alice),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    request(
        &state,
        "POST",
        "/api/bookings",
        Some(&bob),
        Some(booking_body("room-y", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;

    // Non-admin sees only their own
    let (status, json) = request(&state, "GET", "/api/bookings", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookings"].as_array().unwrap().len(), 1);

    // Admin sees all, with the owner embedded
    let (status, json) = request(&state, "GET", "/api/bookings", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 2);
    assert!(bookings.iter().any(|b| b["user"]["email"] == "alice@example.com"));

    // Filter by resource type
    let (_, json) = request(
        &state,
        "GET",
        "/api/bookings?resource_type=room",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(json["bookings"].as_array().unwrap().len(), 2);

    let (_, json) = request(
        &state,
        "GET",
        "/api/bookings?resource_type=equipment",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(json["bookings"].as_array().unwrap().len(), 0);

    // /my ignores role
    let (_, json) = request(&state, "GET", "/api/bookings/my", Some(&admin), None).await;
    assert_eq!(json["bookings"].as_array().unwrap().len(), 0);
}

// ── Availability annotation ──

#[tokio::test]
async fn test_rooms_report_occupied_now() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-busy", ResourceStatus::Available);
    insert_room(&state, "room-free", ResourceStatus::Available);
    insert_room(&state, "room-maint", ResourceStatus::Maintenance);

    let now = Utc::now();
    let start = (now - Duration::minutes(30)).to_rfc3339();
    let end = (now + Duration::minutes(30)).to_rfc3339();

    let (status, _) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-busy", &start, &end)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // A booking on the maintenance room, inserted directly past the gate, must
    // still not mark it occupied
    {
        let db = state.db.lock().unwrap();
        let owner = queries::get_user_by_email(&db, "alice@example.com")
            .unwrap()
            .unwrap();
        queries::insert_booking(
            &db,
            &Booking {
                id: "direct-1".to_string(),
                user_id: owner.id,
                resource_type: ResourceType::Room,
                resource_id: "room-maint".to_string(),
                start_at: now - Duration::minutes(30),
                end_at: now + Duration::minutes(30),
                status: BookingStatus::Confirmed,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
    }

    let (_, json) = request(&state, "GET", "/api/rooms", Some(&token), None).await;
    let rooms = json["rooms"].as_array().unwrap();
    let by_id = |id: &str| {
        rooms
            .iter()
            .find(|r| r["id"] == id)
            .unwrap_or_else(|| panic!("room {id} missing"))
    };

    assert_eq!(by_id("room-busy")["occupied_now"], true);
    assert_eq!(by_id("room-free")["occupied_now"], false);
    assert_eq!(by_id("room-maint")["occupied_now"], false);
    assert_eq!(by_id("room-maint")["status"], "maintenance");
}

// ── Events ──

#[tokio::test]
async fn test_booking_events_emitted() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    let mut rx = state.events_tx.subscribe();

    let (_, json) = request(
        &state,
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("room-x", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")),
    )
    .await;
    let id = json["booking"]["id"].as_str().unwrap().to_string();

    request(
        &state,
        "PATCH",
        &format!("/api/bookings/{id}"),
        Some(&token),
        Some(json!({"end_at": "2024-01-01T11:30:00Z"})),
    )
    .await;
    request(
        &state,
        "DELETE",
        &format!("/api/bookings/{id}"),
        Some(&token),
        None,
    )
    .await;

    let created = rx.try_recv().unwrap();
    assert_eq!(created.kind, "booking:created");
    assert_eq!(created.booking.id, id);

    let updated = rx.try_recv().unwrap();
    assert_eq!(updated.kind, "booking:updated");

    let cancelled = rx.try_recv().unwrap();
    assert_eq!(cancelled.kind, "booking:cancelled");
    assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
}

// ── Concurrency ──

#[tokio::test]
async fn test_concurrent_overlapping_proposals_one_winner() {
    let state = test_state();
    let token = register_user(&state, "Alice", "alice@example.com").await;
    insert_room(&state, "room-x", ResourceStatus::Available);

    async fn propose(state: Arc<AppState>, token: String) -> StatusCode {
        let (status, _) = request(
            &state,
            "POST",
            "/api/bookings",
            Some(&token),
            Some(booking_body(
                "room-x",
                "2024-01-01T10:00:00Z",
                "2024-01-01T11:00:00Z",
            )),
        )
        .await;
        status
    }

    let a = tokio::spawn(propose(state.clone(), token.clone()));
    let b = tokio::spawn(propose(state.clone(), token.clone()));
    let mut statuses = vec![a.await.unwrap(), b.await.unwrap()];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
}

use chrono::{Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, Equipment, ResourceStatus, ResourceType, Role, Room, User};

use super::auth;

/// Demo fixtures for an empty database: two accounts, a handful of rooms
/// and equipment (one of each administratively unavailable), and a few
/// bookings including one active right now. Skipped when users exist.
pub fn seed_database(conn: &Connection) -> anyhow::Result<bool> {
    if queries::count_users(conn)? > 0 {
        return Ok(false);
    }

    let now = Utc::now();

    let admin = User {
        id: Uuid::new_v4().to_string(),
        name: "Admin User".to_string(),
        email: "admin@studyspace.local".to_string(),
        password_hash: auth::hash_password("Admin123!")?,
        role: Role::Admin,
        created_at: now.naive_utc(),
    };
    let student = User {
        id: Uuid::new_v4().to_string(),
        name: "Student User".to_string(),
        email: "student@studyspace.local".to_string(),
        password_hash: auth::hash_password("Student123!")?,
        role: Role::User,
        created_at: now.naive_utc(),
    };
    queries::create_user(conn, &admin)?;
    queries::create_user(conn, &student)?;

    let rooms = [
        ("Sala A1", 8, "Edificio A, Piso 1", ResourceStatus::Available),
        ("Sala A2", 12, "Edificio A, Piso 1", ResourceStatus::Available),
        ("Sala B1", 20, "Edificio B, Piso 0", ResourceStatus::Available),
        ("Sala C1", 6, "Edificio C, Piso 2", ResourceStatus::Maintenance),
        ("Sala D1", 16, "Edificio D, Piso 3", ResourceStatus::Available),
    ];
    let mut room_ids = vec![];
    for (name, capacity, location, status) in rooms {
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            capacity,
            location: location.to_string(),
            status,
        };
        queries::create_room(conn, &room)?;
        room_ids.push(room.id);
    }

    let equipment = [
        ("Projetor Epson X1", "Projetor", ResourceStatus::Available),
        ("Laptop Dell 14\"", "Laptop", ResourceStatus::Available),
        ("Camara Logitech", "Camara", ResourceStatus::Available),
        ("Microfone USB", "Audio", ResourceStatus::Available),
        ("Tablet iPad", "Tablet", ResourceStatus::Disabled),
    ];
    let mut equipment_ids = vec![];
    for (name, category, status) in equipment {
        let item = Equipment {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: category.to_string(),
            status,
        };
        queries::create_equipment(conn, &item)?;
        equipment_ids.push(item.id);
    }

    let bookings = [
        // Active right now, so one room lists as occupied
        Booking {
            id: Uuid::new_v4().to_string(),
            user_id: student.id.clone(),
            resource_type: ResourceType::Room,
            resource_id: room_ids[1].clone(),
            start_at: now - Duration::minutes(30),
            end_at: now + Duration::minutes(30),
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        },
        Booking {
            id: Uuid::new_v4().to_string(),
            user_id: admin.id.clone(),
            resource_type: ResourceType::Equipment,
            resource_id: equipment_ids[0].clone(),
            start_at: now + Duration::hours(24),
            end_at: now + Duration::hours(26),
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        },
        Booking {
            id: Uuid::new_v4().to_string(),
            user_id: student.id.clone(),
            resource_type: ResourceType::Room,
            resource_id: room_ids[0].clone(),
            start_at: now - Duration::hours(48),
            end_at: now - Duration::hours(47),
            status: BookingStatus::Cancelled,
            created_at: now,
            updated_at: now,
        },
    ];
    for booking in &bookings {
        queries::insert_booking(conn, booking)?;
    }

    tracing::info!(
        users = 2,
        rooms = room_ids.len(),
        equipment = equipment_ids.len(),
        "seeded empty database"
    );
    Ok(true)
}

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::models::{
    Booking, BookingStatus, Equipment, ResourceStatus, ResourceType, Role, Room, User,
};

/// Storage format for instants: fixed-width UTC so lexicographic comparison
/// in SQL matches temporal order.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

/// A malformed stored instant is corrupt data, not something to paper over
/// with a substitute value that would skew overlap math.
fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|n| n.and_utc())
        .with_context(|| format!("malformed stored timestamp: {s}"))
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id,
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = ?1",
        params![email],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_users(conn: &Connection) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::parse(&role_str),
        created_at,
    })
}

// ── Sessions ──

pub fn create_session(
    conn: &Connection,
    token: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, fmt_ts(expires_at)],
    )?;
    Ok(())
}

/// Resolve a session token to its user, ignoring expired sessions.
pub fn get_session_user(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let now = fmt_ts(Utc::now());
    let result = conn.query_row(
        "SELECT u.id, u.name, u.email, u.password_hash, u.role, u.created_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > ?2",
        params![token, now],
        |row| Ok(parse_user_row(row)),
    );

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(count > 0)
}

// ── Rooms ──

pub fn list_rooms(conn: &Connection) -> anyhow::Result<Vec<Room>> {
    let mut stmt =
        conn.prepare("SELECT id, name, capacity, location, status FROM rooms ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        let status_str: String = row.get(4)?;
        Ok(Room {
            id: row.get(0)?,
            name: row.get(1)?,
            capacity: row.get(2)?,
            location: row.get(3)?,
            status: ResourceStatus::parse(&status_str),
        })
    })?;

    let mut rooms = vec![];
    for row in rows {
        rooms.push(row?);
    }
    Ok(rooms)
}

pub fn get_room(conn: &Connection, id: &str) -> anyhow::Result<Option<Room>> {
    let result = conn.query_row(
        "SELECT id, name, capacity, location, status FROM rooms WHERE id = ?1",
        params![id],
        |row| {
            let status_str: String = row.get(4)?;
            Ok(Room {
                id: row.get(0)?,
                name: row.get(1)?,
                capacity: row.get(2)?,
                location: row.get(3)?,
                status: ResourceStatus::parse(&status_str),
            })
        },
    );

    match result {
        Ok(room) => Ok(Some(room)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_room(conn: &Connection, room: &Room) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rooms (id, name, capacity, location, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            room.id,
            room.name,
            room.capacity,
            room.location,
            room.status.as_str()
        ],
    )?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub location: Option<String>,
    pub status: Option<ResourceStatus>,
}

pub fn update_room(conn: &Connection, id: &str, patch: &RoomPatch) -> anyhow::Result<bool> {
    let mut sets: Vec<String> = vec![];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(name) = &patch.name {
        values.push(Box::new(name.clone()));
        sets.push(format!("name = ?{}", values.len()));
    }
    if let Some(capacity) = patch.capacity {
        values.push(Box::new(capacity));
        sets.push(format!("capacity = ?{}", values.len()));
    }
    if let Some(location) = &patch.location {
        values.push(Box::new(location.clone()));
        sets.push(format!("location = ?{}", values.len()));
    }
    if let Some(status) = patch.status {
        values.push(Box::new(status.as_str().to_string()));
        sets.push(format!("status = ?{}", values.len()));
    }

    if sets.is_empty() {
        return Ok(false);
    }

    values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE rooms SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );

    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, value_refs.as_slice())?;
    Ok(count > 0)
}

pub fn delete_room(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM rooms WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Equipment ──

pub fn list_equipment(conn: &Connection) -> anyhow::Result<Vec<Equipment>> {
    let mut stmt =
        conn.prepare("SELECT id, name, category, status FROM equipment ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        let status_str: String = row.get(3)?;
        Ok(Equipment {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            status: ResourceStatus::parse(&status_str),
        })
    })?;

    let mut items = vec![];
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn get_equipment(conn: &Connection, id: &str) -> anyhow::Result<Option<Equipment>> {
    let result = conn.query_row(
        "SELECT id, name, category, status FROM equipment WHERE id = ?1",
        params![id],
        |row| {
            let status_str: String = row.get(3)?;
            Ok(Equipment {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                status: ResourceStatus::parse(&status_str),
            })
        },
    );

    match result {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn create_equipment(conn: &Connection, item: &Equipment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO equipment (id, name, category, status) VALUES (?1, ?2, ?3, ?4)",
        params![item.id, item.name, item.category, item.status.as_str()],
    )?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct EquipmentPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub status: Option<ResourceStatus>,
}

pub fn update_equipment(
    conn: &Connection,
    id: &str,
    patch: &EquipmentPatch,
) -> anyhow::Result<bool> {
    let mut sets: Vec<String> = vec![];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(name) = &patch.name {
        values.push(Box::new(name.clone()));
        sets.push(format!("name = ?{}", values.len()));
    }
    if let Some(category) = &patch.category {
        values.push(Box::new(category.clone()));
        sets.push(format!("category = ?{}", values.len()));
    }
    if let Some(status) = patch.status {
        values.push(Box::new(status.as_str().to_string()));
        sets.push(format!("status = ?{}", values.len()));
    }

    if sets.is_empty() {
        return Ok(false);
    }

    values.push(Box::new(id.to_string()));
    let sql = format!(
        "UPDATE equipment SET {} WHERE id = ?{}",
        sets.join(", "),
        values.len()
    );

    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, value_refs.as_slice())?;
    Ok(count > 0)
}

pub fn delete_equipment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM equipment WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLS: &str =
    "id, user_id, resource_type, resource_id, start_at, end_at, status, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, resource_type, resource_id, start_at, end_at, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.user_id,
            booking.resource_type.as_str(),
            booking.resource_id,
            fmt_ts(booking.start_at),
            fmt_ts(booking.end_at),
            booking.status.as_str(),
            fmt_ts(booking.created_at),
            fmt_ts(booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET resource_type = ?1, resource_id = ?2, start_at = ?3, end_at = ?4, status = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            booking.resource_type.as_str(),
            booking.resource_id,
            fmt_ts(booking.start_at),
            fmt_ts(booking.end_at),
            booking.status.as_str(),
            fmt_ts(booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings in a blocking status for one resource, the set the scheduler
/// tests its overlap predicate against. `exclude` keeps an updated booking
/// from conflicting with its own prior state.
pub fn find_blocking(
    conn: &Connection,
    resource_type: ResourceType,
    resource_id: &str,
    exclude: Option<&str>,
    statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(resource_type.as_str().to_string()),
        Box::new(resource_id.to_string()),
    ];
    let mut sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings WHERE resource_type = ?1 AND resource_id = ?2"
    );

    if let Some(exclude_id) = exclude {
        values.push(Box::new(exclude_id.to_string()));
        sql.push_str(&format!(" AND id != ?{}", values.len()));
    }

    let placeholders: Vec<String> = statuses
        .iter()
        .map(|s| {
            values.push(Box::new(s.as_str().to_string()));
            format!("?{}", values.len())
        })
        .collect();
    sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
    sql.push_str(" ORDER BY start_at ASC");

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// All blocking bookings for one resource kind, the snapshot the
/// availability resolver derives `occupied_now` from.
pub fn find_blocking_for_type(
    conn: &Connection,
    resource_type: ResourceType,
    statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(resource_type.as_str().to_string())];
    let mut sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE resource_type = ?1");

    let placeholders: Vec<String> = statuses
        .iter()
        .map(|s| {
            values.push(Box::new(s.as_str().to_string()));
            format!("?{}", values.len())
        })
        .collect();
    sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Default)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub resource_type: Option<ResourceType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Admin listing: every booking matching the filter, newest first, with the
/// owning user embedded.
pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
) -> anyhow::Result<Vec<(Booking, UserSummary)>> {
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];
    let mut sql = format!(
        "SELECT b.{}, u.id, u.name, u.email, u.role
         FROM bookings b JOIN users u ON u.id = b.user_id
         WHERE 1=1",
        BOOKING_COLS.replace(", ", ", b.")
    );

    if let Some(user_id) = &filter.user_id {
        values.push(Box::new(user_id.clone()));
        sql.push_str(&format!(" AND b.user_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str().to_string()));
        sql.push_str(&format!(" AND b.status = ?{}", values.len()));
    }
    if let Some(resource_type) = filter.resource_type {
        values.push(Box::new(resource_type.as_str().to_string()));
        sql.push_str(&format!(" AND b.resource_type = ?{}", values.len()));
    }
    if let Some(from) = filter.from {
        values.push(Box::new(fmt_ts(from)));
        sql.push_str(&format!(" AND b.start_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.to {
        values.push(Box::new(fmt_ts(to)));
        sql.push_str(&format!(" AND b.start_at <= ?{}", values.len()));
    }

    sql.push_str(" ORDER BY b.start_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| {
        let role_str: String = row.get(12)?;
        let user = UserSummary {
            id: row.get(9)?,
            name: row.get(10)?,
            email: row.get(11)?,
            role: Role::parse(&role_str),
        };
        Ok((parse_booking_row(row), user))
    })?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, user) = row?;
        bookings.push((booking?, user));
    }
    Ok(bookings)
}

/// One user's bookings matching the filter, newest first.
pub fn list_bookings_for_user(
    conn: &Connection,
    user_id: &str,
    filter: &BookingFilter,
) -> anyhow::Result<Vec<Booking>> {
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(user_id.to_string())];
    let mut sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE user_id = ?1");

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str().to_string()));
        sql.push_str(&format!(" AND status = ?{}", values.len()));
    }
    if let Some(resource_type) = filter.resource_type {
        values.push(Box::new(resource_type.as_str().to_string()));
        sql.push_str(&format!(" AND resource_type = ?{}", values.len()));
    }
    if let Some(from) = filter.from {
        values.push(Box::new(fmt_ts(from)));
        sql.push_str(&format!(" AND start_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.to {
        values.push(Box::new(fmt_ts(to)));
        sql.push_str(&format!(" AND start_at <= ?{}", values.len()));
    }

    sql.push_str(" ORDER BY start_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let value_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(value_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let resource_type_str: String = row.get(2)?;
    let start_at_str: String = row.get(4)?;
    let end_at_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let resource_type = ResourceType::parse(&resource_type_str)
        .ok_or_else(|| anyhow::anyhow!("unknown resource type: {resource_type_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        resource_type,
        resource_id: row.get(3)?,
        start_at: parse_ts(&start_at_str)?,
        end_at: parse_ts(&end_at_str)?,
        status: BookingStatus::parse(&status_str),
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

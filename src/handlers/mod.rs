pub mod auth;
pub mod bookings;
pub mod equipment;
pub mod events;
pub mod health;
pub mod rooms;

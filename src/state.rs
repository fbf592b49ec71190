use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::BookingEvent;

pub struct AppState {
    /// Single connection behind a mutex. Write paths hold the lock across
    /// their whole check-then-write sequence, which is what keeps two
    /// concurrent overlapping proposals from both committing.
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub events_tx: broadcast::Sender<BookingEvent>,
}

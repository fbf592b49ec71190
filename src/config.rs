use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub client_origin: String,
    pub session_ttl_days: i64,
    pub auto_seed: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "studyspace.db".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            auto_seed: env::var("AUTO_SEED")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

pub mod auth;
pub mod availability;
pub mod scheduler;
pub mod seed;

pub mod booking;
pub mod resource;
pub mod timespan;
pub mod user;

pub use booking::{Booking, BookingEvent, BookingStatus};
pub use resource::{Equipment, ResourceStatus, ResourceType, Room};
pub use timespan::TimeSpan;
pub use user::{Role, User};

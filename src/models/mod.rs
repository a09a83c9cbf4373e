pub mod booking;
pub mod provider;
pub mod service;
pub mod slot;
pub mod user;
pub mod working_hours;

pub use booking::{Booking, BookingStatus};
pub use provider::Provider;
pub use service::Service;
pub use slot::Slot;
pub use user::{AuthToken, User};
pub use working_hours::{DayOfWeek, TimeOfDay, WorkingHourWindow};

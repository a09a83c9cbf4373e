pub mod availability;
pub mod bookings;
pub mod clock;
pub mod conflicts;
pub mod notify;

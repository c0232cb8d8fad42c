pub mod movie;
pub mod seat;
pub mod booking;
pub mod seat_rules;

pub use movie::{Movie, RowOrder};
pub use seat::{OccupiedSeatRow, Seat};
pub use booking::{Booking, BookingWithSeats};
pub use seat_rules::SeatSelectionRules;

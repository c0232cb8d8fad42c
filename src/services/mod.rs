pub mod bookings;
pub mod movies;
pub mod rules;
pub mod seat_selection;
pub mod seats;

pub use bookings::BookingsService;
pub use movies::MoviesService;
pub use rules::RulesService;
pub use seats::SeatsService;

pub mod balance;
pub mod error;
pub mod reservations;

pub use balance::BalanceService;
pub use error::ReservationError;
pub use reservations::{CancellationOutcome, ReservationRequest, ReservationService};

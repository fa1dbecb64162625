pub mod models;
pub mod repository;
pub mod rules;

pub use models::{
    Account, BalanceRequest, BalanceRequestStatus, ClassType, Contract, Coupon, FareType, Flight,
    FlightSeat, FlightStatus, Millimes, Reservation, ReservationStatus, Seat,
};
pub use repository::{Cancellation, ReservationRepository, StoreError, StoreResult};
pub use rules::ReservationRules;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

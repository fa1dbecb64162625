use tuniport_catalog::{PricingError, SeatingError};
use tuniport_core::{Millimes, StoreError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Flight {0} is not open for booking")]
    FlightClosed(String),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Seating(#[from] SeatingError),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Millimes,
        available: Millimes,
    },

    #[error("Seats were taken by concurrent bookings {0} times in a row")]
    SeatContention(u32),

    #[error("Reservation already cancelled: {0}")]
    AlreadyCancelled(Uuid),

    #[error("Balance request already processed: {0}")]
    AlreadyProcessed(Uuid),

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl ReservationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ReservationError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ReservationError::NotFound { entity, id },
            StoreError::InsufficientBalance { required, available } => {
                ReservationError::InsufficientBalance { required, available }
            }
            other => ReservationError::Store(other),
        }
    }
}

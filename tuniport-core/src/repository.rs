use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Account, BalanceRequest, BalanceRequestStatus, Contract, Coupon, Flight, FlightSeat, Millimes,
    Reservation,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Millimes,
        available: Millimes,
    },

    #[error("Seat already held: {0}")]
    SeatTaken(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<crate::CoreError> for StoreError {
    fn from(err: crate::CoreError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// State change applied when a reservation is cancelled
#[derive(Debug, Clone)]
pub struct Cancellation {
    pub reservation_id: Uuid,
    /// Amount credited back to the client; zero when not eligible
    pub refund: Millimes,
    pub cancelled_at: DateTime<Utc>,
}

/// Repository trait for reservation data access.
///
/// `commit_*` and `settle_balance_request` are atomic: either every row they
/// touch is written or none is.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>>;

    /// Every seat of the flight's plane with its hold state on that flight
    async fn list_flight_seats(&self, flight_id: Uuid) -> StoreResult<Vec<FlightSeat>>;

    async fn get_account(&self, user_id: Uuid) -> StoreResult<Option<Account>>;

    async fn find_active_contract(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Contract>>;

    async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn get_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>>;

    /// Newest first
    async fn list_reservations(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>>;

    /// Debit the client's account by the total price, hold every seat in
    /// `reservation.seat_ids` on the flight and insert the reservation.
    ///
    /// Fails with `InsufficientBalance` or `SeatTaken` when a concurrent
    /// writer got there first.
    async fn commit_reservation(&self, reservation: &Reservation) -> StoreResult<()>;

    /// Mark the reservation cancelled, release its seats and credit the refund.
    ///
    /// Fails with `Conflict` if the reservation is already cancelled.
    async fn commit_cancellation(&self, cancellation: &Cancellation) -> StoreResult<Reservation>;

    async fn create_balance_request(&self, request: &BalanceRequest) -> StoreResult<()>;

    async fn get_balance_request(&self, id: Uuid) -> StoreResult<Option<BalanceRequest>>;

    /// Move a pending request to `status`; approving credits the account.
    async fn settle_balance_request(
        &self,
        id: Uuid,
        status: BalanceRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<BalanceRequest>;
}

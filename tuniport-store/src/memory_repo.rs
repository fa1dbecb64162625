use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tuniport_core::{
    Account, BalanceRequest, BalanceRequestStatus, Cancellation, Contract, Coupon, Flight,
    FlightSeat, Reservation, ReservationRepository, ReservationStatus, Seat, StoreError,
    StoreResult,
};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    flights: HashMap<Uuid, Flight>,
    seats: Vec<Seat>,
    /// (flight_id, seat_id) -> holding reservation
    holds: HashMap<(Uuid, Uuid), Uuid>,
    accounts: HashMap<Uuid, Account>,
    contracts: Vec<Contract>,
    coupons: HashMap<String, Coupon>,
    reservations: HashMap<Uuid, Reservation>,
    balance_requests: HashMap<Uuid, BalanceRequest>,
}

/// Process-local repository used by tests and by the server when no
/// database is configured. Every operation runs under one lock, so the
/// atomic operations of `ReservationRepository` hold here as well.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

/// Rows loaded into the in-memory repository at startup (`[seed]` config
/// section, see `config/demo.toml`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub flights: Vec<Flight>,
    pub seats: Vec<Seat>,
    pub accounts: Vec<Account>,
    pub contracts: Vec<Contract>,
    pub coupons: Vec<Coupon>,
}

impl SeedData {
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty() && self.accounts.is_empty()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let repo = Self::new();
        {
            let mut tables = repo.tables();
            tables.flights.extend(seed.flights.into_iter().map(|f| (f.id, f)));
            tables.seats.extend(seed.seats);
            tables.accounts.extend(seed.accounts.into_iter().map(|a| (a.user_id, a)));
            tables.contracts.extend(seed.contracts);
            tables.coupons.extend(seed.coupons.into_iter().map(|c| (c.code.clone(), c)));
        }
        repo
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_flight(&self, flight: Flight) {
        self.tables().flights.insert(flight.id, flight);
    }

    pub fn add_seat(&self, seat: Seat) {
        self.tables().seats.push(seat);
    }

    pub fn add_account(&self, account: Account) {
        self.tables().accounts.insert(account.user_id, account);
    }

    pub fn add_contract(&self, contract: Contract) {
        self.tables().contracts.push(contract);
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        self.tables().coupons.insert(coupon.code.clone(), coupon);
    }
}

#[async_trait]
impl ReservationRepository for InMemoryRepository {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>> {
        Ok(self.tables().flights.get(&id).cloned())
    }

    async fn list_flight_seats(&self, flight_id: Uuid) -> StoreResult<Vec<FlightSeat>> {
        let tables = self.tables();
        let flight = match tables.flights.get(&flight_id) {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };

        Ok(tables
            .seats
            .iter()
            .filter(|s| s.plane_id == flight.plane_id)
            .map(|s| {
                let holder = tables.holds.get(&(flight_id, s.id)).copied();
                FlightSeat {
                    flight_id,
                    seat: s.clone(),
                    is_reserved: holder.is_some(),
                    reservation_id: holder,
                }
            })
            .collect())
    }

    async fn get_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.tables().accounts.get(&user_id).cloned())
    }

    async fn find_active_contract(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Contract>> {
        Ok(self
            .tables()
            .contracts
            .iter()
            .filter(|c| c.user_id == user_id && c.is_effective(at))
            .max_by_key(|c| c.starts_at)
            .cloned())
    }

    async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        Ok(self.tables().coupons.get(code).cloned())
    }

    async fn get_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.tables().reservations.get(&id).cloned())
    }

    async fn list_reservations(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .tables()
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn commit_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let mut tables = self.tables();

        // Validate everything before the first write
        let available = tables
            .accounts
            .get(&reservation.user_id)
            .map(|a| a.balance)
            .ok_or_else(|| StoreError::not_found("Account", reservation.user_id))?;
        if available < reservation.total_price {
            return Err(StoreError::InsufficientBalance {
                required: reservation.total_price,
                available,
            });
        }
        if let Some(taken) = reservation
            .seat_ids
            .iter()
            .find(|seat_id| tables.holds.contains_key(&(reservation.flight_id, **seat_id)))
        {
            return Err(StoreError::SeatTaken(*taken));
        }

        if let Some(account) = tables.accounts.get_mut(&reservation.user_id) {
            account.balance -= reservation.total_price;
            account.updated_at = reservation.created_at;
        }
        for seat_id in &reservation.seat_ids {
            tables.holds.insert((reservation.flight_id, *seat_id), reservation.id);
        }
        tables.reservations.insert(reservation.id, reservation.clone());

        Ok(())
    }

    async fn commit_cancellation(&self, cancellation: &Cancellation) -> StoreResult<Reservation> {
        let mut tables = self.tables();

        let reservation = tables
            .reservations
            .get(&cancellation.reservation_id)
            .ok_or_else(|| StoreError::not_found("Reservation", cancellation.reservation_id))?;
        if reservation.status == ReservationStatus::Cancelled {
            return Err(StoreError::Conflict(format!(
                "reservation {} is already cancelled",
                reservation.id
            )));
        }
        let (user_id, flight_id) = (reservation.user_id, reservation.flight_id);
        if cancellation.refund > 0 && !tables.accounts.contains_key(&user_id) {
            return Err(StoreError::not_found("Account", user_id));
        }

        tables.holds.retain(|(flight, _), holder| {
            !(*flight == flight_id && *holder == cancellation.reservation_id)
        });
        if cancellation.refund > 0 {
            if let Some(account) = tables.accounts.get_mut(&user_id) {
                account.balance += cancellation.refund;
                account.updated_at = cancellation.cancelled_at;
            }
        }

        let reservation = tables
            .reservations
            .get_mut(&cancellation.reservation_id)
            .ok_or_else(|| StoreError::not_found("Reservation", cancellation.reservation_id))?;
        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = cancellation.cancelled_at;

        Ok(reservation.clone())
    }

    async fn create_balance_request(&self, request: &BalanceRequest) -> StoreResult<()> {
        self.tables().balance_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_balance_request(&self, id: Uuid) -> StoreResult<Option<BalanceRequest>> {
        Ok(self.tables().balance_requests.get(&id).cloned())
    }

    async fn settle_balance_request(
        &self,
        id: Uuid,
        status: BalanceRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<BalanceRequest> {
        let mut tables = self.tables();

        let request = tables
            .balance_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Balance request", id))?;
        if request.status != BalanceRequestStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "balance request {} is already {}",
                id,
                request.status.as_str()
            )));
        }

        if status == BalanceRequestStatus::Approved {
            let account = tables
                .accounts
                .get_mut(&request.user_id)
                .ok_or_else(|| StoreError::not_found("Account", request.user_id))?;
            account.balance += request.amount;
            account.updated_at = at;
        }

        let stored = tables
            .balance_requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Balance request", id))?;
        stored.status = status;
        stored.processed_at = Some(at);

        Ok(stored.clone())
    }
}

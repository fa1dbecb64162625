use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tuniport_core::{
    Account, BalanceRequest, BalanceRequestStatus, Cancellation, Contract, Coupon, Flight,
    FlightSeat, Reservation, ReservationRepository, ReservationStatus, Seat, StoreError,
    StoreResult,
};
use uuid::Uuid;

/// Postgres-backed reservation repository. Each `commit_*` call runs in a
/// single transaction; guarded updates keep concurrent writers from
/// overdrawing an account or double-holding a seat.
pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    tracing::error!("Database error: {}", err);
    StoreError::Backend(err.to_string())
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    plane_id: Uuid,
    base_price: i64,
    status: String,
}

impl TryFrom<FlightRow> for Flight {
    type Error = StoreError;

    fn try_from(row: FlightRow) -> Result<Self, Self::Error> {
        Ok(Flight {
            id: row.id,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            plane_id: row.plane_id,
            base_price: row.base_price,
            status: row.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FlightSeatRow {
    id: Uuid,
    plane_id: Uuid,
    seat_number: String,
    class_type: String,
    is_reserved: bool,
    reservation_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct ContractRow {
    id: Uuid,
    user_id: Uuid,
    fixed_price: Option<i64>,
    coupon_code: Option<String>,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    code: String,
    discount_percent: i16,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    class_type: String,
    fare_type: String,
    passengers: i32,
    unit_price: i64,
    discount: i64,
    total_price: i64,
    coupon_code: Option<String>,
    contract_id: Option<Uuid>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReservationSeatRow {
    reservation_id: Uuid,
    seat_id: Uuid,
    seat_number: String,
}

#[derive(sqlx::FromRow)]
struct BalanceRequestRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BalanceRequestRow> for BalanceRequest {
    type Error = StoreError;

    fn try_from(row: BalanceRequestRow) -> Result<Self, Self::Error> {
        Ok(BalanceRequest {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            status: row.status.parse()?,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}

const RESERVATION_COLUMNS: &str = "id, user_id, flight_id, class_type, fare_type, passengers, unit_price, discount, total_price, coupon_code, contract_id, status, created_at, updated_at";

/// Seat rows keyed by reservation, each list kept in query order
fn group_seats(rows: Vec<ReservationSeatRow>) -> HashMap<Uuid, Vec<ReservationSeatRow>> {
    let mut grouped: HashMap<Uuid, Vec<ReservationSeatRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.reservation_id).or_default().push(row);
    }
    grouped
}

fn build_reservation(row: ReservationRow, seats: Vec<ReservationSeatRow>) -> StoreResult<Reservation> {
    Ok(Reservation {
        id: row.id,
        user_id: row.user_id,
        flight_id: row.flight_id,
        class_type: row.class_type.parse()?,
        fare_type: row.fare_type.parse()?,
        passengers: u32::try_from(row.passengers)
            .map_err(|_| StoreError::Backend(format!("negative passenger count on {}", row.id)))?,
        unit_price: row.unit_price,
        discount: row.discount,
        total_price: row.total_price,
        coupon_code: row.coupon_code,
        contract_id: row.contract_id,
        status: row.status.parse()?,
        seat_ids: seats.iter().map(|s| s.seat_id).collect(),
        seat_numbers: seats.into_iter().map(|s| s.seat_number).collect(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl StoreReservationRepository {
    async fn load_reservation(&self, row: ReservationRow) -> StoreResult<Reservation> {
        let seats: Vec<ReservationSeatRow> = sqlx::query_as(
            "SELECT reservation_id, seat_id, seat_number FROM reservation_seats WHERE reservation_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        build_reservation(row, seats)
    }

    async fn lock_reservation(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<ReservationRow> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {} FROM reservations WHERE id = $1 FOR UPDATE",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::not_found("Reservation", id))
    }
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            "SELECT id, flight_number, origin, destination, departure_time, arrival_time, plane_id, base_price, status FROM flights WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Flight::try_from).transpose()
    }

    async fn list_flight_seats(&self, flight_id: Uuid) -> StoreResult<Vec<FlightSeat>> {
        let rows: Vec<FlightSeatRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.plane_id, s.seat_number, s.class_type,
                   COALESCE(fsr.is_reserved, FALSE) AS is_reserved,
                   fsr.reservation_id
            FROM flights f
            JOIN seats s ON s.plane_id = f.plane_id
            LEFT JOIN flight_seat_reservations fsr
                   ON fsr.flight_id = f.id AND fsr.seat_id = s.id
            WHERE f.id = $1
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| -> StoreResult<FlightSeat> {
                Ok(FlightSeat {
                    flight_id,
                    seat: Seat {
                        id: row.id,
                        plane_id: row.plane_id,
                        seat_number: row.seat_number,
                        class_type: row.class_type.parse()?,
                    },
                    is_reserved: row.is_reserved,
                    reservation_id: row.reservation_id,
                })
            })
            .collect()
    }

    async fn get_account(&self, user_id: Uuid) -> StoreResult<Option<Account>> {
        let row: Option<(Uuid, i64, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, balance, updated_at FROM comptes WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        Ok(row.map(|(user_id, balance, updated_at)| Account {
            user_id,
            balance,
            updated_at,
        }))
    }

    async fn find_active_contract(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Contract>> {
        let row: Option<ContractRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, fixed_price, coupon_code, starts_at, ends_at, is_active
            FROM contracts
            WHERE user_id = $1 AND is_active AND starts_at <= $2
              AND (ends_at IS NULL OR ends_at > $2)
            ORDER BY starts_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| Contract {
            id: row.id,
            user_id: row.user_id,
            fixed_price: row.fixed_price,
            coupon_code: row.coupon_code,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            is_active: row.is_active,
        }))
    }

    async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            "SELECT code, discount_percent, valid_until, is_active FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> StoreResult<Coupon> {
            let discount_percent = u8::try_from(row.discount_percent).map_err(|_| {
                StoreError::Backend(format!("coupon {} has discount {}", row.code, row.discount_percent))
            })?;
            Ok(Coupon {
                code: row.code,
                discount_percent,
                valid_until: row.valid_until,
                is_active: row.is_active,
            })
        })
        .transpose()
    }

    async fn get_reservation(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.load_reservation(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_reservations(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reservations WHERE user_id = $1 ORDER BY created_at DESC",
            RESERVATION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let seats: Vec<ReservationSeatRow> = sqlx::query_as(
            "SELECT reservation_id, seat_id, seat_number FROM reservation_seats WHERE reservation_id = ANY($1) ORDER BY reservation_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut seats = group_seats(seats);
        let reservations = rows
            .into_iter()
            .map(|row| {
                let held = seats.remove(&row.id).unwrap_or_default();
                build_reservation(row, held)
            })
            .collect::<StoreResult<Vec<Reservation>>>()?;
        Ok(reservations)
    }

    async fn commit_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // 1. Debit, guarded so a concurrent debit cannot overdraw
        let debited = sqlx::query(
            "UPDATE comptes SET balance = balance - $1, updated_at = $2 WHERE user_id = $3 AND balance >= $1",
        )
        .bind(reservation.total_price)
        .bind(reservation.created_at)
        .bind(reservation.user_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if debited.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT balance FROM comptes WHERE user_id = $1")
                    .bind(reservation.user_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(backend)?;
            return Err(match available {
                Some(available) => StoreError::InsufficientBalance {
                    required: reservation.total_price,
                    available,
                },
                None => StoreError::not_found("Account", reservation.user_id),
            });
        }

        // 2. Reservation row
        sqlx::query(
            r#"
            INSERT INTO reservations (id, user_id, flight_id, class_type, fare_type, passengers, unit_price, discount, total_price, coupon_code, contract_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(reservation.id)
        .bind(reservation.user_id)
        .bind(reservation.flight_id)
        .bind(reservation.class_type.as_str())
        .bind(reservation.fare_type.as_str())
        .bind(reservation.passengers as i32)
        .bind(reservation.unit_price)
        .bind(reservation.discount)
        .bind(reservation.total_price)
        .bind(&reservation.coupon_code)
        .bind(reservation.contract_id)
        .bind(reservation.status.label())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        // 3. Seat holds; a held row is only taken over when it is free
        for (position, (seat_id, seat_number)) in reservation
            .seat_ids
            .iter()
            .zip(reservation.seat_numbers.iter())
            .enumerate()
        {
            let held = sqlx::query(
                r#"
                INSERT INTO flight_seat_reservations (flight_id, seat_id, is_reserved, reservation_id)
                VALUES ($1, $2, TRUE, $3)
                ON CONFLICT (flight_id, seat_id) DO UPDATE
                    SET is_reserved = TRUE, reservation_id = EXCLUDED.reservation_id
                    WHERE flight_seat_reservations.is_reserved = FALSE
                "#,
            )
            .bind(reservation.flight_id)
            .bind(seat_id)
            .bind(reservation.id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if held.rows_affected() == 0 {
                return Err(StoreError::SeatTaken(*seat_id));
            }

            sqlx::query(
                "INSERT INTO reservation_seats (reservation_id, seat_id, seat_number, position) VALUES ($1, $2, $3, $4)",
            )
            .bind(reservation.id)
            .bind(seat_id)
            .bind(seat_number)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn commit_cancellation(&self, cancellation: &Cancellation) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let mut row = Self::lock_reservation(&mut tx, cancellation.reservation_id).await?;
        let current: ReservationStatus = row.status.parse()?;
        if current == ReservationStatus::Cancelled {
            return Err(StoreError::Conflict(format!(
                "reservation {} is already cancelled",
                row.id
            )));
        }

        sqlx::query("UPDATE reservations SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(ReservationStatus::Cancelled.label())
            .bind(cancellation.cancelled_at)
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        sqlx::query(
            "UPDATE flight_seat_reservations SET is_reserved = FALSE, reservation_id = NULL WHERE reservation_id = $1",
        )
        .bind(row.id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if cancellation.refund > 0 {
            let credited = sqlx::query(
                "UPDATE comptes SET balance = balance + $1, updated_at = $2 WHERE user_id = $3",
            )
            .bind(cancellation.refund)
            .bind(cancellation.cancelled_at)
            .bind(row.user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if credited.rows_affected() == 0 {
                return Err(StoreError::not_found("Account", row.user_id));
            }
        }

        tx.commit().await.map_err(backend)?;

        row.status = ReservationStatus::Cancelled.label().to_string();
        row.updated_at = cancellation.cancelled_at;
        self.load_reservation(row).await
    }

    async fn create_balance_request(&self, request: &BalanceRequest) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO request_solde (id, user_id, amount, status, created_at, processed_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.amount)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.processed_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_balance_request(&self, id: Uuid) -> StoreResult<Option<BalanceRequest>> {
        let row: Option<BalanceRequestRow> = sqlx::query_as(
            "SELECT id, user_id, amount, status, created_at, processed_at FROM request_solde WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(BalanceRequest::try_from).transpose()
    }

    async fn settle_balance_request(
        &self,
        id: Uuid,
        status: BalanceRequestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<BalanceRequest> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row: BalanceRequestRow = sqlx::query_as(
            "SELECT id, user_id, amount, status, created_at, processed_at FROM request_solde WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::not_found("Balance request", id))?;

        let mut request = BalanceRequest::try_from(row)?;
        if request.status != BalanceRequestStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "balance request {} is already {}",
                id,
                request.status.as_str()
            )));
        }

        if status == BalanceRequestStatus::Approved {
            let credited = sqlx::query(
                "UPDATE comptes SET balance = balance + $1, updated_at = $2 WHERE user_id = $3",
            )
            .bind(request.amount)
            .bind(at)
            .bind(request.user_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if credited.rows_affected() == 0 {
                return Err(StoreError::not_found("Account", request.user_id));
            }
        }

        sqlx::query("UPDATE request_solde SET status = $1, processed_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(at)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        request.status = status;
        request.processed_at = Some(at);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuniport_core::{ClassType, FareType};

    fn reservation_row(id: Uuid) -> ReservationRow {
        let now = Utc::now();
        ReservationRow {
            id,
            user_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            class_type: "economy".to_string(),
            fare_type: "comfort".to_string(),
            passengers: 2,
            unit_price: 130_000,
            discount: 0,
            total_price: 260_000,
            coupon_code: None,
            contract_id: None,
            status: "Confirmée".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn seat_row(reservation_id: Uuid, seat_number: &str) -> ReservationSeatRow {
        ReservationSeatRow {
            reservation_id,
            seat_id: Uuid::new_v4(),
            seat_number: seat_number.to_string(),
        }
    }

    #[test]
    fn test_batched_seats_are_split_per_reservation() {
        let (first, second, empty) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rows = vec![
            seat_row(first, "4A"),
            seat_row(first, "4C"),
            seat_row(second, "12F"),
        ];

        let mut grouped = group_seats(rows);
        let a = build_reservation(reservation_row(first), grouped.remove(&first).unwrap_or_default()).unwrap();
        let b = build_reservation(reservation_row(second), grouped.remove(&second).unwrap_or_default()).unwrap();
        let c = build_reservation(reservation_row(empty), grouped.remove(&empty).unwrap_or_default()).unwrap();

        assert_eq!(a.seat_numbers, vec!["4A", "4C"]);
        assert_eq!(a.seat_ids.len(), 2);
        assert_eq!(b.seat_numbers, vec!["12F"]);
        assert!(c.seat_ids.is_empty());
        assert_eq!(a.class_type, ClassType::Economy);
        assert_eq!(a.fare_type, FareType::Comfort);
        assert_eq!(a.status, ReservationStatus::Confirmed);
    }

    #[test]
    fn test_unknown_status_label_is_a_backend_error() {
        let mut row = reservation_row(Uuid::new_v4());
        row.status = "Refunded".to_string();
        assert!(matches!(build_reservation(row, Vec::new()), Err(StoreError::Backend(_))));
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tuniport_catalog::{
    CouponSelection, PriceQuote, PricingEngine, PricingInput, SeatAllocator, SeatAvailability,
};
use tuniport_core::{
    Account, Cancellation, ClassType, Coupon, FareType, Flight, Millimes, Reservation,
    ReservationRepository, ReservationRules, ReservationStatus, StoreError,
};
use uuid::Uuid;

use crate::error::ReservationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    #[serde(alias = "flightId")]
    pub flight_id: Uuid,
    #[serde(alias = "classType")]
    pub class_type: ClassType,
    #[serde(alias = "fareType")]
    pub fare_type: FareType,
    #[serde(alias = "passengerCount", alias = "nbPassengers")]
    pub passengers: u32,
    #[serde(default, alias = "couponCode")]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub reservation: Reservation,
    pub refunded: bool,
    pub refunded_amount: Millimes,
    pub released_seats: Vec<String>,
}

/// Pricing, seat allocation and cancellation of partner reservations
pub struct ReservationService {
    repo: Arc<dyn ReservationRepository>,
    pricing: PricingEngine,
    rules: ReservationRules,
}

impl ReservationService {
    pub fn new(
        repo: Arc<dyn ReservationRepository>,
        pricing: PricingEngine,
        rules: ReservationRules,
    ) -> Self {
        Self { repo, pricing, rules }
    }

    pub fn rules(&self) -> &ReservationRules {
        &self.rules
    }

    /// Price preview, no writes
    pub async fn quote(&self, req: &ReservationRequest) -> Result<PriceQuote, ReservationError> {
        let (_, quote) = self.price(req, Utc::now()).await?;
        Ok(quote)
    }

    pub async fn reserve(&self, req: &ReservationRequest) -> Result<Reservation, ReservationError> {
        let now = Utc::now();
        let (flight, quote) = self.price(req, now).await?;

        let account = self.account(req.user_id).await?;
        if account.balance < quote.total {
            return Err(ReservationError::InsufficientBalance {
                required: quote.total,
                available: account.balance,
            });
        }

        let attempts = self.rules.seat_allocation_attempts.max(1);
        for attempt in 1..=attempts {
            let flight_seats = self.repo.list_flight_seats(flight.id).await?;
            let seats = {
                let mut rng = rand::thread_rng();
                SeatAllocator::allocate(&flight_seats, req.class_type, req.passengers, &mut rng)?
            };

            let reservation = Reservation {
                id: Uuid::new_v4(),
                user_id: req.user_id,
                flight_id: flight.id,
                class_type: req.class_type,
                fare_type: req.fare_type,
                passengers: req.passengers,
                unit_price: quote.unit_price,
                discount: quote.discount,
                total_price: quote.total,
                coupon_code: quote.coupon_code.clone(),
                contract_id: quote.contract_id,
                status: ReservationStatus::Confirmed,
                seat_ids: seats.iter().map(|s| s.id).collect(),
                seat_numbers: seats.into_iter().map(|s| s.seat_number).collect(),
                created_at: now,
                updated_at: now,
            };

            match self.repo.commit_reservation(&reservation).await {
                Ok(()) => {
                    info!(
                        "Reservation {} confirmed on {} for user {}: {} x {} {}, total {}",
                        reservation.id,
                        flight.flight_number,
                        reservation.user_id,
                        reservation.passengers,
                        reservation.class_type,
                        reservation.fare_type,
                        reservation.total_price
                    );
                    return Ok(reservation);
                }
                Err(StoreError::SeatTaken(seat_id)) => {
                    warn!(
                        "Seat {} on {} taken concurrently (attempt {}/{})",
                        seat_id, flight.flight_number, attempt, attempts
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ReservationError::SeatContention(attempts))
    }

    pub async fn cancel(&self, reservation_id: Uuid) -> Result<CancellationOutcome, ReservationError> {
        self.cancel_at(reservation_id, Utc::now()).await
    }

    pub async fn cancel_at(
        &self,
        reservation_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CancellationOutcome, ReservationError> {
        let reservation = self
            .repo
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Reservation", reservation_id))?;

        if reservation.status == ReservationStatus::Cancelled {
            return Err(ReservationError::AlreadyCancelled(reservation_id));
        }

        let flight = self
            .repo
            .get_flight(reservation.flight_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Flight", reservation.flight_id))?;

        let refunded = self.is_refund_eligible(&reservation, &flight, now);
        let refund = if refunded { reservation.total_price } else { 0 };

        let cancellation = Cancellation {
            reservation_id,
            refund,
            cancelled_at: now,
        };
        let cancelled = self
            .repo
            .commit_cancellation(&cancellation)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => ReservationError::AlreadyCancelled(reservation_id),
                other => other.into(),
            })?;

        info!(
            "Reservation {} cancelled, {} seat(s) released, refund {}",
            cancelled.id,
            cancelled.seat_numbers.len(),
            refund
        );

        Ok(CancellationOutcome {
            released_seats: cancelled.seat_numbers.clone(),
            reservation: cancelled,
            refunded,
            refunded_amount: refund,
        })
    }

    /// Confirmed, refundable fare, and departure beyond the cutoff
    pub fn is_refund_eligible(&self, reservation: &Reservation, flight: &Flight, now: DateTime<Utc>) -> bool {
        reservation.status == ReservationStatus::Confirmed
            && reservation.fare_type.is_refundable()
            && flight.departure_time - now > Duration::hours(self.rules.refund_cutoff_hours)
    }

    pub async fn get_reservation(&self, id: Uuid) -> Result<Reservation, ReservationError> {
        self.repo
            .get_reservation(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Reservation", id))
    }

    pub async fn list_reservations(&self, user_id: Uuid) -> Result<Vec<Reservation>, ReservationError> {
        Ok(self.repo.list_reservations(user_id).await?)
    }

    pub async fn seat_availability(&self, flight_id: Uuid) -> Result<SeatAvailability, ReservationError> {
        let flight = self
            .repo
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Flight", flight_id))?;
        let seats = self.repo.list_flight_seats(flight.id).await?;
        Ok(SeatAllocator::availability(flight.id, &seats))
    }

    pub async fn account(&self, user_id: Uuid) -> Result<Account, ReservationError> {
        self.repo
            .get_account(user_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Account", user_id))
    }

    async fn price(
        &self,
        req: &ReservationRequest,
        now: DateTime<Utc>,
    ) -> Result<(Flight, PriceQuote), ReservationError> {
        let flight = self
            .repo
            .get_flight(req.flight_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Flight", req.flight_id))?;

        if !flight.is_open_for_booking(now) {
            return Err(ReservationError::FlightClosed(flight.flight_number));
        }

        let contract = self.repo.find_active_contract(req.user_id, now).await?;

        let requested_code = req
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let requested: Option<(&str, Option<Coupon>)> = match requested_code {
            Some(code) => Some((code, self.repo.get_coupon(code).await?)),
            None => None,
        };

        let contract_coupon = match (&requested, contract.as_ref().and_then(|c| c.coupon_code.as_deref())) {
            (None, Some(code)) => self.repo.get_coupon(code).await?,
            _ => None,
        };

        let coupon = match (&requested, &contract_coupon) {
            (Some((code, coupon)), _) => CouponSelection::Requested {
                code: *code,
                coupon: coupon.as_ref(),
            },
            (None, Some(c)) => CouponSelection::Contract(c),
            (None, None) => CouponSelection::None,
        };

        let quote = self.pricing.quote(&PricingInput {
            flight: &flight,
            class_type: req.class_type,
            fare_type: req.fare_type,
            passengers: req.passengers,
            contract: contract.as_ref(),
            coupon,
            at: now,
        })?;

        Ok((flight, quote))
    }
}

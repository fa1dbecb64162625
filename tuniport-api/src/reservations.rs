use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tuniport_catalog::PriceQuote;
use tuniport_core::{Millimes, Reservation};
use tuniport_order::{CancellationOutcome, ReservationRequest};
use uuid::Uuid;

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub reservation: ReservationResponse,
    pub refunded: bool,
    pub refunded_amount: Millimes,
    pub released_seats: Vec<String>,
}

impl ReservationResponse {
    fn new(reservation: Reservation, state: &AppState) -> Self {
        Self {
            reservation,
            currency: state.currency().to_string(),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reservations", post(create_reservation))
        .route("/api/reservations/quote", post(quote_reservation))
        .route("/api/reservations/{id}", get(get_reservation))
        .route("/api/reservations/{id}/cancel", post(cancel_reservation))
        .route("/api/users/{user_id}/reservations", get(list_reservations))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/reservations/quote
/// Price preview for a reservation request
async fn quote_reservation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReservationRequest>,
) -> Result<Json<QuoteResponse>, AppError> {
    let quote = state.reservations.quote(&req).await?;

    Ok(Json(QuoteResponse {
        quote,
        currency: state.currency().to_string(),
    }))
}

/// POST /api/reservations
/// Price, debit the balance and allocate seats
async fn create_reservation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), AppError> {
    let reservation = state.reservations.reserve(&req).await?;

    Ok((StatusCode::CREATED, Json(ReservationResponse::new(reservation, &state))))
}

/// GET /api/reservations/{id}
async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationResponse>, AppError> {
    let reservation = state.reservations.get_reservation(id).await?;

    Ok(Json(ReservationResponse::new(reservation, &state)))
}

/// GET /api/users/{user_id}/reservations
async fn list_reservations(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ReservationResponse>>, AppError> {
    let reservations = state.reservations.list_reservations(user_id).await?;

    Ok(Json(
        reservations
            .into_iter()
            .map(|r| ReservationResponse::new(r, &state))
            .collect(),
    ))
}

/// POST /api/reservations/{id}/cancel
/// Cancel, release seats and refund when eligible
async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancellationResponse>, AppError> {
    let CancellationOutcome {
        reservation,
        refunded,
        refunded_amount,
        released_seats,
    } = state.reservations.cancel(id).await?;

    Ok(Json(CancellationResponse {
        reservation: ReservationResponse::new(reservation, &state),
        refunded,
        refunded_amount,
        released_seats,
    }))
}

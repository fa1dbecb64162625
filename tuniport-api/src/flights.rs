use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tuniport_catalog::SeatAvailability;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/flights/{id}/seats", get(seat_availability))
}

/// GET /api/flights/{id}/seats
/// Free seats per class on a flight
async fn seat_availability(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<SeatAvailability>, AppError> {
    let availability = state.reservations.seat_availability(flight_id).await?;
    Ok(Json(availability))
}

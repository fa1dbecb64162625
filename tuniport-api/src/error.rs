use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tuniport_order::ReservationError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    PaymentRequiredError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentRequiredError(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// `Json` extractor whose rejections (bad syntax, missing fields, unknown
/// enum values) come back as a 400 `{"error": ...}` body
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        let msg = err.to_string();
        match err {
            ReservationError::NotFound { .. } => AppError::NotFoundError(msg),
            ReservationError::Validation(_)
            | ReservationError::FlightClosed(_)
            | ReservationError::Pricing(_) => AppError::ValidationError(msg),
            ReservationError::InsufficientBalance { .. } => AppError::PaymentRequiredError(msg),
            ReservationError::Seating(_)
            | ReservationError::SeatContention(_)
            | ReservationError::AlreadyCancelled(_)
            | ReservationError::AlreadyProcessed(_) => AppError::ConflictError(msg),
            ReservationError::Store(_) => AppError::InternalServerError(msg),
        }
    }
}

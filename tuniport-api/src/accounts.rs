use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuniport_core::{BalanceRequest, Millimes};
use uuid::Uuid;

use crate::error::{ApiJson, AppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user_id: Uuid,
    pub balance: Millimes,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceRequestBody {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    pub amount: Millimes,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/{user_id}/account", get(get_account))
        .route("/api/request-solde", post(submit_balance_request))
        .route("/api/request-solde/{id}", get(get_balance_request))
        .route("/api/request-solde/{id}/approve", post(approve_balance_request))
        .route("/api/request-solde/{id}/reject", post(reject_balance_request))
}

/// GET /api/users/{user_id}/account
async fn get_account(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.reservations.account(user_id).await?;

    Ok(Json(AccountResponse {
        user_id: account.user_id,
        balance: account.balance,
        currency: state.currency().to_string(),
        updated_at: account.updated_at,
    }))
}

/// POST /api/request-solde
async fn submit_balance_request(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BalanceRequestBody>,
) -> Result<(StatusCode, Json<BalanceRequest>), AppError> {
    let request = state.balances.submit(body.user_id, body.amount).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/request-solde/{id}
async fn get_balance_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceRequest>, AppError> {
    Ok(Json(state.balances.get(id).await?))
}

/// POST /api/request-solde/{id}/approve
async fn approve_balance_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceRequest>, AppError> {
    Ok(Json(state.balances.approve(id).await?))
}

/// POST /api/request-solde/{id}/reject
async fn reject_balance_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BalanceRequest>, AppError> {
    Ok(Json(state.balances.reject(id).await?))
}

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use tuniport_core::{
    BalanceRequest, BalanceRequestStatus, Millimes, ReservationRepository, StoreError,
};
use uuid::Uuid;

use crate::error::ReservationError;

/// Top-up requests against a client's prepaid balance
pub struct BalanceService {
    repo: Arc<dyn ReservationRepository>,
}

impl BalanceService {
    pub fn new(repo: Arc<dyn ReservationRepository>) -> Self {
        Self { repo }
    }

    pub async fn submit(&self, user_id: Uuid, amount: Millimes) -> Result<BalanceRequest, ReservationError> {
        if amount <= 0 {
            return Err(ReservationError::Validation(format!(
                "top-up amount must be positive, got {}",
                amount
            )));
        }
        if self.repo.get_account(user_id).await?.is_none() {
            return Err(ReservationError::not_found("Account", user_id));
        }

        let request = BalanceRequest {
            id: Uuid::new_v4(),
            user_id,
            amount,
            status: BalanceRequestStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.repo.create_balance_request(&request).await?;

        info!("Balance request {} submitted by {} for {}", request.id, user_id, amount);
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> Result<BalanceRequest, ReservationError> {
        self.repo
            .get_balance_request(id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Balance request", id))
    }

    /// Credits the account and closes the request in one step
    pub async fn approve(&self, id: Uuid) -> Result<BalanceRequest, ReservationError> {
        self.settle(id, BalanceRequestStatus::Approved).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<BalanceRequest, ReservationError> {
        self.settle(id, BalanceRequestStatus::Rejected).await
    }

    async fn settle(&self, id: Uuid, status: BalanceRequestStatus) -> Result<BalanceRequest, ReservationError> {
        let request = self
            .repo
            .settle_balance_request(id, status, Utc::now())
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => ReservationError::AlreadyProcessed(id),
                other => other.into(),
            })?;

        info!("Balance request {} {}", id, request.status.as_str());
        Ok(request)
    }
}

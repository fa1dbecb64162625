use std::sync::Arc;
use tuniport_catalog::{PricingConfig, PricingEngine};
use tuniport_core::{ReservationRepository, ReservationRules};
use tuniport_order::{BalanceService, ReservationService};

#[derive(Clone)]
pub struct AppState {
    pub reservations: Arc<ReservationService>,
    pub balances: Arc<BalanceService>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn ReservationRepository>,
        pricing: PricingConfig,
        rules: ReservationRules,
    ) -> Self {
        Self {
            reservations: Arc::new(ReservationService::new(
                repo.clone(),
                PricingEngine::new(pricing),
                rules,
            )),
            balances: Arc::new(BalanceService::new(repo)),
        }
    }

    pub fn currency(&self) -> &str {
        &self.reservations.rules().currency
    }
}

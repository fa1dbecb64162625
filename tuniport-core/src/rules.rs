use serde::{Deserialize, Serialize};

/// Business rules applied by the reservation workflows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRules {
    /// Refunds are only granted when departure is further away than this
    #[serde(default = "default_refund_cutoff_hours")]
    pub refund_cutoff_hours: i64,
    /// Allocation retries when a concurrent booking takes a picked seat
    #[serde(default = "default_seat_allocation_attempts")]
    pub seat_allocation_attempts: u32,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_refund_cutoff_hours() -> i64 { 24 }
fn default_seat_allocation_attempts() -> u32 { 3 }
fn default_currency() -> String { "TND".to_string() }

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            refund_cutoff_hours: default_refund_cutoff_hours(),
            seat_allocation_attempts: default_seat_allocation_attempts(),
            currency: default_currency(),
        }
    }
}

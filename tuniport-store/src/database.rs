use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};
use serde_json::Value;
use tuniport_catalog::PricingConfig;
use tuniport_core::ReservationRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay the `business_rules` table on top of the file configuration.
    pub async fn fetch_business_rules(
        &self,
        pricing: PricingConfig,
        rules: ReservationRules,
    ) -> Result<(PricingConfig, ReservationRules), sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        let mut pricing = pricing;
        let mut rules = rules;
        for (key, value) in rows {
            if !apply_rule(&mut pricing, &mut rules, &key, &value) {
                warn!("Ignoring business rule {} = {}", key, value);
            }
        }

        Ok((pricing, rules))
    }
}

/// Expected format: {"value": <number/string>}. Returns false when the key is
/// unknown or the value has the wrong type.
fn apply_rule(pricing: &mut PricingConfig, rules: &mut ReservationRules, key: &str, raw: &Value) -> bool {
    let v = match raw.get("value") {
        Some(v) => v,
        None => return false,
    };

    match key {
        "economy_multiplier" => v.as_f64().map(|f| pricing.economy_multiplier = f).is_some(),
        "business_multiplier" => v.as_f64().map(|f| pricing.business_multiplier = f).is_some(),
        "light_multiplier" => v.as_f64().map(|f| pricing.light_multiplier = f).is_some(),
        "comfort_multiplier" => v.as_f64().map(|f| pricing.comfort_multiplier = f).is_some(),
        "max_passengers" => v
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .map(|u| pricing.max_passengers = u)
            .is_some(),
        "refund_cutoff_hours" => v.as_i64().map(|h| rules.refund_cutoff_hours = h).is_some(),
        "seat_allocation_attempts" => v
            .as_u64()
            .and_then(|u| u32::try_from(u).ok())
            .map(|u| rules.seat_allocation_attempts = u)
            .is_some(),
        "currency" => v.as_str().map(|s| rules.currency = s.to_string()).is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_rule() {
        let mut pricing = PricingConfig::default();
        let mut rules = ReservationRules::default();

        assert!(apply_rule(&mut pricing, &mut rules, "business_multiplier", &json!({"value": 2.5})));
        assert!(apply_rule(&mut pricing, &mut rules, "refund_cutoff_hours", &json!({"value": 48})));
        assert_eq!(pricing.business_multiplier, 2.5);
        assert_eq!(rules.refund_cutoff_hours, 48);

        assert!(!apply_rule(&mut pricing, &mut rules, "business_multiplier", &json!({"value": "high"})));
        assert!(!apply_rule(&mut pricing, &mut rules, "unknown_key", &json!({"value": 1})));
        assert!(!apply_rule(&mut pricing, &mut rules, "currency", &json!("EUR")));
        assert_eq!(pricing.business_multiplier, 2.5);
        assert_eq!(rules.currency, "TND");
    }
}

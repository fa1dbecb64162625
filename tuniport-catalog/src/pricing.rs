use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuniport_core::{ClassType, Contract, Coupon, FareType, Flight, Millimes};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub economy_multiplier: f64,
    pub business_multiplier: f64,
    pub light_multiplier: f64,
    pub comfort_multiplier: f64,

    /// Maximum passengers on a single reservation
    pub max_passengers: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            economy_multiplier: 1.0,
            business_multiplier: 2.0,
            light_multiplier: 1.0,
            comfort_multiplier: 1.3,
            max_passengers: 9,
        }
    }
}

/// Where the coupon applied to a quote came from
#[derive(Debug, Clone, Copy)]
pub enum CouponSelection<'a> {
    None,
    /// Code entered by the client; it must resolve to a valid coupon
    Requested {
        code: &'a str,
        coupon: Option<&'a Coupon>,
    },
    /// Coupon attached to the client's contract, dropped once it lapses
    Contract(&'a Coupon),
}

#[derive(Debug, Clone)]
pub struct PricingInput<'a> {
    pub flight: &'a Flight,
    pub class_type: ClassType,
    pub fare_type: FareType,
    pub passengers: u32,
    pub contract: Option<&'a Contract>,
    pub coupon: CouponSelection<'a>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub flight_id: Uuid,
    pub class_type: ClassType,
    pub fare_type: FareType,
    pub passengers: u32,
    /// Per-passenger price before discount
    pub unit_price: Millimes,
    pub subtotal: Millimes,
    pub discount_percent: u8,
    pub discount: Millimes,
    pub total: Millimes,
    pub coupon_code: Option<String>,
    pub contract_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Passenger count must be between 1 and {max}, got {requested}")]
    InvalidPassengerCount { requested: u32, max: u32 },

    #[error("Coupon is unknown, inactive or expired: {0}")]
    InvalidCoupon(String),

    #[error("Invalid price configuration: {0}")]
    InvalidPrice(String),
}

/// Ticket pricing for partner reservations
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn class_multiplier(&self, class_type: ClassType) -> f64 {
        match class_type {
            ClassType::Economy => self.config.economy_multiplier,
            ClassType::Business => self.config.business_multiplier,
        }
    }

    pub fn fare_multiplier(&self, fare_type: FareType) -> f64 {
        match fare_type {
            FareType::Light => self.config.light_multiplier,
            FareType::Comfort => self.config.comfort_multiplier,
        }
    }

    /// Per-passenger price. A contract fixing the ticket price replaces the
    /// catalogue fare outright, multipliers included.
    pub fn unit_price(
        &self,
        flight: &Flight,
        class_type: ClassType,
        fare_type: FareType,
        contract: Option<&Contract>,
    ) -> Result<Millimes, PricingError> {
        if let Some(fixed) = contract.and_then(|c| c.fixed_price) {
            if fixed < 0 {
                return Err(PricingError::InvalidPrice(format!("negative contract price {}", fixed)));
            }
            return Ok(fixed);
        }

        if flight.base_price < 0 {
            return Err(PricingError::InvalidPrice(format!(
                "negative base price {} on flight {}",
                flight.base_price, flight.flight_number
            )));
        }

        let multiplier = self.class_multiplier(class_type) * self.fare_multiplier(fare_type);
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(PricingError::InvalidPrice(format!("multiplier {}", multiplier)));
        }

        Ok(round_millimes(flight.base_price as f64 * multiplier))
    }

    pub fn quote(&self, input: &PricingInput<'_>) -> Result<PriceQuote, PricingError> {
        if input.passengers == 0 || input.passengers > self.config.max_passengers {
            return Err(PricingError::InvalidPassengerCount {
                requested: input.passengers,
                max: self.config.max_passengers,
            });
        }

        // Contracts outside their window do not apply
        let contract = input.contract.filter(|c| c.is_effective(input.at));

        let unit_price = self.unit_price(input.flight, input.class_type, input.fare_type, contract)?;
        let subtotal = unit_price
            .checked_mul(input.passengers as Millimes)
            .ok_or_else(|| overflow(unit_price, input.passengers))?;

        let coupon = match input.coupon {
            CouponSelection::None => None,
            CouponSelection::Requested { code, coupon } => match coupon {
                Some(c) if c.is_valid(input.at) => Some(c),
                _ => return Err(PricingError::InvalidCoupon(code.to_string())),
            },
            CouponSelection::Contract(c) => Some(c).filter(|c| c.is_valid(input.at)),
        };

        let discount_percent = coupon.map_or(0, |c| c.discount_percent.min(100));
        let discount =
            percent_of(subtotal, discount_percent).ok_or_else(|| overflow(unit_price, input.passengers))?;
        let total = (subtotal - discount).max(0);

        Ok(PriceQuote {
            flight_id: input.flight.id,
            class_type: input.class_type,
            fare_type: input.fare_type,
            passengers: input.passengers,
            unit_price,
            subtotal,
            discount_percent,
            discount,
            total,
            coupon_code: coupon.map(|c| c.code.clone()),
            contract_id: contract.map(|c| c.id),
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

fn round_millimes(value: f64) -> Millimes {
    value.round() as Millimes
}

/// Half-up percentage of a non-negative amount, `None` on overflow
fn percent_of(amount: Millimes, percent: u8) -> Option<Millimes> {
    amount
        .checked_mul(percent as Millimes)?
        .checked_add(50)
        .map(|scaled| scaled / 100)
}

fn overflow(unit_price: Millimes, passengers: u32) -> PricingError {
    PricingError::InvalidPrice(format!(
        "{} passengers at {} overflows the price range",
        passengers, unit_price
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tuniport_core::FlightStatus;

    fn flight(base_price: Millimes) -> Flight {
        let now = Utc::now();
        Flight {
            id: Uuid::new_v4(),
            flight_number: "TU214".to_string(),
            origin: "TUN".to_string(),
            destination: "ORY".to_string(),
            departure_time: now + Duration::days(3),
            arrival_time: now + Duration::days(3) + Duration::hours(2),
            plane_id: Uuid::new_v4(),
            base_price,
            status: FlightStatus::Scheduled,
        }
    }

    fn coupon(code: &str, percent: u8) -> Coupon {
        Coupon {
            code: code.to_string(),
            discount_percent: percent,
            valid_until: None,
            is_active: true,
        }
    }

    fn input<'a>(flight: &'a Flight, class_type: ClassType, fare_type: FareType, passengers: u32) -> PricingInput<'a> {
        PricingInput {
            flight,
            class_type,
            fare_type,
            passengers,
            contract: None,
            coupon: CouponSelection::None,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_base_fare() {
        let engine = PricingEngine::default();
        let f = flight(100_000);

        let quote = engine.quote(&input(&f, ClassType::Economy, FareType::Light, 1)).unwrap();
        assert_eq!(quote.unit_price, 100_000);
        assert_eq!(quote.total, 100_000);
        assert_eq!(quote.discount, 0);
    }

    #[test]
    fn test_multipliers_and_passengers() {
        let engine = PricingEngine::default();
        let f = flight(100_000);

        // 100 TND x 2.0 (business) x 1.3 (comfort) x 2 passengers
        let quote = engine.quote(&input(&f, ClassType::Business, FareType::Comfort, 2)).unwrap();
        assert_eq!(quote.unit_price, 260_000);
        assert_eq!(quote.subtotal, 520_000);
        assert_eq!(quote.total, 520_000);
    }

    #[test]
    fn test_requested_coupon_discount() {
        let engine = PricingEngine::default();
        let f = flight(100_000);
        let c = coupon("PARTNER10", 10);

        let mut req = input(&f, ClassType::Business, FareType::Comfort, 2);
        req.coupon = CouponSelection::Requested { code: "PARTNER10", coupon: Some(&c) };

        let quote = engine.quote(&req).unwrap();
        assert_eq!(quote.discount_percent, 10);
        assert_eq!(quote.discount, 52_000);
        assert_eq!(quote.total, 468_000);
        assert_eq!(quote.coupon_code.as_deref(), Some("PARTNER10"));
    }

    #[test]
    fn test_unknown_or_expired_requested_coupon_is_rejected() {
        let engine = PricingEngine::default();
        let f = flight(100_000);

        let mut req = input(&f, ClassType::Economy, FareType::Light, 1);
        req.coupon = CouponSelection::Requested { code: "NOPE", coupon: None };
        assert_eq!(engine.quote(&req), Err(PricingError::InvalidCoupon("NOPE".to_string())));

        let mut expired = coupon("OLD", 20);
        expired.valid_until = Some(Utc::now() - Duration::days(1));
        req.coupon = CouponSelection::Requested { code: "OLD", coupon: Some(&expired) };
        assert!(matches!(engine.quote(&req), Err(PricingError::InvalidCoupon(_))));
    }

    #[test]
    fn test_contract_fixed_price_and_lapsed_contract_coupon() {
        let engine = PricingEngine::default();
        let f = flight(100_000);
        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            fixed_price: Some(150_000),
            coupon_code: Some("CORP".to_string()),
            starts_at: now - Duration::days(30),
            ends_at: None,
            is_active: true,
        };
        let mut lapsed = coupon("CORP", 15);
        lapsed.is_active = false;

        let mut req = input(&f, ClassType::Business, FareType::Comfort, 3);
        req.contract = Some(&contract);
        req.coupon = CouponSelection::Contract(&lapsed);

        let quote = engine.quote(&req).unwrap();
        assert_eq!(quote.unit_price, 150_000);
        assert_eq!(quote.total, 450_000);
        assert_eq!(quote.discount, 0);
        assert_eq!(quote.coupon_code, None);
        assert_eq!(quote.contract_id, Some(contract.id));
    }

    #[test]
    fn test_contract_outside_window_is_ignored() {
        let engine = PricingEngine::default();
        let f = flight(100_000);
        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            fixed_price: Some(10_000),
            coupon_code: None,
            starts_at: now - Duration::days(30),
            ends_at: Some(now - Duration::days(1)),
            is_active: true,
        };

        let mut req = input(&f, ClassType::Economy, FareType::Light, 1);
        req.contract = Some(&contract);

        let quote = engine.quote(&req).unwrap();
        assert_eq!(quote.unit_price, 100_000);
        assert_eq!(quote.contract_id, None);
    }

    #[test]
    fn test_passenger_bounds() {
        let engine = PricingEngine::default();
        let f = flight(100_000);

        assert!(matches!(
            engine.quote(&input(&f, ClassType::Economy, FareType::Light, 0)),
            Err(PricingError::InvalidPassengerCount { requested: 0, max: 9 })
        ));
        assert!(engine.quote(&input(&f, ClassType::Economy, FareType::Light, 10)).is_err());
    }

    #[test]
    fn test_rounding_to_whole_millimes() {
        let engine = PricingEngine::default();
        let f = flight(99_999);

        // 99 999 x 1.3 = 129 998.7
        let quote = engine.quote(&input(&f, ClassType::Economy, FareType::Comfort, 1)).unwrap();
        assert_eq!(quote.unit_price, 129_999);
        assert_eq!(percent_of(129_999, 15), Some(19_500));
    }

    #[test]
    fn test_huge_contract_price_is_rejected() {
        let engine = PricingEngine::default();
        let f = flight(100_000);
        let contract = Contract {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            fixed_price: Some(Millimes::MAX / 4),
            coupon_code: None,
            starts_at: Utc::now() - Duration::days(1),
            ends_at: None,
            is_active: true,
        };

        let mut req = input(&f, ClassType::Economy, FareType::Light, 9);
        req.contract = Some(&contract);
        assert!(matches!(engine.quote(&req), Err(PricingError::InvalidPrice(_))));

        // subtotal fits, the discount scaling does not
        let c = coupon("BIG", 50);
        let mut req = input(&f, ClassType::Economy, FareType::Light, 2);
        req.contract = Some(&contract);
        req.coupon = CouponSelection::Requested { code: "BIG", coupon: Some(&c) };
        assert!(matches!(engine.quote(&req), Err(PricingError::InvalidPrice(_))));
    }
}

pub mod pricing;
pub mod seating;

pub use pricing::{CouponSelection, PriceQuote, PricingConfig, PricingEngine, PricingError, PricingInput};
pub use seating::{ClassAvailability, SeatAllocator, SeatAvailability, SeatingError};

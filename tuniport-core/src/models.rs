use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Amounts are stored in millimes (1 TND = 1000 millimes).
pub type Millimes = i64;

/// Ticket tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    #[serde(alias = "Economy", alias = "ECONOMY")]
    Economy,
    #[serde(alias = "Business", alias = "BUSINESS")]
    Business,
}

impl ClassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Economy => "economy",
            ClassType::Business => "business",
        }
    }
}

impl FromStr for ClassType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(ClassType::Economy),
            "business" => Ok(ClassType::Business),
            other => Err(CoreError::ValidationError(format!("unknown class type '{}'", other))),
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fare tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FareType {
    #[serde(alias = "Light", alias = "LIGHT")]
    Light,
    #[serde(alias = "Comfort", alias = "COMFORT")]
    Comfort,
}

impl FareType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FareType::Light => "light",
            FareType::Comfort => "comfort",
        }
    }

    /// Light fares are sold without refund rights.
    pub fn is_refundable(&self) -> bool {
        matches!(self, FareType::Comfort)
    }
}

impl FromStr for FareType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(FareType::Light),
            "comfort" => Ok(FareType::Comfort),
            other => Err(CoreError::ValidationError(format!("unknown fare type '{}'", other))),
        }
    }
}

impl fmt::Display for FareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation status, serialized with the labels the portal displays
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationStatus {
    #[serde(rename = "Confirmée")]
    Confirmed,
    #[serde(rename = "En attente")]
    Pending,
    #[serde(rename = "Annulée")]
    Cancelled,
}

impl ReservationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "Confirmée",
            ReservationStatus::Pending => "En attente",
            ReservationStatus::Cancelled => "Annulée",
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Confirmée" => Ok(ReservationStatus::Confirmed),
            "En attente" => Ok(ReservationStatus::Pending),
            "Annulée" => Ok(ReservationStatus::Cancelled),
            other => Err(CoreError::ValidationError(format!("unknown reservation status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Departed,
    Cancelled,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "SCHEDULED",
            FlightStatus::Delayed => "DELAYED",
            FlightStatus::Departed => "DEPARTED",
            FlightStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_bookable(&self) -> bool {
        matches!(self, FlightStatus::Scheduled | FlightStatus::Delayed)
    }
}

impl FromStr for FlightStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(FlightStatus::Scheduled),
            "DELAYED" => Ok(FlightStatus::Delayed),
            "DEPARTED" => Ok(FlightStatus::Departed),
            "CANCELLED" => Ok(FlightStatus::Cancelled),
            other => Err(CoreError::ValidationError(format!("unknown flight status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub plane_id: Uuid,
    pub base_price: Millimes,
    pub status: FlightStatus,
}

impl Flight {
    pub fn is_open_for_booking(&self, now: DateTime<Utc>) -> bool {
        self.status.is_bookable() && self.departure_time > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: Uuid,
    pub plane_id: Uuid,
    pub seat_number: String,
    pub class_type: ClassType,
}

/// A plane seat as seen on one flight, with its hold state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightSeat {
    pub flight_id: Uuid,
    pub seat: Seat,
    pub is_reserved: bool,
    pub reservation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub class_type: ClassType,
    pub fare_type: FareType,
    pub passengers: u32,
    pub unit_price: Millimes,
    pub discount: Millimes,
    pub total_price: Millimes,
    pub coupon_code: Option<String>,
    pub contract_id: Option<Uuid>,
    pub status: ReservationStatus,
    pub seat_ids: Vec<Uuid>,
    pub seat_numbers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// B2B pricing agreement between the airline and a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fixed_price: Option<Millimes>,
    pub coupon_code: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Contract {
    pub fn is_effective(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= at && self.ends_at.map_or(true, |end| at < end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    /// Whole percent, 0..=100
    pub discount_percent: u8,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Coupon {
    pub fn is_valid(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.discount_percent <= 100 && self.valid_until.map_or(true, |end| at < end)
    }
}

/// Prepaid client balance ("compte")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: Uuid,
    pub balance: Millimes,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl BalanceRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceRequestStatus::Pending => "PENDING",
            BalanceRequestStatus::Approved => "APPROVED",
            BalanceRequestStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for BalanceRequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BalanceRequestStatus::Pending),
            "APPROVED" => Ok(BalanceRequestStatus::Approved),
            "REJECTED" => Ok(BalanceRequestStatus::Rejected),
            other => Err(CoreError::ValidationError(format!("unknown balance request status '{}'", other))),
        }
    }
}

/// Client request to top up the prepaid balance ("request solde")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Millimes,
    pub status: BalanceRequestStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

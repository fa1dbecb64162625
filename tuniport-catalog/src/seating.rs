use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tuniport_core::{ClassType, FlightSeat, Seat};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SeatingError {
    #[error("Not enough {class} seats: requested {requested}, available {available}")]
    NotEnoughSeats {
        class: ClassType,
        requested: u32,
        available: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassAvailability {
    pub total: u32,
    pub free: u32,
    pub free_seat_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatAvailability {
    pub flight_id: Uuid,
    pub economy: ClassAvailability,
    pub business: ClassAvailability,
}

/// Random seat allocation over a flight's free seats
pub struct SeatAllocator;

impl SeatAllocator {
    /// Free seats of the given class
    pub fn free_seats(seats: &[FlightSeat], class_type: ClassType) -> Vec<&Seat> {
        seats
            .iter()
            .filter(|s| !s.is_reserved && s.seat.class_type == class_type)
            .map(|s| &s.seat)
            .collect()
    }

    /// Pick `count` distinct free seats of `class_type` uniformly at random.
    /// The result is ordered by seat number.
    pub fn allocate<R: Rng + ?Sized>(
        seats: &[FlightSeat],
        class_type: ClassType,
        count: u32,
        rng: &mut R,
    ) -> Result<Vec<Seat>, SeatingError> {
        let free = Self::free_seats(seats, class_type);

        if (free.len() as u32) < count {
            return Err(SeatingError::NotEnoughSeats {
                class: class_type,
                requested: count,
                available: free.len() as u32,
            });
        }

        let mut picked: Vec<Seat> = free
            .choose_multiple(rng, count as usize)
            .map(|s| (*s).clone())
            .collect();
        picked.sort_by(|a, b| seat_sort_key(&a.seat_number).cmp(&seat_sort_key(&b.seat_number)));

        Ok(picked)
    }

    pub fn availability(flight_id: Uuid, seats: &[FlightSeat]) -> SeatAvailability {
        SeatAvailability {
            flight_id,
            economy: Self::class_availability(seats, ClassType::Economy),
            business: Self::class_availability(seats, ClassType::Business),
        }
    }

    fn class_availability(seats: &[FlightSeat], class_type: ClassType) -> ClassAvailability {
        let total = seats.iter().filter(|s| s.seat.class_type == class_type).count() as u32;
        let mut free_seat_numbers: Vec<String> = Self::free_seats(seats, class_type)
            .into_iter()
            .map(|s| s.seat_number.clone())
            .collect();
        free_seat_numbers.sort_by(|a, b| seat_sort_key(a).cmp(&seat_sort_key(b)));

        ClassAvailability {
            total,
            free: free_seat_numbers.len() as u32,
            free_seat_numbers,
        }
    }
}

/// Orders "2A" before "10A": row number first, then seat letter.
fn seat_sort_key(seat_number: &str) -> (u32, String) {
    let digits: String = seat_number.chars().take_while(|c| c.is_ascii_digit()).collect();
    let row = digits.parse().unwrap_or(u32::MAX);
    (row, seat_number[digits.len()..].to_string())
}

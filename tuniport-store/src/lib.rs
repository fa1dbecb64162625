pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod reservation_repo;

pub use database::DbClient;
pub use memory_repo::{InMemoryRepository, SeedData};
pub use reservation_repo::StoreReservationRepository;

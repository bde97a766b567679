pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool, SharedPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use repositories::{
    BatchWrite, InMemoryRequestRepository, RepositoryError, RequestRepository,
    SqlRequestRepository,
};

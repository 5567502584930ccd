pub mod connection;
pub mod fixtures;
pub mod maintenance;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, ping, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use maintenance::{cleanup, CleanupReport};

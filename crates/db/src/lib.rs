pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

#[cfg(test)]
mod testutil;

pub use connection::{connect, DbPool};
pub use fixtures::{DemoSeedDataset, RequestSeedInfo, SeedResult, VerificationResult};

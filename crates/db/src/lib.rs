pub mod connection;
pub mod executor;
pub mod fixtures;
pub mod migrations;
pub mod reminders;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use executor::{ActionExecutor, ExecuteError};
pub use fixtures::{SeedCatalog, SeedItemContract, SeedResult, VerificationResult};
pub use reminders::{ReminderScanner, ScanError};

// Havoc Infrastructure - SQLite Adapter
// Implements: EntityStore, JobStore

mod connection;
mod jobs;
mod migration;
mod store;

pub use connection::create_pool;
pub use jobs::SqliteJobStore;
pub use migration::run_migrations;
pub use store::SqliteEntityStore;

// Note: sqlx::Error conversion is handled by a helper function here
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for
// AppError in this crate)

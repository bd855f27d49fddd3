/// Sample persistence layer
///
/// Append-only storage of probe samples in a libsql (SQLite) database,
/// behind the shared [`crate::pool::StoreHandle`].

pub mod migrations;
pub mod models;
pub mod repository;

pub use repository::{LibsqlSampleStore, SampleStore};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

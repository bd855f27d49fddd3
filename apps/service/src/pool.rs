use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Builder, Connection, Database, Error as LibsqlError};

use crate::config::DatabaseConfig;

/// Hands out the one shared libsql connection.
pub struct LibsqlManager {
    database: Database,
    opened: AtomicUsize,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database, opened: AtomicUsize::new(0) }
    }

    /// Number of connections created so far
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        let opened = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(opened, "Opened store connection");
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ()).await?.next().await?.ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

/// Process-wide store handle.
///
/// Capped at one connection: it is opened lazily by the first `get()`, every
/// operation borrows it and returns it on drop, and concurrent callers queue
/// behind each other instead of interleaving writes.
pub type StoreHandle = Pool<LibsqlManager>;

/// Build the store handle from connection parameters. No connection is made
/// until the first operation.
pub async fn open_store(settings: &DatabaseConfig) -> Result<StoreHandle> {
    let database = match &settings.url {
        Some(url) => {
            let token = settings.auth_token.clone().unwrap_or_default();
            Builder::new_remote(url.clone(), token).build().await?
        }
        None => Builder::new_local(&settings.path).build().await?,
    };

    let pool = Pool::builder(LibsqlManager::new(database)).max_size(1).build()?;
    Ok(pool)
}

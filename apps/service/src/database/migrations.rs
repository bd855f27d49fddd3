use anyhow::Result;
use libsql::Connection;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 1;

/// Sample table. Column names and types are shared with the reporting side
/// and must not change.
pub const PING_TABLE: &str = "
    create table if not exists ping (
      host varchar(20),
      time datetime,
      ok bool,
      loss float,
      min_rtt float,
      avg_rtt float,
      max_rtt float,
      mdev_rtt float
      )";

/// Run database migrations
///
/// Safe to call on every startup: applied versions are recorded and every
/// statement is `IF NOT EXISTS`.
pub async fn run_migrations(conn: &Connection) -> Result<()> {
    // Create schema_migrations table first (tracks applied migrations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::debug!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Create ping sample table").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

/// Get current schema version from database
async fn get_current_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Record that a migration was applied
async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: the ping sample table
async fn run_migration_v1(conn: &Connection) -> Result<()> {
    conn.execute(PING_TABLE, ()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn column_names(conn: &Connection) -> Result<Vec<(String, String)>> {
        let mut rows = conn.query("PRAGMA table_info(ping)", ()).await?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next().await? {
            columns.push((row.get::<String>(1)?, row.get::<String>(2)?));
        }
        Ok(columns)
    }

    #[tokio::test]
    async fn test_migrations_idempotent() -> Result<()> {
        let temp_dir = tempdir()?;
        let db = libsql::Builder::new_local(temp_dir.path().join("schema.db")).build().await?;
        let conn = db.connect()?;

        run_migrations(&conn).await?;
        run_migrations(&conn).await?;

        assert_eq!(get_current_version(&conn).await?, SCHEMA_VERSION);

        let mut rows = conn.query("SELECT COUNT(*) FROM schema_migrations", ()).await?;
        let applied: i64 = rows.next().await?.expect("count row").get(0)?;
        assert_eq!(applied, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_ping_table_columns() -> Result<()> {
        let temp_dir = tempdir()?;
        let db = libsql::Builder::new_local(temp_dir.path().join("columns.db")).build().await?;
        let conn = db.connect()?;
        run_migrations(&conn).await?;

        let columns = column_names(&conn).await?;
        let expected = [
            ("host", "varchar(20)"),
            ("time", "datetime"),
            ("ok", "bool"),
            ("loss", "float"),
            ("min_rtt", "float"),
            ("avg_rtt", "float"),
            ("max_rtt", "float"),
            ("mdev_rtt", "float"),
        ];
        assert_eq!(columns.len(), expected.len());
        for ((name, ty), (expected_name, expected_ty)) in columns.iter().zip(expected) {
            assert_eq!(name, expected_name);
            assert_eq!(ty, expected_ty);
        }
        Ok(())
    }
}

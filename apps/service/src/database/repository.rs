use anyhow::Result;
use async_trait::async_trait;
use libsql::params;

use super::models::{SAMPLE_COLUMNS, bool_to_sql, datetime_to_sql, sample_from_row};
use crate::monitoring::types::Sample;
use crate::pool::{LibsqlManager, StoreHandle};

/// Append-only sample storage
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Create the sample table if it does not exist yet
    async fn ensure_schema(&self) -> Result<()>;

    /// Total number of persisted samples
    async fn count(&self) -> Result<u64>;

    /// Durably write one sample
    async fn append(&self, sample: &Sample) -> Result<()>;

    /// All samples, oldest first
    async fn samples(&self) -> Result<Vec<Sample>>;

    /// One host's samples, oldest first
    async fn samples_for(&self, host: &str) -> Result<Vec<Sample>>;
}

/// LibSQL sample store
///
/// Cheap to create: every instance borrows the handle's shared connection
/// per operation and never owns it.
#[derive(Clone)]
pub struct LibsqlSampleStore {
    handle: StoreHandle,
}

impl LibsqlSampleStore {
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    /// Get the shared connection for one operation
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.handle.get().await?)
    }

    async fn query_samples(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams + Send,
    ) -> Result<Vec<Sample>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, args).await?;
        let mut samples = Vec::new();

        while let Some(row) = rows.next().await? {
            samples.push(sample_from_row(&row)?);
        }

        Ok(samples)
    }
}

#[async_trait]
impl SampleStore for LibsqlSampleStore {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.get_conn().await?;
        super::initialize_database(&conn).await
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM ping", ()).await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.try_into()?),
            None => Ok(0),
        }
    }

    async fn append(&self, sample: &Sample) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            &format!("INSERT INTO ping ({SAMPLE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                sample.host.clone(),
                datetime_to_sql(sample.timestamp),
                bool_to_sql(sample.reachable),
                f64::from(sample.loss_percent),
                sample.min_rtt,
                sample.avg_rtt,
                sample.max_rtt,
                sample.mdev_rtt
            ],
        )
        .await?;

        Ok(())
    }

    async fn samples(&self) -> Result<Vec<Sample>> {
        self.query_samples(
            &format!("SELECT {SAMPLE_COLUMNS} FROM ping ORDER BY time ASC, rowid ASC"),
            (),
        )
        .await
    }

    async fn samples_for(&self, host: &str) -> Result<Vec<Sample>> {
        self.query_samples(
            &format!("SELECT {SAMPLE_COLUMNS} FROM ping WHERE host = ? ORDER BY time ASC, rowid ASC"),
            params![host.to_string()],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::monitoring::types::{PingStats, UNREACHABLE_RTT};
    use crate::pool::open_store;
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::{TempDir, tempdir};

    /// Helper to create a store in a temporary directory
    async fn create_test_store() -> Result<(LibsqlSampleStore, TempDir)> {
        let temp_dir = tempdir()?;
        let handle = open_store(&DatabaseConfig::local(temp_dir.path().join("test.db"))).await?;
        let store = LibsqlSampleStore::new(handle);
        store.ensure_schema().await?;
        Ok((store, temp_dir))
    }

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(10, minute, 0).unwrap()
    }

    fn up(host: &str, minute: u32, avg: f64) -> Sample {
        Sample::connected(
            host,
            at(minute),
            PingStats { loss_percent: 0, min_rtt: avg, avg_rtt: avg, max_rtt: avg, mdev_rtt: 0.0 },
        )
    }

    #[tokio::test]
    async fn test_ensure_schema_twice() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.ensure_schema().await?;
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_and_count() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append(&up("1.1.1.1", 0, 5.0)).await?;
        store.append(&Sample::disconnected("10.0.0.1", at(0))).await?;

        assert_eq!(store.count().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_samples_read_back_in_time_order() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append(&up("1.1.1.1", 2, 7.25)).await?;
        store.append(&up("1.1.1.1", 0, 5.0)).await?;
        store.append(&Sample::disconnected("10.0.0.1", at(0))).await?;

        let samples = store.samples().await?;
        let order: Vec<(&str, NaiveDateTime)> =
            samples.iter().map(|s| (s.host.as_str(), s.timestamp)).collect();
        assert_eq!(order, [("1.1.1.1", at(0)), ("10.0.0.1", at(0)), ("1.1.1.1", at(2))]);

        assert_eq!(samples[0], up("1.1.1.1", 0, 5.0));
        assert!(!samples[1].reachable);
        assert_eq!(samples[1].loss_percent, 100);
        assert_eq!(samples[1].avg_rtt, UNREACHABLE_RTT);
        Ok(())
    }

    #[tokio::test]
    async fn test_samples_for_host() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        store.append(&up("1.1.1.1", 0, 5.0)).await?;
        store.append(&Sample::disconnected("10.0.0.1", at(1))).await?;
        store.append(&up("1.1.1.1", 1, 6.0)).await?;

        let samples = store.samples_for("1.1.1.1").await?;
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.host == "1.1.1.1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_host_values_are_not_interpolated() -> Result<()> {
        let (store, _dir) = create_test_store().await?;

        let hostile = "x'); DROP TABLE ping; --";
        store.append(&Sample::disconnected(hostile, at(0))).await?;

        assert_eq!(store.count().await?, 1);
        assert_eq!(store.samples_for(hostile).await?[0].host, hostile);
        Ok(())
    }

    #[tokio::test]
    async fn test_stores_share_one_connection() -> Result<()> {
        let temp_dir = tempdir()?;
        let handle = open_store(&DatabaseConfig::local(temp_dir.path().join("shared.db"))).await?;

        let writer = LibsqlSampleStore::new(handle.clone());
        let reader = LibsqlSampleStore::new(handle.clone());
        writer.ensure_schema().await?;
        writer.append(&up("1.1.1.1", 0, 5.0)).await?;
        drop(writer);

        assert_eq!(reader.count().await?, 1);
        assert_eq!(handle.manager().connections_opened(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_append_without_schema_is_error() -> Result<()> {
        let temp_dir = tempdir()?;
        let handle = open_store(&DatabaseConfig::local(temp_dir.path().join("bare.db"))).await?;
        let store = LibsqlSampleStore::new(handle);

        assert!(store.append(&up("1.1.1.1", 0, 5.0)).await.is_err());
        Ok(())
    }
}

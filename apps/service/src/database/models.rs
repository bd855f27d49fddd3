//! Conversions between [`Sample`] and rows of the `ping` table.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use libsql::Row;

use crate::monitoring::types::Sample;

/// Layout of the `time` column
const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Columns in table order, for explicit inserts and selects
pub const SAMPLE_COLUMNS: &str = "host, time, ok, loss, min_rtt, avg_rtt, max_rtt, mdev_rtt";

/// NaiveDateTime --> SQL datetime text
pub fn datetime_to_sql(dt: NaiveDateTime) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

/// SQL datetime text --> NaiveDateTime
pub fn sql_to_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, SQL_DATETIME_FORMAT)
        .with_context(|| format!("invalid datetime in ping table: {s:?}"))
}

/// bool --> SQL bool
pub fn bool_to_sql(val: bool) -> i64 {
    if val { 1 } else { 0 }
}

/// Build a sample from a row selected with [`SAMPLE_COLUMNS`]
pub fn sample_from_row(row: &Row) -> Result<Sample> {
    let time: String = row.get(1)?;
    let loss: f64 = row.get(3)?;

    Ok(Sample {
        host: row.get(0)?,
        timestamp: sql_to_datetime(&time)?,
        reachable: row.get::<i64>(2)? != 0,
        loss_percent: loss.round().clamp(0.0, 100.0) as u8,
        min_rtt: row.get(4)?,
        avg_rtt: row.get(5)?,
        max_rtt: row.get(6)?,
        mdev_rtt: row.get(7)?,
    })
}

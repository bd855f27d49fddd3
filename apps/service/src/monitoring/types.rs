use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

/// RTT value recorded for every statistic when the host did not answer.
pub const UNREACHABLE_RTT: f64 = -1.0;

/// Loss recorded for a host that did not answer.
pub const FULL_LOSS: u8 = 100;

/// Summary statistics extracted from one reachability check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub loss_percent: u8,
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub mdev_rtt: f64,
}

/// One host's reachability and latency measurement for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Address or hostname that was probed
    pub host: String,

    /// Local wall-clock time of the probe, second precision
    pub timestamp: NaiveDateTime,

    /// Whether the check reported the host as reachable
    pub reachable: bool,

    /// Packet loss, 0..=100
    pub loss_percent: u8,

    /// Round trip statistics in milliseconds, [`UNREACHABLE_RTT`] when down
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub mdev_rtt: f64,
}

impl Sample {
    /// Degraded sample: the host is assumed disconnected.
    pub fn disconnected(host: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            host: host.into(),
            timestamp: timestamp.trunc_subsecs(0),
            reachable: false,
            loss_percent: FULL_LOSS,
            min_rtt: UNREACHABLE_RTT,
            avg_rtt: UNREACHABLE_RTT,
            max_rtt: UNREACHABLE_RTT,
            mdev_rtt: UNREACHABLE_RTT,
        }
    }

    /// Sample built from a parsed check summary.
    pub fn connected(host: impl Into<String>, timestamp: NaiveDateTime, stats: PingStats) -> Self {
        Self {
            host: host.into(),
            timestamp: timestamp.trunc_subsecs(0),
            reachable: true,
            loss_percent: stats.loss_percent.min(FULL_LOSS),
            min_rtt: stats.min_rtt,
            avg_rtt: stats.avg_rtt,
            max_rtt: stats.max_rtt,
            mdev_rtt: stats.mdev_rtt,
        }
    }

    /// Marker used by the progress table
    pub fn status_marker(&self) -> char {
        if self.reachable { '+' } else { '-' }
    }
}

/// Current local time truncated to whole seconds.
pub fn now_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_milli_opt(h, m, s, 750).unwrap()
    }

    #[test]
    fn test_disconnected_uses_sentinels() {
        let sample = Sample::disconnected("10.0.0.1", at(12, 0, 1));

        assert!(!sample.reachable);
        assert_eq!(sample.loss_percent, 100);
        assert_eq!(sample.min_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.avg_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.max_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.mdev_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.status_marker(), '-');
    }

    #[test]
    fn test_timestamp_truncated_to_seconds() {
        let sample = Sample::disconnected("10.0.0.1", at(12, 0, 1));
        assert_eq!(sample.timestamp.nanosecond(), 0);
    }

    #[test]
    fn test_connected_copies_stats() {
        let stats = PingStats {
            loss_percent: 33,
            min_rtt: 1.0,
            avg_rtt: 2.0,
            max_rtt: 3.0,
            mdev_rtt: 0.5,
        };
        let sample = Sample::connected("1.1.1.1", at(8, 30, 0), stats);

        assert!(sample.reachable);
        assert_eq!(sample.loss_percent, 33);
        assert_eq!(sample.avg_rtt, 2.0);
        assert_eq!(sample.status_marker(), '+');
    }
}

use std::sync::Arc;

use super::checker::{ProbeError, ReachabilityCheck};
use super::parser::parse_ping_summary;
use super::types::{PingStats, Sample, now_timestamp};

/// Probe executor - turns one reachability check into one sample
pub struct ProbeExecutor {
    check: Arc<dyn ReachabilityCheck>,
}

impl ProbeExecutor {
    /// Create a new probe executor around an external check
    pub fn new(check: Arc<dyn ReachabilityCheck>) -> Self {
        Self { check }
    }

    /// Probe `host` with `count` echo requests.
    ///
    /// Never fails: spawn errors, non-zero exits, timeouts and unparseable
    /// output all yield a disconnected sample stamped with the probe start.
    pub async fn probe(&self, host: &str, count: u32) -> Sample {
        let timestamp = now_timestamp();

        match self.run_check(host, count).await {
            Ok(stats) => {
                tracing::debug!(
                    host,
                    loss = stats.loss_percent,
                    avg_rtt = stats.avg_rtt,
                    "Probe succeeded"
                );
                Sample::connected(host, timestamp, stats)
            }
            Err(e) => {
                tracing::warn!(host, error = %e, "Probe failed, recording host as disconnected");
                Sample::disconnected(host, timestamp)
            }
        }
    }

    async fn run_check(&self, host: &str, count: u32) -> Result<PingStats, ProbeError> {
        let output = self.check.run(host, count).await?;
        Ok(parse_ping_summary(&output)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::monitoring::types::UNREACHABLE_RTT;
    use std::collections::HashMap;
    use std::io;

    /// Scripted check: known hosts print their output, the rest fail.
    #[derive(Default)]
    pub(crate) struct StubCheck {
        outputs: HashMap<String, String>,
    }

    impl StubCheck {
        pub(crate) fn reachable(mut self, host: &str, loss: u8, avg: f64) -> Self {
            let output = format!(
                "--- {host} ping statistics ---\n\
                 3 packets transmitted, 3 received, {loss}% packet loss, time 2003ms\n\
                 rtt min/avg/max/mdev = {min:.3}/{avg:.3}/{max:.3}/0.100 ms\n",
                min = avg - 0.5,
                max = avg + 0.5,
            );
            self.outputs.insert(host.to_string(), output);
            self
        }

        pub(crate) fn printing(mut self, host: &str, output: &str) -> Self {
            self.outputs.insert(host.to_string(), output.to_string());
            self
        }
    }

    #[async_trait::async_trait]
    impl ReachabilityCheck for StubCheck {
        async fn run(&self, host: &str, _count: u32) -> Result<String, ProbeError> {
            self.outputs.get(host).cloned().ok_or_else(|| {
                ProbeError::Spawn(io::Error::new(io::ErrorKind::Other, "host unreachable"))
            })
        }
    }

    fn assert_disconnected(sample: &Sample) {
        assert!(!sample.reachable);
        assert_eq!(sample.loss_percent, 100);
        assert_eq!(sample.min_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.avg_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.max_rtt, UNREACHABLE_RTT);
        assert_eq!(sample.mdev_rtt, UNREACHABLE_RTT);
    }

    #[tokio::test]
    async fn test_probe_success() {
        let executor = ProbeExecutor::new(Arc::new(StubCheck::default().reachable("1.1.1.1", 0, 5.0)));

        let sample = executor.probe("1.1.1.1", 3).await;

        assert!(sample.reachable);
        assert_eq!(sample.host, "1.1.1.1");
        assert_eq!(sample.loss_percent, 0);
        assert_eq!(sample.avg_rtt, 5.0);
        assert_eq!(sample.min_rtt, 4.5);
        assert_eq!(sample.max_rtt, 5.5);
    }

    #[tokio::test]
    async fn test_probe_failed_check_degrades() {
        let executor = ProbeExecutor::new(Arc::new(StubCheck::default()));

        let sample = executor.probe("10.0.0.1", 3).await;

        assert_eq!(sample.host, "10.0.0.1");
        assert_disconnected(&sample);
    }

    #[tokio::test]
    async fn test_probe_malformed_output_degrades() {
        let check = StubCheck::default()
            .printing("a", "")
            .printing("b", "3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n")
            .printing("c", "PING c\nno summary here\nat all");
        let executor = ProbeExecutor::new(Arc::new(check));

        for host in ["a", "b", "c"] {
            assert_disconnected(&executor.probe(host, 3).await);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_non_zero_exit_degrades() {
        let command = crate::monitoring::checker::PingCommand::new("false", Default::default());
        let executor = ProbeExecutor::new(Arc::new(command));

        assert_disconnected(&executor.probe("1.1.1.1", 1).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_timeout_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let (command, _) = crate::monitoring::checker::tests::hanging_check(dir.path()).unwrap();
        let executor = ProbeExecutor::new(Arc::new(command));

        let sample = executor.probe("10.0.0.1", 1).await;

        assert_eq!(sample.host, "10.0.0.1");
        assert_disconnected(&sample);
    }
}

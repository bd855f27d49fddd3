use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::clock::IntervalClock;
use super::executor::ProbeExecutor;
use super::types::Sample;
use crate::config::{StoreErrorPolicy, Target};
use crate::database::SampleStore;
use crate::monitoring::validation::validate_echo_count;

/// Outcome of one pass over all targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub probed: usize,
    pub reachable: usize,
    pub stored: usize,
    pub store_failures: usize,
}

/// Header row of the progress table
pub fn progress_header() -> String {
    format!("{:^20} : {:^15} : OK :{:5}: {:^5}", "time", "host", "loss(%)", "avg")
}

/// One progress row: time, dot-padded host, `+`/`-`, loss and average rtt
pub fn progress_line(sample: &Sample) -> String {
    format!(
        "{:20} : {:.>15} : {} : {:5.1} : {:5.1}",
        sample.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        sample.host,
        sample.status_marker(),
        f64::from(sample.loss_percent),
        sample.avg_rtt
    )
}

/// Write one progress row. A closed or broken sink is logged, never fatal.
fn write_progress(progress: &mut impl Write, line: &str) {
    if let Err(e) = writeln!(progress, "{}", line).and_then(|_| progress.flush()) {
        tracing::warn!(error = %e, "Failed to write progress line");
    }
}

/// Sampling loop - probes every target once per clock interval and stores
/// the results
pub struct SamplingLoop<W: Write = io::Stdout> {
    targets: Vec<Target>,
    executor: ProbeExecutor,
    store: Arc<dyn SampleStore>,
    clock: IntervalClock,
    echo_count: u32,
    on_store_error: StoreErrorPolicy,
    progress: W,
}

impl SamplingLoop<io::Stdout> {
    /// Create a sampling loop that prints progress to stdout
    pub fn new(
        targets: Vec<Target>,
        executor: ProbeExecutor,
        store: Arc<dyn SampleStore>,
        clock: IntervalClock,
        echo_count: u32,
    ) -> Result<Self> {
        Self::with_progress(targets, executor, store, clock, echo_count, io::stdout())
    }
}

impl<W: Write> SamplingLoop<W> {
    /// Create a sampling loop writing progress rows to `progress`
    pub fn with_progress(
        targets: Vec<Target>,
        executor: ProbeExecutor,
        store: Arc<dyn SampleStore>,
        clock: IntervalClock,
        echo_count: u32,
        progress: W,
    ) -> Result<Self> {
        validate_echo_count(echo_count)?;

        Ok(Self {
            targets,
            executor,
            store,
            clock,
            echo_count,
            on_store_error: StoreErrorPolicy::default(),
            progress,
        })
    }

    pub fn on_store_error(mut self, policy: StoreErrorPolicy) -> Self {
        self.on_store_error = policy;
        self
    }

    pub fn clock(&self) -> &IntervalClock {
        &self.clock
    }

    pub fn progress(&self) -> &W {
        &self.progress
    }

    /// Targets sorted for display; probing keeps configuration order.
    pub fn targets_by_sequence(&self) -> Vec<&Target> {
        let mut targets: Vec<&Target> = self.targets.iter().collect();
        targets.sort_by_key(|t| t.sequence);
        targets
    }

    /// Prepare the store and print the table header.
    ///
    /// Returns the number of samples already stored.
    pub async fn start(&mut self) -> Result<u64> {
        self.store.ensure_schema().await.context("failed to create sample table")?;
        let existing = self.store.count().await.context("failed to count stored samples")?;
        tracing::info!("There are {} items in ping table", existing);
        tracing::info!(
            targets = self.targets.len(),
            interval = ?self.clock.interval(),
            echo_count = self.echo_count,
            on_store_error = %self.on_store_error,
            "Sampling started"
        );
        for target in self.targets_by_sequence() {
            tracing::info!(name = %target.name, host = %target.host, sequence = target.sequence, "Target");
        }

        write_progress(&mut self.progress, &progress_header());
        Ok(existing)
    }

    /// Probe every target once, in configuration order, storing each sample
    /// before moving on to the next host.
    pub async fn tick(&mut self) -> Result<TickSummary> {
        let mut summary = TickSummary::default();

        for target in &self.targets {
            let sample = self.executor.probe(&target.host, self.echo_count).await;
            summary.probed += 1;
            if sample.reachable {
                summary.reachable += 1;
            }

            match self.store.append(&sample).await {
                Ok(()) => summary.stored += 1,
                Err(e) => match self.on_store_error {
                    StoreErrorPolicy::Skip => {
                        summary.store_failures += 1;
                        tracing::error!(
                            host = %sample.host,
                            name = %target.name,
                            error = %e,
                            "Failed to store sample, skipping it"
                        );
                    }
                    StoreErrorPolicy::Abort => {
                        return Err(e.context(format!("failed to store sample for {}", sample.host)));
                    }
                },
            }

            write_progress(&mut self.progress, &progress_line(&sample));
        }

        tracing::debug!(?summary, next_wake = ?self.clock.next_wake(), "Tick complete");
        Ok(summary)
    }

    /// Block until the next aligned interval boundary
    pub async fn wait_next_tick(&mut self) {
        self.clock.wait().await;
    }

    /// Run until an error aborts the loop. Under the skip policy this only
    /// returns if the store cannot be prepared.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        loop {
            let summary = self.tick().await?;
            if summary.store_failures > 0 {
                tracing::warn!(
                    probed = summary.probed,
                    reachable = summary.reachable,
                    stored = summary.stored,
                    lost = summary.store_failures,
                    "Tick finished with unsaved samples"
                );
            }
            self.wait_next_tick().await;
        }
    }
}

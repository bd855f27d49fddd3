use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use super::parser::ParseError;

/// Extra time granted to the check on top of one second per echo request.
/// iputils `ping` waits up to 10s for late replies before giving up.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(11);

/// Reasons a probe could not produce a parsed summary.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn reachability check: {0}")]
    Spawn(#[from] io::Error),

    #[error("reachability check did not finish within {0:?}")]
    Timeout(Duration),

    #[error("reachability check exited with {0}")]
    ExitStatus(ExitStatus),

    #[error("unparseable check output: {0}")]
    Parse(#[from] ParseError),
}

/// External reachability check.
///
/// Returns the raw text the check printed on success. A non-zero exit is an
/// error, so callers never see partial output from a failed check.
#[async_trait::async_trait]
pub trait ReachabilityCheck: Send + Sync {
    async fn run(&self, host: &str, count: u32) -> Result<String, ProbeError>;
}

/// Runs the system `ping` binary in quiet mode.
#[derive(Debug, Clone)]
pub struct PingCommand {
    program: String,
    grace: Duration,
}

impl Default for PingCommand {
    fn default() -> Self {
        Self::new("ping", DEFAULT_GRACE)
    }
}

impl PingCommand {
    pub fn new(program: impl Into<String>, grace: Duration) -> Self {
        Self { program: program.into(), grace }
    }

    /// Upper bound for one invocation: one second per echo plus grace.
    pub fn timeout_for(&self, count: u32) -> Duration {
        Duration::from_secs(u64::from(count)) + self.grace
    }
}

#[async_trait::async_trait]
impl ReachabilityCheck for PingCommand {
    async fn run(&self, host: &str, count: u32) -> Result<String, ProbeError> {
        let limit = self.timeout_for(count);

        // Arguments are passed as a vector, the host never reaches a shell.
        let child = Command::new(&self.program)
            .arg("-c")
            .arg(count.to_string())
            .arg("-q")
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let output = timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(limit))??;

        if !output.status.success() {
            return Err(ProbeError::ExitStatus(output.status));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

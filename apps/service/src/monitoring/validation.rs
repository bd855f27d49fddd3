//! Validation of sampling settings and target hosts.
//!
//! Hosts end up on the argument vector of an external command and in the
//! `host` column of the sample table, so they are checked before the loop
//! ever starts.

use anyhow::{Result, anyhow};
use std::collections::HashSet;

/// Width of the `host` column in the sample table.
const HOST_COLUMN_WIDTH: usize = 20;

/// Longest valid DNS name.
const MAX_HOST_LEN: usize = 253;

/// Validate a probe target address or hostname
pub fn validate_target_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(anyhow!("Target host must not be empty"));
    }

    if host.len() > MAX_HOST_LEN {
        return Err(anyhow!(
            "Target host too long: {} characters (maximum: {})",
            host.len(),
            MAX_HOST_LEN
        ));
    }

    // A leading dash would be read as an option by the check binary
    if host.starts_with('-') {
        return Err(anyhow!("Target host must not start with '-': {}", host));
    }

    if let Some(bad) = host.chars().find(|c| !is_host_char(*c)) {
        return Err(anyhow!("Invalid character {:?} in target host: {}", bad, host));
    }

    if host.len() > HOST_COLUMN_WIDTH {
        tracing::warn!(
            host,
            width = HOST_COLUMN_WIDTH,
            "Target host is wider than the host column, strict databases will truncate it"
        );
    }

    Ok(())
}

/// Letters, digits and the separators used by hostnames, IPv4 and IPv6
/// (including zone ids like `fe80::1%eth0`).
fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '%')
}

/// Validate that no host is probed twice per tick
pub fn validate_unique_hosts<'a>(hosts: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for host in hosts {
        if !seen.insert(host) {
            return Err(anyhow!("Target host listed more than once: {}", host));
        }
    }
    Ok(())
}

/// Validate sampling interval
pub fn validate_check_interval(interval_seconds: u64) -> Result<()> {
    const MIN_INTERVAL: u64 = 1;
    const MAX_INTERVAL: u64 = 86400; // 24 hours

    if interval_seconds < MIN_INTERVAL {
        return Err(anyhow!(
            "Sampling interval too short: {} seconds (minimum: {})",
            interval_seconds,
            MIN_INTERVAL
        ));
    }

    if interval_seconds > MAX_INTERVAL {
        return Err(anyhow!(
            "Sampling interval too long: {} seconds (maximum: {})",
            interval_seconds,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate number of echo requests per probe
pub fn validate_echo_count(count: u32) -> Result<()> {
    const MIN_COUNT: u32 = 1;
    const MAX_COUNT: u32 = 100;

    if !(MIN_COUNT..=MAX_COUNT).contains(&count) {
        return Err(anyhow!(
            "Echo count out of range: {} (allowed: {}..={})",
            count,
            MIN_COUNT,
            MAX_COUNT
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_target_host() {
        // Valid
        assert!(validate_target_host("1.1.1.1").is_ok());
        assert!(validate_target_host("www.ua").is_ok());
        assert!(validate_target_host("door-bell.lan").is_ok());
        assert!(validate_target_host("2606:4700:4700::1111").is_ok());
        assert!(validate_target_host("fe80::1%eth0").is_ok());

        // Invalid
        assert!(validate_target_host("").is_err());
        assert!(validate_target_host("-f").is_err());
        assert!(validate_target_host("1.1.1.1; rm -rf /").is_err());
        assert!(validate_target_host("host name").is_err());
        assert!(validate_target_host("a'b").is_err());
        assert!(validate_target_host(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_validate_unique_hosts() {
        assert!(validate_unique_hosts(["1.1.1.1", "10.0.0.1"]).is_ok());
        assert!(validate_unique_hosts(["1.1.1.1", "10.0.0.1", "1.1.1.1"]).is_err());
    }

    #[test]
    fn test_validate_check_interval() {
        assert!(validate_check_interval(1).is_ok()); // Min
        assert!(validate_check_interval(60).is_ok()); // Normal
        assert!(validate_check_interval(86400).is_ok()); // Max

        assert!(validate_check_interval(0).is_err());
        assert!(validate_check_interval(100000).is_err());
    }

    #[test]
    fn test_validate_echo_count() {
        assert!(validate_echo_count(1).is_ok());
        assert!(validate_echo_count(3).is_ok());
        assert!(validate_echo_count(0).is_err());
        assert!(validate_echo_count(101).is_err());
    }
}

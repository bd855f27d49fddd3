//! Parser for the summary that `ping -q` prints on exit.
//!
//! Only the last two non-empty lines are inspected:
//!
//! ```text
//! 3 packets transmitted, 3 received, 0% packet loss, time 2003ms
//! rtt min/avg/max/mdev = 10.123/12.456/15.789/1.234 ms
//! ```

use thiserror::Error;

use super::types::PingStats;

const RTT_LABELS: [&str; 4] = ["min", "avg", "max", "mdev"];

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected a statistics line and an rtt line, got {0} line(s)")]
    MissingSummary(usize),

    #[error("malformed statistics line: {0:?}")]
    StatisticsLine(String),

    #[error("malformed rtt line: {0:?}")]
    RttLine(String),

    #[error("rtt labels {labels:?} do not match values {values:?}")]
    LabelMismatch { labels: String, values: String },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),
}

/// Extract loss and rtt statistics from the tail of the check output.
pub fn parse_ping_summary(text: &str) -> Result<PingStats, ParseError> {
    let lines: Vec<&str> =
        text.lines().map(str::trim).filter(|line| !line.is_empty()).collect();

    let [.., statistics_line, rtt_line] = lines.as_slice() else {
        return Err(ParseError::MissingSummary(lines.len()));
    };

    let loss_percent = parse_loss(statistics_line)?;
    let [min_rtt, avg_rtt, max_rtt, mdev_rtt] = parse_rtt(rtt_line)?;

    Ok(PingStats { loss_percent, min_rtt, avg_rtt, max_rtt, mdev_rtt })
}

/// `N packets transmitted, M received, L% packet loss, time T`
fn parse_loss(line: &str) -> Result<u8, ParseError> {
    let malformed = || ParseError::StatisticsLine(line.to_string());

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let transmitted = fields.first().ok_or_else(malformed)?;
    if !transmitted.ends_with("packets transmitted") {
        return Err(malformed());
    }
    if !fields.iter().any(|field| field.ends_with("received")) {
        return Err(malformed());
    }

    let loss_field = fields
        .iter()
        .find_map(|field| field.strip_suffix("% packet loss"))
        .ok_or_else(malformed)?;

    let loss = parse_number(loss_field)?;
    if !(0.0..=100.0).contains(&loss) {
        return Err(malformed());
    }

    Ok(loss.round() as u8)
}

/// `rtt min/avg/max/mdev = a/b/c/d ms`
fn parse_rtt(line: &str) -> Result<[f64; 4], ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [prefix, labels, "=", values, "ms"] = tokens.as_slice() else {
        return Err(ParseError::RttLine(line.to_string()));
    };
    if *prefix != "rtt" {
        return Err(ParseError::RttLine(line.to_string()));
    }

    let label_list: Vec<&str> = labels.split('/').collect();
    let value_list: Vec<&str> = values.split('/').collect();
    if label_list != RTT_LABELS || value_list.len() != label_list.len() {
        return Err(ParseError::LabelMismatch {
            labels: labels.to_string(),
            values: values.to_string(),
        });
    }

    let mut rtt = [0.0; 4];
    for (slot, value) in rtt.iter_mut().zip(value_list) {
        *slot = parse_number(value)?;
    }

    Ok(rtt)
}

fn parse_number(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .ok_or_else(|| ParseError::InvalidNumber(token.to_string()))
}

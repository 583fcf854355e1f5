//! Channel-initiation threshold from the drop analysis report

use crate::config::MIN_CHANNEL_THRESHOLD;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Value after the last `:` on the report's last non-blank line, truncated.
pub fn parse_drop_report(path: &Path, text: &str) -> Result<i64> {
    let malformed = |reason: String| Error::DropReport {
        path: path.to_path_buf(),
        reason,
    };
    let last = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| malformed("report is empty".into()))?;
    let (_, value) = last
        .rsplit_once(':')
        .ok_or_else(|| malformed(format!("no ':' in last line {:?}", last)))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| malformed(format!("cannot parse {:?} as a number", value.trim())))?;
    if !value.is_finite() {
        return Err(malformed(format!("non-finite threshold {}", value)));
    }
    Ok(value.trunc() as i64)
}

/// A zero optimum would make every cell a channel.
pub fn apply_floor(threshold: i64) -> i64 {
    if threshold == 0 {
        warn!(
            "Drop analysis found no optimum, using {}",
            MIN_CHANNEL_THRESHOLD
        );
        MIN_CHANNEL_THRESHOLD
    } else if threshold < MIN_CHANNEL_THRESHOLD {
        warn!(
            "Drop analysis threshold {} below the floor, using {}",
            threshold, MIN_CHANNEL_THRESHOLD
        );
        MIN_CHANNEL_THRESHOLD
    } else {
        threshold
    }
}

pub fn select_threshold(report: &Path) -> Result<i64> {
    let text = fs::read_to_string(report)?;
    let threshold = apply_floor(parse_drop_report(report, &text)?);
    info!("Source threshold: {}", threshold);
    Ok(threshold)
}

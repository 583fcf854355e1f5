//! Per-run log file plus the optional operator console

use crate::error::{Error, Result};
use chrono::{Local, NaiveDateTime};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub fn log_file_name(unit_id: &str, started: NaiveDateTime) -> String {
    format!("{}_{}.log", unit_id, started.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// level. Returns the path of the log file.
pub fn init(log_dir: &Path, unit_id: &str, console: bool) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(unit_id, Local::now().naive_local()));
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));
    let console_layer = console.then(|| {
        fmt::layer()
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("cannot install logger: {}", e)))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn log_names_carry_unit_and_start_time() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 1)
            .unwrap();
        assert_eq!(
            log_file_name("070801050302", started),
            "070801050302_20240307_090501.log"
        );
    }
}

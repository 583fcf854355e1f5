//! Error types for the watershed pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{tool} failed ({status}):\n{output}")]
    Tool {
        tool: String,
        status: String,
        output: String,
    },

    #[error("Cannot launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed drop analysis report {path:?}: {reason}")]
    DropReport { path: PathBuf, reason: String },

    #[error(
        "No pour points: no boundary cell reaches the cut-off {cutoff} \
         (boundary cells: {cells}, mean {mean:.2}, stddev {stddev:.2})"
    )]
    NoPourPoints {
        cutoff: i64,
        cells: usize,
        mean: f64,
        stddev: f64,
    },

    #[error("Invalid raster {path:?}: {reason}")]
    InvalidRaster { path: PathBuf, reason: String },

    #[error("Invalid vector data {path:?}: {reason}")]
    InvalidVector { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

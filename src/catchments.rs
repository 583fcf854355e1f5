//! Watershed labels to catchment polygons and the dissolved boundary.
//!
//! Vectorization first runs in the simplifying mode. The dissolve step gets a
//! single repair-and-retry on an empty result or an execution error. If the
//! dissolved boundary then covers less than `MIN_AREA_RATIO` of the unit
//! boundary, the first attempt is archived and everything is redone without
//! simplification. A second shortfall is accepted as degraded.

use crate::config::MIN_AREA_RATIO;
use crate::error::Result;
use crate::features::Catchment;
use crate::geometry::area_ratio;
use crate::io::vector::{write_boundary, write_catchments};
use crate::raster::Raster;
use geo::{MultiPolygon, Polygon};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VectorizeMode {
    Simplify,
    NoSimplify,
}

impl fmt::Display for VectorizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorizeMode::Simplify => write!(f, "SIMPLIFY"),
            VectorizeMode::NoSimplify => write!(f, "NO_SIMPLIFY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DissolveOutcome {
    /// Single-part polygons of the union
    Success(Vec<Polygon<f64>>),
    EmptyOutput,
    ExecutionError(String),
    OtherError(String),
}

impl fmt::Display for DissolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DissolveOutcome::Success(parts) => write!(f, "{} part(s)", parts.len()),
            DissolveOutcome::EmptyOutput => write!(f, "empty output generated"),
            DissolveOutcome::ExecutionError(msg) => write!(f, "execution error: {}", msg),
            DissolveOutcome::OtherError(msg) => write!(f, "error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoundaryStatus {
    Accepted,
    /// Both vectorization modes fell short of the area ratio
    Degraded { ratio: f64 },
}

/// Raster-to-vector and geometry operations the vectorizer relies on.
pub trait VectorEngine {
    fn polygonize(&self, labels: &Raster<f64>, mode: VectorizeMode) -> Result<Vec<Catchment>>;
    /// Fix geometry in place; returns how many features were changed or removed.
    fn repair(&self, catchments: &mut Vec<Catchment>) -> usize;
    fn eliminate(&self, catchments: Vec<Catchment>) -> Vec<Catchment>;
    fn select_within(&self, catchments: Vec<Catchment>, boundary: &MultiPolygon<f64>) -> Vec<Catchment>;
    fn dissolve(&self, catchments: &[Catchment]) -> DissolveOutcome;
}

// Where the vectorizer writes, and the names used when archiving a failed attempt
#[derive(Debug, Clone)]
pub struct CatchmentOutputs {
    pub raw_catchments: PathBuf,
    pub pd_catch: PathBuf,
    pub wshed: PathBuf,
    pub archive_dir: PathBuf,
    pub unit_id: String,
    pub epsg: Option<u16>,
}

impl CatchmentOutputs {
    fn archive(&self) -> Result<()> {
        fs::create_dir_all(&self.archive_dir)?;
        let copies = [
            (&self.raw_catchments, "tmpwshd_dslv_errors.geojson".to_string()),
            (&self.pd_catch, "pdCatch_dslv_errors.geojson".to_string()),
            (&self.wshed, format!("WShed{}_dslv_errors.geojson", self.unit_id)),
        ];
        for (src, name) in copies {
            if src.exists() {
                fs::copy(src, self.archive_dir.join(&name))?;
                debug!("Archived {} as {}", src.display(), name);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CatchmentResult {
    pub catchments: Vec<Catchment>,
    pub boundary: Vec<Polygon<f64>>,
    pub mode: VectorizeMode,
    pub area_ratio: f64,
    pub status: BoundaryStatus,
}

fn vectorize(
    engine: &dyn VectorEngine,
    labels: &Raster<f64>,
    boundary: &MultiPolygon<f64>,
    mode: VectorizeMode,
    out: &CatchmentOutputs,
) -> Result<Vec<Catchment>> {
    info!("Vectorizing watersheds ({})", mode);
    let mut raw = engine.polygonize(labels, mode)?;
    write_catchments(&out.raw_catchments, &raw, out.epsg)?;

    let fixed = engine.repair(&mut raw);
    if fixed > 0 {
        debug!("Repair changed {} polygon(s)", fixed);
    }
    let polygons = raw.len();
    let merged = engine.eliminate(raw);
    let inside = engine.select_within(merged, boundary);
    info!(
        "{} catchments kept of {} polygons",
        inside.len(),
        polygons
    );
    write_catchments(&out.pd_catch, &inside, out.epsg)?;
    Ok(inside)
}

/// One repair-and-retry for the two recoverable outcomes; `None` when no
/// boundary came out of this attempt.
fn dissolve_with_retry(
    engine: &dyn VectorEngine,
    catchments: &mut Vec<Catchment>,
    out: &CatchmentOutputs,
) -> Result<Option<Vec<Polygon<f64>>>> {
    let mut retried = false;
    loop {
        match engine.dissolve(catchments) {
            DissolveOutcome::Success(parts) => {
                write_boundary(&out.wshed, &parts, out.epsg)?;
                return Ok(Some(parts));
            }
            outcome @ (DissolveOutcome::EmptyOutput | DissolveOutcome::ExecutionError(_))
                if !retried =>
            {
                warn!("Dissolve failed ({}), repairing geometry and retrying", outcome);
                engine.repair(catchments);
                write_catchments(&out.pd_catch, catchments, out.epsg)?;
                retried = true;
            }
            DissolveOutcome::OtherError(msg) => {
                warn!("Dissolve failed, not retried: {}", msg);
                return Ok(None);
            }
            outcome => {
                warn!("Dissolve failed again after repair ({})", outcome);
                return Ok(None);
            }
        }
    }
}

/// Catchment polygons and the dissolved watershed boundary for one unit.
pub fn derive_catchments(
    engine: &dyn VectorEngine,
    labels: &Raster<f64>,
    boundary: &MultiPolygon<f64>,
    out: &CatchmentOutputs,
) -> Result<CatchmentResult> {
    let mut mode = VectorizeMode::Simplify;
    let mut current: Option<Vec<Polygon<f64>>> = None;

    loop {
        let mut catchments = vectorize(engine, labels, boundary, mode, out)?;
        if let Some(parts) = dissolve_with_retry(engine, &mut catchments, out)? {
            current = Some(parts);
        }
        let ratio = current
            .as_deref()
            .map_or(0.0, |parts| area_ratio(parts, boundary));
        info!("Watershed area ratio {:.3} ({})", ratio, mode);

        let status = if ratio >= MIN_AREA_RATIO {
            BoundaryStatus::Accepted
        } else if mode == VectorizeMode::Simplify {
            warn!("Subcatchment watershed area too small compared to the unit boundary");
            out.archive()?;
            mode = VectorizeMode::NoSimplify;
            continue;
        } else {
            warn!(
                "Watershed boundary still covers only {:.1}% of the unit boundary, accepting as degraded",
                ratio * 100.0
            );
            BoundaryStatus::Degraded { ratio }
        };

        return Ok(CatchmentResult {
            catchments,
            boundary: current.unwrap_or_default(),
            mode,
            area_ratio: ratio,
            status,
        });
    }
}

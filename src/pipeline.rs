//! One watershed unit, DEM to clipped channel network

use crate::catchments::{derive_catchments, BoundaryStatus, CatchmentOutputs, VectorEngine, VectorizeMode};
use crate::clip::clip_network;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::io::geotiff::read_raster;
use crate::io::read_boundary;
use crate::network::build_network;
use crate::pour_points::extract_pour_points;
use crate::raster::Raster;
use crate::skeleton::build_skeleton;
use crate::surface::condition_surface;
use crate::taudem::HydroEngine;
use crate::threshold::select_threshold;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

const STAGES: u64 = 7;
const UNIT_ID_DIGITS: usize = 12;
const SUMMARY_FILE: &str = "run_summary.json";

/// Watershed-unit id: the last run of at least 12 digits in the DEM file
/// stem, trimmed to its final 12.
pub fn parse_unit_id(dem: &Path) -> Option<String> {
    let stem = dem.file_stem()?.to_str()?;
    stem.split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() >= UNIT_ID_DIGITS)
        .last()
        .map(|run| run[run.len() - UNIT_ID_DIGITS..].to_string())
}

pub fn huc8(unit_id: &str) -> Option<&str> {
    unit_id.get(..8)
}

/// Remove and recreate the processing directory.
pub fn reset_proc_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        info!("Clearing {}", dir.display());
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub unit_id: String,
    pub threshold: i64,
    pub pour_points: usize,
    pub links: usize,
    pub catchments: usize,
    pub channels: usize,
    pub area_ratio: f64,
    pub vectorize_mode: VectorizeMode,
    pub boundary_status: BoundaryStatus,
}

fn stage_bar(visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(STAGES);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| Error::Config(format!("progress template: {}", e)))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

pub fn run(
    config: &PipelineConfig,
    hydro: &dyn HydroEngine,
    vector: &dyn VectorEngine,
) -> Result<RunSummary> {
    let ws = &config.workspace;
    if config.reset_workspace {
        reset_proc_dir(&ws.dir)?;
    } else {
        fs::create_dir_all(&ws.dir)?;
    }
    info!("Processing unit {} from {}", config.unit_id, config.dem.display());
    let pb = stage_bar(config.show_progress)?;

    pb.set_message("surface");
    let accumulation = condition_surface(hydro, &config.dem, ws, config.fill)?;
    pb.inc(1);

    pb.set_message("pour points");
    let (boundary, boundary_epsg) = read_boundary(&config.boundary)?;
    let pour_points = extract_pour_points(&accumulation, &boundary, ws)?;
    pb.inc(1);

    pb.set_message("skeleton");
    build_skeleton(hydro, ws, &config.drop_analysis)?;
    pb.inc(1);

    pb.set_message("threshold");
    let threshold = select_threshold(&ws.drp())?;
    pb.inc(1);

    pb.set_message("network");
    let tree = build_network(hydro, ws, threshold)?;
    pb.inc(1);

    pb.set_message("catchments");
    let labels: Raster<f64> = read_raster(ws.w())?;
    let outputs = CatchmentOutputs {
        raw_catchments: ws.raw_catchments(),
        pd_catch: config.pd_catch.clone(),
        wshed: config.wshed.clone(),
        archive_dir: ws.archive_dir(),
        unit_id: config.unit_id.clone(),
        epsg: labels.epsg().or(boundary_epsg),
    };
    let result = derive_catchments(vector, &labels, &boundary, &outputs)?;
    pb.inc(1);

    pb.set_message("clip");
    let channels = clip_network(&ws.net(), &result.boundary, &config.pd_chnl, outputs.epsg)?;
    pb.inc(1);
    pb.finish_with_message("done");

    let summary = RunSummary {
        unit_id: config.unit_id.clone(),
        threshold,
        pour_points: pour_points.len(),
        links: tree.len(),
        catchments: result.catchments.len(),
        channels: channels.len(),
        area_ratio: result.area_ratio,
        vectorize_mode: result.mode,
        boundary_status: result.status,
    };
    fs::write(ws.path(SUMMARY_FILE), serde_json::to_string_pretty(&summary)?)?;
    Ok(summary)
}

//! Peuker-Douglas skeleton, skeleton-weighted accumulation and drop analysis

use crate::config::{DropAnalysisParams, Workspace};
use crate::error::Result;
use crate::io::geotiff::calculate_statistics;
use crate::taudem::{Accumulation, HydroEngine};
use tracing::info;

/// Runs up to and including drop analysis; the report lands in `demdrp.txt`.
pub fn build_skeleton(
    engine: &dyn HydroEngine,
    ws: &Workspace,
    params: &DropAnalysisParams,
) -> Result<()> {
    info!("Peuker-Douglas");
    engine.stream_skeleton(ws)?;
    calculate_statistics(ws.ss())?;

    info!("Skeleton-weighted contributing area");
    engine.flow_accumulation(ws, Accumulation::SkeletonWeighted)?;
    calculate_statistics(ws.ssa())?;

    info!(
        "Drop analysis over {}..{} in {} steps",
        params.min_threshold, params.max_threshold, params.steps
    );
    engine.drop_analysis(ws, params)
}

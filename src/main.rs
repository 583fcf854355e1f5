use anyhow::{Context, Result};
use tracing::{error, info, warn};

mod catchments;
mod cli;
mod clip;
mod config;
mod error;
mod features;
mod geometry;
mod io;
mod logging;
mod network;
mod pipeline;
mod pour_points;
mod raster;
mod skeleton;
mod status;
mod surface;
mod taudem;
mod threshold;

#[cfg(test)]
mod testing;

use catchments::BoundaryStatus;
use cli::get_args;
use config::{DropAnalysisParams, PipelineConfig, ToolConfig, Workspace, default_process_count};
use geometry::GeoEngine;
use taudem::TauDem;

fn main() -> Result<()> {
    let args = get_args();

    let unit_id = match args.unit_id.clone() {
        Some(id) => id,
        None => pipeline::parse_unit_id(&args.dem).with_context(|| {
            format!("No watershed-unit id in DEM name {:?}; pass --unit-id", args.dem)
        })?,
    };

    let log_path = logging::init(&args.log_dir, &unit_id, !args.quiet)
        .with_context(|| format!("Failed to set up logging in {:?}", args.log_dir))?;
    info!("Peukering on {} (log {})", unit_id, log_path.display());
    if let Some(huc8) = pipeline::huc8(&unit_id) {
        info!("HUC8 {}", huc8);
    }

    let mut tools = ToolConfig::new(args.processes.unwrap_or_else(default_process_count));
    tools.taudem_dir = args.taudem_dir.clone();
    tools.mpiexec = (!args.no_mpi).then(|| args.mpiexec.clone());
    info!("Toolset processes: {}", tools.processes);

    let config = PipelineConfig {
        unit_id: unit_id.clone(),
        dem: args.dem.clone(),
        boundary: args.ws_bnd.clone(),
        fill: !args.no_fill,
        workspace: Workspace::new(&args.proc_dir),
        drop_analysis: DropAnalysisParams::default(),
        pd_catch: args.pd_catch.clone(),
        pd_chnl: args.pd_chnl.clone(),
        wshed: args.wshed.clone(),
        reset_workspace: !args.keep_proc_dir,
        show_progress: !args.quiet,
    };

    let hydro = TauDem::new(tools);
    let summary = match pipeline::run(&config, &hydro, &GeoEngine) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Unit {} failed: {}", unit_id, e);
            return Err(e).with_context(|| format!("Processing unit {} failed", unit_id));
        }
    };

    status::write_threshold(&args.status_db, &args.status_table, &unit_id, summary.threshold)
        .with_context(|| format!("Failed to update status store {:?}", args.status_db))?;

    info!(
        "Unit {}: threshold {}, {} pour point(s), {} link(s), {} catchment(s), {} channel(s)",
        summary.unit_id,
        summary.threshold,
        summary.pour_points,
        summary.links,
        summary.catchments,
        summary.channels
    );
    match summary.boundary_status {
        BoundaryStatus::Accepted => info!(
            "Watershed boundary accepted ({}, area ratio {:.3})",
            summary.vectorize_mode, summary.area_ratio
        ),
        BoundaryStatus::Degraded { ratio } => warn!(
            "Watershed boundary degraded: area ratio {:.3} after {}",
            ratio, summary.vectorize_mode
        ),
    }
    info!("Ending script execution");
    Ok(())
}

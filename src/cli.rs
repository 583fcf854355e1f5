use clap::Parser;
use std::path::PathBuf;

/// Derive the channel network, sub-catchments and watershed boundary of one
/// watershed unit from its DEM.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Elevation raster (GeoTIFF); the unit id is read from its name
    pub dem: PathBuf,

    /// Processing directory for the toolset's intermediate files
    pub proc_dir: PathBuf,

    /// SQLite status store receiving the channel threshold
    pub status_db: PathBuf,

    /// Watershed-unit boundary (GeoJSON or shapefile)
    pub ws_bnd: PathBuf,

    /// Output catchment polygons
    pub pd_catch: PathBuf,

    /// Output channel network
    pub pd_chnl: PathBuf,

    /// Output dissolved watershed boundary
    pub wshed: PathBuf,

    /// Skip depression filling
    #[arg(long)]
    pub no_fill: bool,

    /// Unit id (HUC12); parsed from the DEM name when omitted
    #[arg(long)]
    pub unit_id: Option<String>,

    /// Toolset worker processes; half the logical CPUs by default
    #[arg(short, long)]
    pub processes: Option<usize>,

    /// Directory holding the toolset executables; PATH otherwise
    #[arg(long)]
    pub taudem_dir: Option<PathBuf>,

    /// MPI launcher
    #[arg(long, default_value = "mpiexec")]
    pub mpiexec: PathBuf,

    /// Run the toolset executables directly, without the MPI launcher
    #[arg(long)]
    pub no_mpi: bool,

    /// Status table keyed by HUC12
    #[arg(long, default_value = crate::status::DEFAULT_STATUS_TABLE)]
    pub status_table: String,

    /// Directory for the run log
    #[arg(long, default_value = ".")]
    pub log_dir: PathBuf,

    /// Log to file only
    #[arg(short, long)]
    pub quiet: bool,

    /// Keep the processing directory's existing contents
    #[arg(long)]
    pub keep_proc_dir: bool,
}

pub fn get_args() -> Args {
    Args::parse()
}

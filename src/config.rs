use std::path::{Path, PathBuf};

// Cut-offs and conversion factors
pub const MIN_CHANNEL_THRESHOLD: i64 = 1000;
pub const POUR_POINT_SIGMAS: f64 = 3.0;
pub const MIN_AREA_RATIO: f64 = 0.9;
pub const SQ_METERS_PER_ACRE: f64 = 4046.8564224;

// File names inside the processing directory, following the toolset conventions
#[derive(Debug, Clone)]
pub struct ProcFiles {
    pub fel: String,
    pub p: String,
    pub ad8: String,
    pub ss: String,
    pub ssa: String,
    pub src: String,
    pub ord: String,
    pub w: String,
    pub tree: String,
    pub coord: String,
    pub drp: String,
    pub pour_points: String,
    pub net: String,
    pub raw_catchments: String,
    pub archive_dir: String,
}

impl ProcFiles {
    pub fn new() -> Self {
        ProcFiles {
            fel: "demfel.tif".to_string(),
            p: "demp.tif".to_string(),
            ad8: "demad8.tif".to_string(),
            ss: "demss.tif".to_string(),
            ssa: "demssa.tif".to_string(),
            src: "demsrc.tif".to_string(),
            ord: "demgord.tif".to_string(),
            w: "demw.tif".to_string(),
            tree: "demtree.dat".to_string(),
            coord: "demcoord.dat".to_string(),
            drp: "demdrp.txt".to_string(),
            pour_points: "PourPts.shp".to_string(),
            net: "tempnet.shp".to_string(),
            raw_catchments: "tmpwshd.geojson".to_string(),
            archive_dir: "dslv_errors".to_string(),
        }
    }
}

/// Working directory of one watershed unit and the names inside it.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub dir: PathBuf,
    pub files: ProcFiles,
}

impl Workspace {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Workspace {
            dir: dir.as_ref().to_path_buf(),
            files: ProcFiles::new(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn fel(&self) -> PathBuf {
        self.path(&self.files.fel)
    }
    pub fn p(&self) -> PathBuf {
        self.path(&self.files.p)
    }
    pub fn ad8(&self) -> PathBuf {
        self.path(&self.files.ad8)
    }
    pub fn ss(&self) -> PathBuf {
        self.path(&self.files.ss)
    }
    pub fn ssa(&self) -> PathBuf {
        self.path(&self.files.ssa)
    }
    pub fn src(&self) -> PathBuf {
        self.path(&self.files.src)
    }
    pub fn ord(&self) -> PathBuf {
        self.path(&self.files.ord)
    }
    pub fn w(&self) -> PathBuf {
        self.path(&self.files.w)
    }
    pub fn tree(&self) -> PathBuf {
        self.path(&self.files.tree)
    }
    pub fn coord(&self) -> PathBuf {
        self.path(&self.files.coord)
    }
    pub fn drp(&self) -> PathBuf {
        self.path(&self.files.drp)
    }
    pub fn pour_points(&self) -> PathBuf {
        self.path(&self.files.pour_points)
    }
    pub fn net(&self) -> PathBuf {
        self.path(&self.files.net)
    }
    pub fn raw_catchments(&self) -> PathBuf {
        self.path(&self.files.raw_catchments)
    }
    pub fn archive_dir(&self) -> PathBuf {
        self.path(&self.files.archive_dir)
    }
}

// Search parameters handed to drop analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropAnalysisParams {
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub steps: u32,
    /// Toolset step-spacing flag
    pub step_type: u8,
}

impl Default for DropAnalysisParams {
    fn default() -> Self {
        DropAnalysisParams {
            min_threshold: 1000.0,
            max_threshold: 2500.0,
            steps: 50,
            step_type: 0,
        }
    }
}

// How the toolset executables are launched
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub processes: usize,
    pub mpiexec: Option<PathBuf>,
    pub taudem_dir: Option<PathBuf>,
    /// Treat anything written to stderr by a successful tool as a failure
    pub strict_stderr: bool,
}

impl ToolConfig {
    pub fn new(processes: usize) -> Self {
        ToolConfig {
            processes: processes.max(1),
            mpiexec: Some(PathBuf::from("mpiexec")),
            taudem_dir: None,
            strict_stderr: true,
        }
    }
}

/// Half the logical CPUs, at least one.
pub fn default_process_count() -> usize {
    (num_cpus::get() / 2).max(1)
}

// Inputs and outputs of one watershed unit run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub unit_id: String,
    pub dem: PathBuf,
    pub boundary: PathBuf,
    pub fill: bool,
    pub workspace: Workspace,
    pub drop_analysis: DropAnalysisParams,
    pub pd_catch: PathBuf,
    pub pd_chnl: PathBuf,
    pub wshed: PathBuf,
    /// Wipe the processing directory before the first stage
    pub reset_workspace: bool,
    pub show_progress: bool,
}

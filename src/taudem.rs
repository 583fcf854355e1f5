//! Hydrology engine seam and its TauDEM-backed implementation.
//!
//! Fill and flow direction run in-process; the remaining operations are
//! blocking `mpiexec -n <N> <Tool> ...` invocations inside the unit's
//! working directory. There is no timeout and no cancellation.

use crate::config::{DropAnalysisParams, ToolConfig, Workspace};
use crate::error::{Error, Result};
use crate::io::geotiff::{read_raster, write_raster};
use crate::raster::Raster;
use crate::surface::{FILL_EPSILON, fill_depressions, flow_direction_esri, remap_directions};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Plain D8 contributing area, edge contamination not checked
    Contributing,
    /// Contributing area weighted by the stream skeleton, upstream of the pour points
    SkeletonWeighted,
}

/// Hydrological-surface operations over the files of one workspace.
pub trait HydroEngine {
    /// Elevation raster -> filled surface (or a plain copy when `fill` is false).
    fn fill_surface(&self, dem: &Path, ws: &Workspace, fill: bool) -> Result<()>;
    /// Filled surface -> D8 directions in the toolset convention.
    fn flow_direction(&self, ws: &Workspace) -> Result<()>;
    fn flow_accumulation(&self, ws: &Workspace, kind: Accumulation) -> Result<()>;
    fn stream_skeleton(&self, ws: &Workspace) -> Result<()>;
    fn drop_analysis(&self, ws: &Workspace, params: &DropAnalysisParams) -> Result<()>;
    fn threshold(&self, ws: &Workspace, threshold: i64) -> Result<()>;
    fn stream_network(&self, ws: &Workspace) -> Result<()>;
}

/// One toolset invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    AreaD8(Accumulation),
    PeukerDouglas,
    DropAnalysis(DropAnalysisParams),
    Threshold(i64),
    StreamNet,
}

fn push_flag(args: &mut Vec<OsString>, flag: &str, path: PathBuf) {
    args.push(flag.into());
    args.push(path.into_os_string());
}

impl ToolCall {
    pub fn tool(&self) -> &'static str {
        match self {
            ToolCall::AreaD8(_) => "AreaD8",
            ToolCall::PeukerDouglas => "PeukerDouglas",
            ToolCall::DropAnalysis(_) => "DropAnalysis",
            ToolCall::Threshold(_) => "Threshold",
            ToolCall::StreamNet => "StreamNet",
        }
    }

    pub fn args(&self, ws: &Workspace) -> Vec<OsString> {
        let mut args = Vec::new();
        match self {
            ToolCall::AreaD8(Accumulation::Contributing) => {
                push_flag(&mut args, "-p", ws.p());
                push_flag(&mut args, "-ad8", ws.ad8());
                args.push("-nc".into());
            }
            ToolCall::AreaD8(Accumulation::SkeletonWeighted) => {
                push_flag(&mut args, "-p", ws.p());
                push_flag(&mut args, "-o", ws.pour_points());
                push_flag(&mut args, "-ad8", ws.ssa());
                push_flag(&mut args, "-wg", ws.ss());
                args.push("-nc".into());
            }
            ToolCall::PeukerDouglas => {
                push_flag(&mut args, "-fel", ws.fel());
                push_flag(&mut args, "-ss", ws.ss());
            }
            ToolCall::DropAnalysis(par) => {
                push_flag(&mut args, "-p", ws.p());
                push_flag(&mut args, "-fel", ws.fel());
                push_flag(&mut args, "-ad8", ws.ad8());
                push_flag(&mut args, "-ssa", ws.ssa());
                push_flag(&mut args, "-drp", ws.drp());
                push_flag(&mut args, "-o", ws.pour_points());
                args.push("-par".into());
                args.push(par.min_threshold.to_string().into());
                args.push(par.max_threshold.to_string().into());
                args.push(par.steps.to_string().into());
                args.push(par.step_type.to_string().into());
            }
            ToolCall::Threshold(threshold) => {
                push_flag(&mut args, "-ssa", ws.ssa());
                push_flag(&mut args, "-src", ws.src());
                args.push("-thresh".into());
                args.push(threshold.to_string().into());
            }
            ToolCall::StreamNet => {
                push_flag(&mut args, "-fel", ws.fel());
                push_flag(&mut args, "-p", ws.p());
                push_flag(&mut args, "-ad8", ws.ad8());
                push_flag(&mut args, "-src", ws.src());
                push_flag(&mut args, "-ord", ws.ord());
                push_flag(&mut args, "-tree", ws.tree());
                push_flag(&mut args, "-coord", ws.coord());
                push_flag(&mut args, "-net", ws.net());
                push_flag(&mut args, "-w", ws.w());
                push_flag(&mut args, "-o", ws.pour_points());
            }
        }
        args
    }
}

#[derive(Debug, Clone)]
pub struct TauDem {
    config: ToolConfig,
}

impl TauDem {
    pub fn new(config: ToolConfig) -> Self {
        TauDem { config }
    }

    pub fn command(&self, call: &ToolCall, ws: &Workspace) -> Command {
        let exe = match &self.config.taudem_dir {
            Some(dir) => dir.join(call.tool()),
            None => PathBuf::from(call.tool()),
        };
        let mut cmd = match &self.config.mpiexec {
            Some(mpiexec) => {
                let mut cmd = Command::new(mpiexec);
                cmd.arg("-n")
                    .arg(self.config.processes.to_string())
                    .arg(exe);
                cmd
            }
            None => Command::new(exe),
        };
        cmd.args(call.args(ws)).current_dir(&ws.dir);
        cmd
    }

    fn run(&self, call: ToolCall, ws: &Workspace) -> Result<()> {
        let tool = call.tool();
        let mut cmd = self.command(&call, ws);
        debug!("Running {:?}", cmd);

        let output = cmd.output().map_err(|source| Error::Launch {
            tool: tool.to_string(),
            source,
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!("{} output:\n{}", tool, stdout.trim_end());
        }

        let stderr_failure = self.config.strict_stderr && !stderr.trim().is_empty();
        if !output.status.success() || stderr_failure {
            let status = if output.status.success() {
                "wrote to stderr".to_string()
            } else {
                output.status.to_string()
            };
            error!("{} failed ({}): {}{}", tool, status, stdout, stderr);
            return Err(Error::Tool {
                tool: tool.to_string(),
                status,
                output: format!("{}{}", stdout, stderr),
            });
        }
        Ok(())
    }
}

impl HydroEngine for TauDem {
    fn fill_surface(&self, dem: &Path, ws: &Workspace, fill: bool) -> Result<()> {
        let elevation: Raster<f64> = read_raster(dem)?;
        let filled = if fill {
            fill_depressions(&elevation, FILL_EPSILON)
        } else {
            elevation
        };
        write_raster(&filled, ws.fel())
    }

    fn flow_direction(&self, ws: &Workspace) -> Result<()> {
        let filled: Raster<f64> = read_raster(ws.fel())?;
        let esri = flow_direction_esri(&filled);
        write_raster(&remap_directions(&esri), ws.p())
    }

    fn flow_accumulation(&self, ws: &Workspace, kind: Accumulation) -> Result<()> {
        self.run(ToolCall::AreaD8(kind), ws)
    }

    fn stream_skeleton(&self, ws: &Workspace) -> Result<()> {
        self.run(ToolCall::PeukerDouglas, ws)
    }

    fn drop_analysis(&self, ws: &Workspace, params: &DropAnalysisParams) -> Result<()> {
        self.run(ToolCall::DropAnalysis(*params), ws)
    }

    fn threshold(&self, ws: &Workspace, threshold: i64) -> Result<()> {
        self.run(ToolCall::Threshold(threshold), ws)
    }

    fn stream_network(&self, ws: &Workspace) -> Result<()> {
        self.run(ToolCall::StreamNet, ws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;

    fn args_of(call: ToolCall, ws: &Workspace) -> Vec<String> {
        call.args(ws)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn drop_analysis_scans_the_fixed_range() {
        let ws = Workspace::new("/proc");
        let args = args_of(ToolCall::DropAnalysis(DropAnalysisParams::default()), &ws);
        let par = args.iter().position(|a| a == "-par").unwrap();
        assert_eq!(&args[par + 1..], ["1000", "2500", "50", "0"]);
        assert!(args.contains(&"/proc/demdrp.txt".to_string()));
        assert!(args.contains(&"/proc/PourPts.shp".to_string()));
    }

    #[test]
    fn weighted_accumulation_uses_skeleton_and_outlets() {
        let ws = Workspace::new("/proc");
        let plain = args_of(ToolCall::AreaD8(Accumulation::Contributing), &ws);
        assert_eq!(plain, ["-p", "/proc/demp.tif", "-ad8", "/proc/demad8.tif", "-nc"]);

        let weighted = args_of(ToolCall::AreaD8(Accumulation::SkeletonWeighted), &ws);
        assert!(weighted.windows(2).any(|w| w == ["-wg", "/proc/demss.tif"]));
        assert!(weighted.windows(2).any(|w| w == ["-ad8", "/proc/demssa.tif"]));
        assert!(weighted.windows(2).any(|w| w == ["-o", "/proc/PourPts.shp"]));
        assert_eq!(weighted.last().map(String::as_str), Some("-nc"));
    }

    #[test]
    fn threshold_passes_the_integer_value() {
        let ws = Workspace::new("/proc");
        let args = args_of(ToolCall::Threshold(1350), &ws);
        assert_eq!(&args[4..], ["-thresh", "1350"]);
    }

    #[test]
    fn commands_go_through_mpiexec_with_the_process_count() {
        let ws = Workspace::new("/proc");
        let mut config = ToolConfig::new(4);
        config.taudem_dir = Some(PathBuf::from("/opt/taudem"));
        let cmd = TauDem::new(config).command(&ToolCall::PeukerDouglas, &ws);
        assert_eq!(cmd.get_program(), "mpiexec");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[..3], ["-n", "4", "/opt/taudem/PeukerDouglas"]);

        let mut direct = ToolConfig::new(4);
        direct.mpiexec = None;
        let cmd = TauDem::new(direct).command(&ToolCall::StreamNet, &ws);
        assert_eq!(cmd.get_program(), "StreamNet");
    }

    #[test]
    fn missing_tool_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let mut config = ToolConfig::new(1);
        config.mpiexec = None;
        config.taudem_dir = Some(dir.path().join("no-such-dir"));
        let err = TauDem::new(config).stream_skeleton(&ws).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[cfg(unix)]
    fn script_engine(dir: &Path, tool: &str, body: &str, strict_stderr: bool) -> TauDem {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join(tool);
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut config = ToolConfig::new(1);
        config.mpiexec = None;
        config.taudem_dir = Some(dir.to_path_buf());
        config.strict_stderr = strict_stderr;
        TauDem::new(config)
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_fatal_and_keeps_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let engine = script_engine(dir.path(), "Threshold", "echo 'cannot open demssa.tif'; exit 3", true);
        match engine.threshold(&ws, 1000) {
            Err(Error::Tool { tool, output, .. }) => {
                assert_eq!(tool, "Threshold");
                assert!(output.contains("cannot open demssa.tif"));
            }
            other => panic!("expected a tool error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stderr_output_fails_only_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let body = "echo 'warning: projection' >&2; exit 0";
        let strict = script_engine(dir.path(), "StreamNet", body, true);
        assert!(matches!(strict.stream_network(&ws), Err(Error::Tool { .. })));
        let lenient = script_engine(dir.path(), "StreamNet", body, false);
        assert!(lenient.stream_network(&ws).is_ok());
    }

    #[test]
    fn native_fill_and_direction_write_toolset_codes() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let dem_path = dir.path().join("dem.tif");
        let values = (0..25).map(|i| 100.0 - (i % 5) as f64 - (i / 5) as f64).collect();
        let mut dem = Raster::from_vec(values, 5, 5).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        write_raster(&dem, &dem_path).unwrap();

        let engine = TauDem::new(ToolConfig::new(1));
        engine.fill_surface(&dem_path, &ws, true).unwrap();
        engine.flow_direction(&ws).unwrap();

        let p: Raster<f64> = read_raster(ws.p()).unwrap();
        assert_eq!(p.get(2, 2), 8.0, "interior cell should drain south-east");
        for row in 0..5 {
            for col in 0..5 {
                let code = p.get(row, col);
                assert!((1.0..=8.0).contains(&code), "({}, {}) -> {}", row, col, code);
            }
        }
    }

    // 9x9 depression with a flat floor and a notch in the southern rim
    fn flat_floored_depression(base: f64) -> Raster<f64> {
        let values = (0..81)
            .map(|i| {
                let (row, col) = (i / 9, i % 9);
                if (row, col) == (8, 4) {
                    base + 5.0
                } else if row == 0 || col == 0 || row == 8 || col == 8 {
                    base + 10.0
                } else {
                    base
                }
            })
            .collect();
        let mut dem = Raster::from_vec(values, 9, 9).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 90.0, 10.0, -10.0));
        dem
    }

    #[test]
    fn filled_flats_drain_at_high_elevations() {
        for base in [300.0, 1500.0, 2500.0] {
            let dir = tempfile::tempdir().unwrap();
            let ws = Workspace::new(dir.path());
            let dem_path = dir.path().join("dem.tif");
            write_raster(&flat_floored_depression(base), &dem_path).unwrap();

            let engine = TauDem::new(ToolConfig::new(1));
            engine.fill_surface(&dem_path, &ws, true).unwrap();
            engine.flow_direction(&ws).unwrap();

            let p: Raster<f64> = read_raster(ws.p()).unwrap();
            let stuck = p.data().iter().filter(|&&code| !(1.0..=8.0).contains(&code)).count();
            assert_eq!(stuck, 0, "{} cells without a direction at base {} m", stuck, base);
        }
    }
}

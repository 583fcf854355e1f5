//! Scripted hydrology engine for stage and pipeline tests

use crate::config::{DropAnalysisParams, Workspace};
use crate::error::Result;
use crate::features::ChannelLink;
use crate::io::geotiff::{read_raster, write_raster};
use crate::io::shp::write_network;
use crate::raster::{GeoTransform, Raster};
use crate::taudem::{Accumulation, HydroEngine};
use geo::LineString;
use std::cell::RefCell;
use std::fs;
use std::path::Path;

/// Writes canned outputs under the toolset's file names and records each call.
pub struct FakeHydro {
    calls: RefCell<Vec<String>>,
    /// Written for every continuous grid output (fel, ad8, ss, ssa, ...)
    pub grid: Raster<f64>,
    /// Written as demw
    pub labels: Raster<f64>,
    pub drop_report: String,
    pub links: Vec<ChannelLink>,
}

// 4x4 grid of 100 m cells over (0, 0)..(400, 400)
fn transform() -> GeoTransform {
    GeoTransform::new(0.0, 400.0, 100.0, -100.0)
}

fn link(link_no: i64, wsno: i64, coords: Vec<(f64, f64)>) -> ChannelLink {
    ChannelLink {
        link_no,
        ds_link_no: if link_no == 1 { 2 } else { -1 },
        us_link_no1: if link_no == 2 { 1 } else { -1 },
        us_link_no2: -1,
        strm_order: if link_no == 2 { 2 } else { 1 },
        length: 300.0,
        wsno,
        line: LineString::from(coords),
    }
}

impl Default for FakeHydro {
    fn default() -> Self {
        // Outlet on the boundary ring at row 3, col 1
        let mut accumulation = vec![1.0; 16];
        accumulation[5] = 40.0;
        accumulation[13] = 100.0;
        let mut grid = Raster::from_vec(accumulation, 4, 4).unwrap();
        grid.set_transform(transform());
        grid.set_epsg(Some(5070));

        // West half drains to link 1, east half to link 2
        let labels = (0..16).map(|i| if i % 4 < 2 { 1.0 } else { 2.0 }).collect();
        let mut labels = Raster::from_vec(labels, 4, 4).unwrap();
        labels.set_transform(transform());
        labels.set_nodata(Some(-1.0));
        labels.set_epsg(Some(5070));

        FakeHydro {
            calls: RefCell::new(Vec::new()),
            grid,
            labels,
            drop_report: "Threshold DrainDen\nOptimum Threshold Value: 1349.563477\n".to_string(),
            links: vec![
                link(1, 1, vec![(100.0, 350.0), (100.0, 50.0)]),
                link(2, 2, vec![(300.0, 350.0), (300.0, 50.0)]),
                // Outside the unit
                link(3, 3, vec![(900.0, 900.0), (1200.0, 900.0)]),
            ],
        }
    }
}

impl FakeHydro {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn write_tree(&self, path: &Path) -> Result<()> {
        let rows: String = self
            .links
            .iter()
            .map(|l| {
                format!(
                    "\t{}\t0\t1\t{}\t{}\t{}\t{}\t0\t1\n",
                    l.link_no, l.ds_link_no, l.us_link_no1, l.us_link_no2, l.strm_order
                )
            })
            .collect();
        fs::write(path, rows)?;
        Ok(())
    }
}

impl HydroEngine for FakeHydro {
    fn fill_surface(&self, dem: &Path, ws: &Workspace, fill: bool) -> Result<()> {
        self.record(format!("fill_surface({})", fill));
        let dem: Raster<f64> = read_raster(dem)?;
        write_raster(&dem, ws.fel())
    }

    fn flow_direction(&self, ws: &Workspace) -> Result<()> {
        self.record("flow_direction".into());
        write_raster(&self.grid.like(7u8), ws.p())
    }

    fn flow_accumulation(&self, ws: &Workspace, kind: Accumulation) -> Result<()> {
        self.record(format!("flow_accumulation({:?})", kind));
        let out = match kind {
            Accumulation::Contributing => ws.ad8(),
            Accumulation::SkeletonWeighted => ws.ssa(),
        };
        write_raster(&self.grid, out)
    }

    fn stream_skeleton(&self, ws: &Workspace) -> Result<()> {
        self.record("stream_skeleton".into());
        write_raster(&self.grid.like(1u8), ws.ss())
    }

    fn drop_analysis(&self, ws: &Workspace, _params: &DropAnalysisParams) -> Result<()> {
        self.record("drop_analysis".into());
        fs::write(ws.drp(), &self.drop_report)?;
        Ok(())
    }

    fn threshold(&self, ws: &Workspace, threshold: i64) -> Result<()> {
        self.record(format!("threshold({})", threshold));
        write_raster(&self.grid.like(1u8), ws.src())
    }

    fn stream_network(&self, ws: &Workspace) -> Result<()> {
        self.record("stream_network".into());
        write_raster(&self.grid.like(1u8), ws.ord())?;
        write_raster(&self.labels, ws.w())?;
        self.write_tree(&ws.tree())?;
        fs::write(ws.coord(), "")?;
        write_network(&ws.net(), &self.links)
    }
}
